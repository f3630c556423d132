//! Three-pass build driver.
//!
//! Pass 1 harvests everything that can be read without knowing module
//! identities: console declarations, event definitions and message schemas.
//! Pass 2 derives each module's name from its filename, creates feature
//! records and binds event handlers (which need the completed event table).
//! Pass 3 resolves dependency directives against the completed feature
//! table. The passes are strictly sequential; all accumulated state lives in
//! one [`BuildContext`] value.

use crate::config::Config;
use crate::emit::{self, Artifact};
use crate::error::{BuildError, CliResult};
use crate::extract::{ConDecl, SourceUnit};
use crate::graph::{self, Schedule};
use crate::model::{
    ArrayLen, Event, EventTable, Feature, FeatureTable, HandlerBinding, MessageSchema, WireType,
};
use crate::scanner;
use crate::writer::{FileWriter, WriteResult};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Everything the passes accumulate, ready for emission.
#[derive(Debug)]
pub struct BuildContext {
    /// Console commands and variables, in harvest order.
    pub commands: Vec<ConDecl>,

    /// All declared features, with resolved dependency lists.
    pub features: FeatureTable,

    /// All declared events, with bound handlers.
    pub events: EventTable,

    /// All declared message schemas, keyed by name, with dynamic flags
    /// resolved.
    pub schemas: BTreeMap<String, MessageSchema>,

    /// Feature initialization order.
    pub schedule: Schedule,
}

/// Run the three passes over a loaded set of input units.
pub fn build(units: &[SourceUnit], extension: &str) -> CliResult<BuildContext> {
    let mut commands = Vec::new();
    let mut events = EventTable::new();
    let mut schemas = BTreeMap::new();
    for unit in units {
        commands.extend(unit.con_decls());
        for def in unit.event_defs()? {
            events.insert(Event {
                name: def.name,
                params: def.params,
                kind: def.kind,
                handlers: Vec::new(),
            })?;
        }
        for schema in unit.msg_schemas()? {
            schemas.insert(schema.name.clone(), schema);
        }
    }

    let mut features = FeatureTable::new();
    for (i, unit) in units.iter().enumerate() {
        let module = scanner::module_name(&unit.path, extension)?;
        let is_feature = match unit.feature_decl() {
            Some(decl) => {
                features.insert(Feature::new(module.clone(), decl.desc, i));
                true
            }
            None => false,
        };
        let mut handled_any = false;
        for event in unit.event_handlers() {
            let ev = events.get_mut(&event).ok_or_else(|| BuildError::UnknownEvent {
                module: module.clone(),
                event: event.clone(),
            })?;
            // handlers in feature modules are guarded on the feature's
            // success flag; plain modules dispatch unconditionally
            ev.handlers.push(HandlerBinding {
                module: module.clone(),
                conditional: is_feature,
            });
            handled_any = true;
        }
        if is_feature && handled_any {
            if let Some(f) = features.get_mut(&module) {
                f.has_evhandlers = true;
            }
        }
    }

    let declared: Vec<(String, usize)> = features
        .iter()
        .map(|f| (f.modname.clone(), f.unit))
        .collect();
    for (module, unit_idx) in declared {
        let directives = units[unit_idx].feat_directives()?;
        graph::apply_directives(&mut features, &module, &directives)?;
    }

    resolve_schemas(&mut schemas)?;
    let schedule = graph::schedule(&features)?;

    Ok(BuildContext {
        commands,
        features,
        events,
        schemas,
        schedule,
    })
}

/// Resolve every schema's dynamic-length flag.
///
/// A schema is dynamic when any field carries a runtime-sized level
/// anywhere in its chain, or nests a dynamic schema through a map. Map
/// references are checked here too: a reference to a schema nobody declared
/// or a reference cycle (which would make the message infinitely sized) is
/// fatal.
fn resolve_schemas(schemas: &mut BTreeMap<String, MessageSchema>) -> Result<(), BuildError> {
    let names: Vec<String> = schemas.keys().cloned().collect();
    let mut memo = BTreeMap::new();
    for name in &names {
        schema_dynamic(schemas, name, &mut memo, &mut Vec::new())?;
    }
    for (name, dynamic) in memo {
        if let Some(s) = schemas.get_mut(&name) {
            s.dynamic = dynamic;
        }
    }
    Ok(())
}

fn schema_dynamic(
    schemas: &BTreeMap<String, MessageSchema>,
    name: &str,
    memo: &mut BTreeMap<String, bool>,
    stack: &mut Vec<String>,
) -> Result<bool, BuildError> {
    if let Some(known) = memo.get(name) {
        return Ok(*known);
    }
    if stack.iter().any(|n| n == name) {
        return Err(BuildError::RecursiveSchema {
            name: name.to_string(),
        });
    }
    let Some(schema) = schemas.get(name) else {
        return Ok(false);
    };

    stack.push(name.to_string());
    let mut dynamic = false;
    for field in &schema.fields {
        if field.chain.iter().any(|t| {
            matches!(
                t,
                WireType::DynStr
                    | WireType::DynArray { .. }
                    | WireType::Array {
                        len: ArrayLen::Named(_)
                    }
            )
        }) {
            dynamic = true;
        }
        if let WireType::Map { schema: sub } = field.tail() {
            if !schemas.contains_key(sub) {
                return Err(BuildError::UnknownSchema {
                    schema: name.to_string(),
                    field: field.name.clone(),
                    referenced: sub.clone(),
                });
            }
            if schema_dynamic(schemas, sub, memo, stack)? {
                dynamic = true;
            }
        }
    }
    stack.pop();

    memo.insert(name.to_string(), dynamic);
    Ok(dynamic)
}

/// Emit all artifacts for a completed build context.
pub fn generate(ctx: &BuildContext, config: &Config) -> Vec<Artifact> {
    let mut artifacts = Vec::new();
    if config.emit.commands {
        artifacts.push(emit::commands::emit(&ctx.commands));
    }
    artifacts.push(emit::features::emit(&ctx.features, &ctx.schedule));
    artifacts.push(emit::events::emit(&ctx.events));
    for schema in ctx.schemas.values() {
        artifacts.push(emit::messages::emit(schema, &ctx.schemas));
    }
    artifacts
}

/// Full batch run: load inputs, build, emit, write.
pub fn run(
    inputs: &[PathBuf],
    config: &Config,
    writer: &FileWriter,
) -> CliResult<Vec<WriteResult>> {
    let mut units = Vec::with_capacity(inputs.len());
    for path in inputs {
        units.push(SourceUnit::load(path)?);
    }

    let ctx = build(&units, &config.input.extension)?;
    let artifacts = generate(&ctx, config);

    let mut results = Vec::with_capacity(artifacts.len());
    for artifact in &artifacts {
        let path = config.output.dir.join(&artifact.rel_path);
        results.push(writer.write(&path, &artifact.content)?);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use crate::model::EventKind;

    fn units(files: &[(&str, &str)]) -> Vec<SourceUnit> {
        files
            .iter()
            .map(|(path, content)| SourceUnit::from_content(*path, *content))
            .collect()
    }

    #[test]
    fn test_full_pipeline() {
        let units = units(&[
            (
                "ent.c",
                "FEATURE()\nDEF_EVENT(Tick, bool)\nINIT {\n\treturn true;\n}\n",
            ),
            (
                "warp.c",
                "FEATURE(\"warping\")\nREQUIRE(ent)\nHANDLE_EVENT(Tick, bool sim) {\n}\nINIT {\n\treturn true;\n}\nEND {\n}\n",
            ),
            (
                "hud.c",
                "DEF_CVAR(sst_hud, \"Draw overlay\", 0, 0)\nHANDLE_EVENT(Tick, bool sim) {\n}\n",
            ),
        ]);

        let ctx = build(&units, "c").unwrap();

        assert_eq!(ctx.commands.len(), 1);
        assert_eq!(ctx.features.len(), 2);
        let warp = ctx.features.get("warp").unwrap();
        assert_eq!(warp.needs, vec!["ent"]);
        assert!(warp.has_end);
        assert!(warp.has_evhandlers);

        let tick = ctx.events.get("Tick").unwrap();
        assert_eq!(tick.kind, EventKind::Notification);
        assert_eq!(tick.handlers.len(), 2);
        // warp is a feature, hud is not
        assert!(tick.handlers[0].conditional);
        assert!(!tick.handlers[1].conditional);

        let ent = ctx.schedule.init_order.iter().position(|m| m == "ent");
        let warp = ctx.schedule.init_order.iter().position(|m| m == "warp");
        assert!(ent < warp);
    }

    #[test]
    fn test_unknown_event_is_fatal() {
        let units = units(&[("mod.c", "HANDLE_EVENT(Nope) {\n}\n")]);
        let err = build(&units, "c").unwrap_err();
        assert!(matches!(
            err,
            CliError::Build(BuildError::UnknownEvent { module, event })
                if module == "mod" && event == "Nope"
        ));
    }

    #[test]
    fn test_bad_filename_is_fatal() {
        let units = units(&[("warp.cpp", "FEATURE()\n")]);
        assert!(matches!(
            build(&units, "c").unwrap_err(),
            CliError::Scan(_)
        ));
    }

    #[test]
    fn test_unknown_schema_reference_is_fatal() {
        let units = units(&[("demo.c", "DEF_MSG(Frame)\nMSG_FIELD(pos, \"p\", map(Vec3))\n")]);
        let err = build(&units, "c").unwrap_err();
        assert!(matches!(
            err,
            CliError::Build(BuildError::UnknownSchema { referenced, .. }) if referenced == "Vec3"
        ));
    }

    #[test]
    fn test_recursive_schema_is_fatal() {
        let units = units(&[(
            "demo.c",
            "DEF_MSG_STRUCT(A)\nMSG_FIELD(b, \"b\", map(B))\nDEF_MSG_STRUCT(B)\nMSG_FIELD(a, \"a\", map(A))\n",
        )]);
        assert!(matches!(
            build(&units, "c").unwrap_err(),
            CliError::Build(BuildError::RecursiveSchema { .. })
        ));
    }

    #[test]
    fn test_dynamic_flag_propagates_through_maps() {
        let units = units(&[(
            "demo.c",
            "DEF_MSG_STRUCT(Inner)\nMSG_FIELD(text, \"t\", dynstr)\nDEF_MSG_STRUCT(Fixed)\nMSG_FIELD(x, \"x\", float)\nDEF_MSG(Outer)\nMSG_FIELD(inner, \"i\", map(Inner))\n",
        )]);
        let ctx = build(&units, "c").unwrap();
        assert!(ctx.schemas["Inner"].dynamic);
        assert!(!ctx.schemas["Fixed"].dynamic);
        assert!(ctx.schemas["Outer"].dynamic);
    }

    #[test]
    fn test_generate_artifact_set() {
        let units = units(&[(
            "demrec.c",
            "FEATURE(\"Demo recording\")\nDEF_MSG(Marker)\nMSG_FIELD(tick, \"t\", int)\nINIT {\n\treturn true;\n}\n",
        )]);
        let ctx = build(&units, "c").unwrap();

        let arts = generate(&ctx, &Config::default());
        let paths: Vec<_> = arts.iter().map(|a| a.rel_path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("cmdinit.gen.h"),
                PathBuf::from("featureinit.gen.h"),
                PathBuf::from("evglue.gen.h"),
                PathBuf::from("msg/Marker.gen.h"),
            ]
        );
    }

    #[test]
    fn test_generate_can_skip_commands() {
        let units = units(&[("warp.c", "FEATURE()\nINIT {\n\treturn true;\n}\n")]);
        let ctx = build(&units, "c").unwrap();

        let mut config = Config::default();
        config.emit.commands = false;
        let arts = generate(&ctx, &config);
        assert!(arts.iter().all(|a| a.rel_path != PathBuf::from("cmdinit.gen.h")));
    }

    #[test]
    fn test_run_writes_artifacts() {
        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("warp.c");
        std::fs::write(&input, "FEATURE(\"warping\")\nINIT {\n\treturn true;\n}\n").unwrap();

        let mut config = Config::default();
        config.output.dir = dir.path().join("out");

        let results = run(&[input], &config, &FileWriter::new(false)).unwrap();
        assert!(results.iter().all(WriteResult::was_written));
        assert!(dir.path().join("out/featureinit.gen.h").exists());
        assert!(dir.path().join("out/evglue.gen.h").exists());
    }

    #[test]
    fn test_run_dry_run_touches_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("warp.c");
        std::fs::write(&input, "FEATURE()\nINIT {\n\treturn true;\n}\n").unwrap();

        let mut config = Config::default();
        config.output.dir = dir.path().join("out");

        let results = run(&[input], &config, &FileWriter::new(true)).unwrap();
        assert!(results.iter().all(|r| !r.was_written()));
        assert!(!dir.path().join("out").exists());
    }
}
