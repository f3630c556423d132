//! Status-code emitter for feature initialization.
//!
//! Emits `featureinit.gen.h`: the status enum and message table, extern
//! declarations for each feature's lifecycle hooks, the `has_<mod>` success
//! flags, `initfeatures()` with one guarded status block per feature in
//! scheduled order, the description-sorted listing, and `endfeatures()`
//! teardown in exact reverse order.

use super::Artifact;
use crate::graph::Schedule;
use crate::model::{Feature, FeatureTable};
use std::fmt::Write as _;
use std::path::PathBuf;

pub fn emit(features: &FeatureTable, schedule: &Schedule) -> Artifact {
    let mut body = String::new();

    body.push_str(
        "enum {\n\
         \tFEAT_OK,\n\
         \tFEAT_REQFAIL,\n\
         \tFEAT_PREFAIL,\n\
         \tFEAT_NOGD,\n\
         \tFEAT_NOGLOBAL,\n\
         \tFEAT_FAIL\n\
         };\n\n",
    );
    body.push_str(
        "static const char *const featmsgs[] = {\n\
         \t\" [     OK!     ] %s\\n\",\n\
         \t\" [   skipped   ] %s (requires another feature)\\n\",\n\
         \t\" [   skipped   ] %s (not applicable or useful)\\n\",\n\
         \t\" [ unsupported ] %s (missing gamedata)\\n\",\n\
         \t\" [   FAILED!   ] %s (failed to access engine)\\n\",\n\
         \t\" [   FAILED!   ] %s (error in initialisation)\\n\"\n\
         };\n\n",
    );

    for f in features.iter() {
        if f.has_preinit {
            let _ = writeln!(body, "extern bool _feature_preinit_{}(void);", f.modname);
        }
        let _ = writeln!(body, "extern bool _feature_init_{}(void);", f.modname);
        if f.has_end {
            let _ = writeln!(body, "extern bool _feature_end_{}(void);", f.modname);
        }
        // requested flags must be visible to the requesting module's code
        if f.is_requested {
            let _ = writeln!(body, "bool has_{} = false;", f.modname);
        } else if f.has_end || f.has_evhandlers {
            let _ = writeln!(body, "static bool has_{} = false;", f.modname);
        }
    }
    body.push('\n');

    body.push_str("static void initfeatures(void) {\n");
    let scheduled = schedule
        .init_order
        .iter()
        .filter_map(|modname| features.get(modname));
    for (i, f) in scheduled.enumerate() {
        if i > 0 {
            body.push('\n');
        }
        status_block(&mut body, f);
    }

    let listed = features.by_description();
    if !listed.is_empty() {
        body.push_str(
            "\n\tstruct rgba white = {255, 255, 255, 255};\n\
             \tstruct rgba green = {128, 255, 128, 255};\n\
             \tstruct rgba red   = {255, 128, 128, 255};\n\
             \tcon_colourmsg(&white, \"---- List of plugin features ---\\n\");\n",
        );
        for f in listed {
            let _ = writeln!(
                body,
                "\tcon_colourmsg(status_{} == FEAT_OK ? &green : &red,",
                f.modname
            );
            let _ = writeln!(
                body,
                "\t\t\tfeatmsgs[(int)status_{}], \"{}\");",
                f.modname,
                f.desc.as_deref().unwrap_or_default()
            );
        }
    }
    body.push_str("}\n\n");

    body.push_str("static void endfeatures(void) {\n");
    for f in schedule
        .teardown_order()
        .filter_map(|modname| features.get(modname))
    {
        if f.has_end {
            let _ = writeln!(body, "\tif (has_{0}) _feature_end_{0}();", f.modname);
        }
    }
    body.push_str("}\n");

    Artifact {
        rel_path: PathBuf::from("featureinit.gen.h"),
        content: super::guarded("FEATUREINIT", &body),
    }
}

/// Emit one feature's guarded initialization.
///
/// The six outcomes are mutually exclusive and evaluated in fixed
/// precedence via an else chain: OK, REQFAIL, PREFAIL, NOGD, NOGLOBAL,
/// FAIL. A single hard need is tested directly; two or more are folded
/// into one `metdeps_<mod>` conjunction first, which changes the code
/// shape but not the evaluated semantics.
fn status_block(body: &mut String, f: &Feature) {
    let _ = writeln!(body, "\tchar status_{} = FEAT_OK;", f.modname);
    let mut else_ = "";
    if f.needs.len() == 1 {
        let _ = writeln!(
            body,
            "\tif (status_{} != FEAT_OK) status_{} = FEAT_REQFAIL;",
            f.needs[0], f.modname
        );
        else_ = "else ";
    } else if f.needs.len() > 1 {
        let _ = writeln!(body, "\tbool metdeps_{} =", f.modname);
        for (i, need) in f.needs.iter().enumerate() {
            let sep = if i == f.needs.len() - 1 { ";" } else { " &&" };
            let _ = writeln!(body, "\t\tstatus_{} == FEAT_OK{}", need, sep);
        }
        let _ = writeln!(
            body,
            "\tif (!metdeps_{0}) status_{0} = FEAT_REQFAIL;",
            f.modname
        );
        else_ = "else ";
    }
    if f.has_preinit {
        let _ = writeln!(
            body,
            "\t{else_}if (!_feature_preinit_{0}()) status_{0} = FEAT_PREFAIL;",
            f.modname
        );
        else_ = "else ";
    }
    for gd in &f.need_gamedata {
        let _ = writeln!(
            body,
            "\t{else_}if (!has_{}) status_{} = FEAT_NOGD;",
            gd, f.modname
        );
        else_ = "else ";
    }
    for glob in &f.need_globals {
        let _ = writeln!(
            body,
            "\t{else_}if (!{}) status_{} = FEAT_NOGLOBAL;",
            glob, f.modname
        );
        else_ = "else ";
    }
    let _ = writeln!(
        body,
        "\t{else_}if (!_feature_init_{0}()) status_{0} = FEAT_FAIL;",
        f.modname
    );
    if f.keeps_success_flag() {
        let _ = writeln!(body, "\thas_{0} = status_{0} == FEAT_OK;", f.modname);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph;

    fn fixture() -> (FeatureTable, Schedule) {
        let mut t = FeatureTable::new();

        let mut ent = Feature::new("ent", None, 0);
        ent.is_requested = true;
        t.insert(ent);

        let mut warp = Feature::new("warp", Some("Warp around".to_string()), 1);
        warp.needs = vec!["ent".to_string()];
        warp.has_preinit = true;
        warp.has_end = true;
        warp.need_gamedata = vec!["off_mv".to_string()];
        warp.need_globals = vec!["factory_client".to_string()];
        t.insert(warp);

        let mut multi = Feature::new("multi", Some("Another thing".to_string()), 2);
        multi.needs = vec!["ent".to_string(), "warp".to_string()];
        t.insert(multi);

        let schedule = graph::schedule(&t).unwrap();
        (t, schedule)
    }

    #[test]
    fn test_single_need_direct_test() {
        let (t, s) = fixture();
        let c = emit(&t, &s).content;
        assert!(c.contains("\tif (status_ent != FEAT_OK) status_warp = FEAT_REQFAIL;"));
    }

    #[test]
    fn test_multi_need_conjunction() {
        let (t, s) = fixture();
        let c = emit(&t, &s).content;
        assert!(c.contains("\tbool metdeps_multi =\n"));
        assert!(c.contains("\t\tstatus_ent == FEAT_OK &&\n"));
        assert!(c.contains("\t\tstatus_warp == FEAT_OK;\n"));
        assert!(c.contains("\tif (!metdeps_multi) status_multi = FEAT_REQFAIL;"));
    }

    #[test]
    fn test_else_chain_order() {
        let (t, s) = fixture();
        let c = emit(&t, &s).content;
        let pre = c.find("else if (!_feature_preinit_warp()) status_warp = FEAT_PREFAIL;");
        let gd = c.find("else if (!has_off_mv) status_warp = FEAT_NOGD;");
        let glob = c.find("else if (!factory_client) status_warp = FEAT_NOGLOBAL;");
        let init = c.find("else if (!_feature_init_warp()) status_warp = FEAT_FAIL;");
        assert!(pre.unwrap() < gd.unwrap());
        assert!(gd.unwrap() < glob.unwrap());
        assert!(glob.unwrap() < init.unwrap());
    }

    #[test]
    fn test_no_deps_no_else_on_first_check() {
        let (t, s) = fixture();
        let c = emit(&t, &s).content;
        // "ent" has no needs, so its init check starts the chain
        assert!(c.contains("\tif (!_feature_init_ent()) status_ent = FEAT_FAIL;"));
    }

    #[test]
    fn test_flag_visibility() {
        let (t, s) = fixture();
        let c = emit(&t, &s).content;
        // requested: extern-visible; teardown only: static; neither: elided
        assert!(c.contains("\nbool has_ent = false;\n"));
        assert!(c.contains("\nstatic bool has_warp = false;\n"));
        assert!(!c.contains("has_multi"));
    }

    #[test]
    fn test_teardown_reverse_and_filtered() {
        let (t, s) = fixture();
        let c = emit(&t, &s).content;
        let end = c.find("static void endfeatures(void)").unwrap();
        let teardown = &c[end..];
        // only warp declared END
        assert!(teardown.contains("\tif (has_warp) _feature_end_warp();"));
        assert!(!teardown.contains("_feature_end_ent"));
        assert!(!teardown.contains("_feature_end_multi"));
    }

    #[test]
    fn test_listing_sorted_by_description() {
        let (t, s) = fixture();
        let c = emit(&t, &s).content;
        // "Another thing" < "Warp around"
        let multi = c.find("featmsgs[(int)status_multi], \"Another thing\");").unwrap();
        let warp = c.find("featmsgs[(int)status_warp], \"Warp around\");").unwrap();
        assert!(multi < warp);
        // ent has no description and stays out of the listing
        assert!(!c.contains("featmsgs[(int)status_ent]"));
    }

    #[test]
    fn test_status_blocks_follow_schedule_order() {
        let (t, s) = fixture();
        let c = emit(&t, &s).content;
        let ent = c.find("\tchar status_ent = FEAT_OK;").unwrap();
        let warp = c.find("\tchar status_warp = FEAT_OK;").unwrap();
        let multi = c.find("\tchar status_multi = FEAT_OK;").unwrap();
        assert!(ent < warp);
        assert!(warp < multi);
    }
}
