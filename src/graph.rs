//! Dependency graph construction and topological scheduling.
//!
//! The graph is never materialised separately: edges are the `needs` and
//! `wants` lists on each [`Feature`], holding module names that index back
//! into the feature table. [`apply_directives`] links raw directives into
//! those lists (resolving names, fatally, against the table), and
//! [`schedule`] runs a three-color depth-first traversal to produce the
//! initialization order. Teardown is the exact reverse.

use crate::error::BuildError;
use crate::extract::FeatDirective;
use crate::model::FeatureTable;
use std::collections::HashMap;

/// Depth-first traversal marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unseen,
    Seeing,
    Seen,
}

/// Linear initialization order over all features.
#[derive(Debug, Clone)]
pub struct Schedule {
    /// Module names in initialization order: every feature appears after
    /// all of its needs and wants.
    pub init_order: Vec<String>,
}

impl Schedule {
    /// Teardown order: the exact reverse of the initialization order.
    pub fn teardown_order(&self) -> impl Iterator<Item = &str> {
        self.init_order.iter().rev().map(String::as_str)
    }
}

/// Link one feature's raw directives into the graph.
///
/// Feature references are resolved against the completed table; a name that
/// doesn't resolve is a fatal error. `REQUEST` targets are additionally
/// marked as requested, which forces their success flag to stay externally
/// visible.
pub fn apply_directives(
    table: &mut FeatureTable,
    module: &str,
    directives: &[FeatDirective],
) -> Result<(), BuildError> {
    for dir in directives {
        match dir {
            FeatDirective::Require(dep) | FeatDirective::Request(dep) => {
                let optional = matches!(dir, FeatDirective::Request(_));
                if !table.contains(dep) {
                    return Err(BuildError::UnknownFeature {
                        feature: module.to_string(),
                        dependency: dep.clone(),
                    });
                }
                if optional {
                    if let Some(target) = table.get_mut(dep) {
                        target.is_requested = true;
                    }
                }
                if let Some(f) = table.get_mut(module) {
                    if optional {
                        f.wants.push(dep.clone());
                    } else {
                        f.needs.push(dep.clone());
                    }
                }
            }
            FeatDirective::RequireGamedata(name) => {
                if let Some(f) = table.get_mut(module) {
                    f.need_gamedata.push(name.clone());
                }
            }
            FeatDirective::RequireGlobal(name) => {
                if let Some(f) = table.get_mut(module) {
                    f.need_globals.push(name.clone());
                }
            }
            FeatDirective::Preinit => {
                if let Some(f) = table.get_mut(module) {
                    f.has_preinit = true;
                }
            }
            FeatDirective::End => {
                if let Some(f) = table.get_mut(module) {
                    f.has_end = true;
                }
            }
            // every feature has an init step; nothing to record
            FeatDirective::Init => {}
        }
    }
    Ok(())
}

/// Produce the initialization order for all features.
///
/// Classic depth-first scheduling. Per node, wants are visited before needs
/// so optional-dependency status is settled without forcing extra hard
/// ordering constraints. A node reached while still in progress means the
/// configuration has a dependency cycle, which aborts the run with the full
/// cycle path. Roots are taken in name order, so the output is deterministic
/// for identical inputs.
pub fn schedule(table: &FeatureTable) -> Result<Schedule, BuildError> {
    let mut marks: HashMap<&str, Mark> = table
        .iter()
        .map(|f| (f.modname.as_str(), Mark::Unseen))
        .collect();
    let mut order = Vec::with_capacity(table.len());
    let mut path = Vec::new();

    for f in table.iter() {
        visit(table, &f.modname, &mut marks, &mut path, &mut order)?;
    }

    Ok(Schedule { init_order: order })
}

fn visit<'t>(
    table: &'t FeatureTable,
    modname: &'t str,
    marks: &mut HashMap<&'t str, Mark>,
    path: &mut Vec<&'t str>,
    order: &mut Vec<String>,
) -> Result<(), BuildError> {
    match marks.get(modname).copied().unwrap_or(Mark::Unseen) {
        Mark::Seen => return Ok(()),
        Mark::Seeing => {
            let start = path.iter().position(|m| *m == modname).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(|m| m.to_string()).collect();
            cycle.push(modname.to_string());
            return Err(BuildError::DependencyCycle { cycle });
        }
        Mark::Unseen => {}
    }
    marks.insert(modname, Mark::Seeing);
    path.push(modname);

    // resolve pass guarantees every edge names a real feature
    if let Some(f) = table.get(modname) {
        for dep in f.wants.iter().chain(f.needs.iter()) {
            if let Some(dep) = table.get(dep) {
                visit(table, &dep.modname, marks, path, order)?;
            }
        }
    }

    path.pop();
    marks.insert(modname, Mark::Seen);
    order.push(modname.to_string());
    Ok(())
}
