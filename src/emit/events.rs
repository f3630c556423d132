//! Event dispatch glue.
//!
//! Emits `evglue.gen.h`: one `EMIT_<Name>` function per notification event
//! and one `CHECK_<Name>` per predicate. Handlers belonging to feature
//! modules are dispatched conditionally on the feature's success flag;
//! handlers in non-feature modules are called unconditionally.

use super::Artifact;
use crate::model::{Event, EventKind, EventTable};
use std::fmt::Write as _;
use std::path::PathBuf;

pub fn emit(events: &EventTable) -> Artifact {
    let mut body = String::new();

    for (i, ev) in events.iter().enumerate() {
        if i > 0 {
            body.push('\n');
        }
        dispatcher(&mut body, ev);
    }

    Artifact {
        rel_path: PathBuf::from("evglue.gen.h"),
        content: super::guarded("EVGLUE", &body),
    }
}

/// True when the parameter list denotes a no-argument event.
fn is_void(params: &[String]) -> bool {
    params.is_empty() || (params.len() == 1 && params[0] == "void")
}

/// Parameter list for a dispatcher signature: each handler argument is
/// declared with `typeof` over the annotated type expression, so the glue
/// never has to re-parse C type syntax.
fn signature_params(params: &[String]) -> String {
    if is_void(params) {
        return "void".to_string();
    }
    params
        .iter()
        .enumerate()
        .map(|(i, p)| format!("typeof({}) a{}", p, i + 1))
        .collect::<Vec<_>>()
        .join(", ")
}

fn call_args(params: &[String]) -> String {
    if is_void(params) {
        return String::new();
    }
    (1..=params.len())
        .map(|i| format!("a{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn dispatcher(body: &mut String, ev: &Event) {
    let ret = match ev.kind {
        EventKind::Notification => "void",
        EventKind::Predicate => "bool",
    };
    let prefix = match ev.kind {
        EventKind::Notification => "EMIT",
        EventKind::Predicate => "CHECK",
    };
    let sig = signature_params(&ev.params);
    let args = call_args(&ev.params);

    let _ = writeln!(body, "{ret} {prefix}_{}({sig}) {{", ev.name);
    for h in &ev.handlers {
        let handler_sig = if is_void(&ev.params) {
            "void".to_string()
        } else {
            ev.params
                .iter()
                .map(|p| format!("typeof({p})"))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let _ = writeln!(
            body,
            "\textern {ret} _evhandler_{}_{}({handler_sig});",
            h.module, ev.name
        );
        match ev.kind {
            EventKind::Notification => {
                if h.conditional {
                    let _ = writeln!(
                        body,
                        "\tif (has_{}) _evhandler_{}_{}({args});",
                        h.module, h.module, ev.name
                    );
                } else {
                    let _ = writeln!(body, "\t_evhandler_{}_{}({args});", h.module, ev.name);
                }
            }
            EventKind::Predicate => {
                if h.conditional {
                    let _ = writeln!(
                        body,
                        "\tif (has_{} && !_evhandler_{}_{}({args})) return false;",
                        h.module, h.module, ev.name
                    );
                } else {
                    let _ = writeln!(
                        body,
                        "\tif (!_evhandler_{}_{}({args})) return false;",
                        h.module, ev.name
                    );
                }
            }
        }
    }
    if ev.kind == EventKind::Predicate {
        body.push_str("\treturn true;\n");
    }
    body.push_str("}\n");
}
