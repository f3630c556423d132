//! Command/variable registration glue.
//!
//! Emits `cmdinit.gen.h`: extern declarations for every harvested console
//! command and variable, a `regcmds()` that registers everything not marked
//! unregistered (initializing variable values first), and a `freevars()`
//! that releases variable strings at shutdown.

use super::Artifact;
use crate::extract::ConDecl;
use std::fmt::Write as _;
use std::path::PathBuf;

pub fn emit(decls: &[ConDecl]) -> Artifact {
    let mut body = String::new();

    for d in decls {
        let kind = if d.is_var { "var" } else { "cmd" };
        let _ = writeln!(body, "extern struct con_{} *{};", kind, d.name);
    }
    body.push('\n');

    body.push_str("static void regcmds(void) {\n");
    for d in decls {
        if d.is_var {
            let _ = writeln!(body, "\tinitval({});", d.name);
        }
        if !d.unregistered {
            let _ = writeln!(body, "\tcon_reg({});", d.name);
        }
    }
    body.push_str("}\n\n");

    body.push_str("static void freevars(void) {\n");
    for d in decls {
        if d.is_var {
            let _ = writeln!(body, "\textfree({}->strval);", d.name);
        }
    }
    body.push_str("}\n");

    Artifact {
        rel_path: PathBuf::from("cmdinit.gen.h"),
        content: super::guarded("CMDINIT", &body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(name: &str, is_var: bool, unregistered: bool) -> ConDecl {
        ConDecl {
            name: name.to_string(),
            is_var,
            unregistered,
        }
    }

    #[test]
    fn test_emit_registers_and_frees() {
        let art = emit(&[
            decl("sst_autojump", true, false),
            decl("sst_do_thing", false, false),
            decl("sst_hidden", true, true),
        ]);

        assert_eq!(art.rel_path, PathBuf::from("cmdinit.gen.h"));
        let c = &art.content;
        assert!(c.contains("extern struct con_var *sst_autojump;"));
        assert!(c.contains("extern struct con_cmd *sst_do_thing;"));
        assert!(c.contains("\tinitval(sst_autojump);"));
        assert!(c.contains("\tcon_reg(sst_autojump);"));
        assert!(c.contains("\tcon_reg(sst_do_thing);"));
        // unregistered vars get their value set up but are never registered
        assert!(c.contains("\tinitval(sst_hidden);"));
        assert!(!c.contains("con_reg(sst_hidden)"));
        assert!(c.contains("\textfree(sst_autojump->strval);"));
        assert!(!c.contains("extfree(sst_do_thing"));
    }

    #[test]
    fn test_emit_empty() {
        let art = emit(&[]);
        assert!(art.content.contains("static void regcmds(void) {\n}"));
        assert!(art.content.contains("static void freevars(void) {\n}"));
    }
}
