//! Message codec emitter.
//!
//! One artifact per schema at `msg/<Name>.gen.h`, containing a byte-packing
//! function and a byte-length function. Both walk each field's type chain
//! outermost to innermost, unrolling container levels into loops; the length
//! function accumulates a compile-time constant for fully fixed fields and
//! generated runtime arithmetic for the rest.
//!
//! Every put helper referenced here writes an exact, fixed number of bytes
//! per call, so the length function agrees with the write function by
//! construction. Scalar widths: bool 1, int/uint/double 9, float 5. Strings,
//! arrays, maps and sub-message headers all carry a 5-byte prefix.

use super::Artifact;
use crate::model::{ArrayLen, MessageSchema, MsgField, WireType};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::PathBuf;

pub fn emit(schema: &MessageSchema, schemas: &BTreeMap<String, MessageSchema>) -> Artifact {
    let mut body = String::new();

    // sub-schema codecs come in via their own headers; the include guards
    // make duplicates harmless but don't emit them in the first place
    let mut included = BTreeSet::new();
    for field in &schema.fields {
        if let WireType::Map { schema: sub } = field.tail() {
            if included.insert(sub.clone()) {
                let _ = writeln!(body, "#include <msg/{sub}.gen.h>");
            }
        }
    }
    if !included.is_empty() {
        body.push('\n');
    }

    write_fn(&mut body, schema);
    body.push('\n');
    len_fn(&mut body, schema, schemas);

    Artifact {
        rel_path: PathBuf::from("msg").join(format!("{}.gen.h", schema.name)),
        content: super::guarded(&format!("MSG_{}", schema.name), &body),
    }
}

/// Append one generated line at the given loop nesting depth. Everything in
/// a function body starts at one tab; each open container level adds one.
fn line(body: &mut String, depth: usize, text: &str) {
    for _ in 0..=depth {
        body.push('\t');
    }
    body.push_str(text);
    body.push('\n');
}

/// Source expression for a fixed array level's element count.
fn array_len_expr(len: &ArrayLen) -> String {
    match len {
        ArrayLen::Literal(n) => n.to_string(),
        ArrayLen::Named(name) => name.clone(),
    }
}

/// Variable naming down a chain: level 0 reads the host struct member
/// directly, deeper levels read `<key>_<n>` locals introduced one level up.
fn var_at(field: &MsgField, idx: usize) -> String {
    if idx == 0 {
        format!("msg->{}", field.name)
    } else {
        format!("{}_{}", field.key, idx - 1)
    }
}

fn write_fn(body: &mut String, schema: &MessageSchema) {
    let _ = writeln!(
        body,
        "static int _msg_write_{0}(unsigned char *buf, struct {0} *msg) {{",
        schema.name
    );
    body.push_str("\tunsigned char *start = buf;\n\n");
    if schema.is_msg {
        body.push_str("\tmsg_putasz4(buf++, 2);\n");
        let _ = writeln!(body, "\tmsg_puti7(buf++, _demomsg_{});", schema.name);
    }
    let _ = writeln!(body, "\tmsg_putmsz32(buf, {}); buf += 5;", schema.fields.len());

    for field in &schema.fields {
        body.push('\n');
        let _ = writeln!(body, "\tmsg_putssz5(buf++, {});", field.key.len());
        let _ = writeln!(
            body,
            "\tmemcpy(buf, \"{0}\", {1}); buf += {1};",
            field.key,
            field.key.len()
        );

        let mut depth = 0;
        for (i, level) in field.chain.iter().enumerate() {
            let var = var_at(field, i);
            let next = format!("{}_{}", field.key, i);
            let next_is_array = matches!(field.chain.get(i + 1), Some(WireType::Array { .. }));
            write_level(body, field, level, &var, &next, next_is_array, &mut depth);
        }
        while depth > 0 {
            depth -= 1;
            line(body, depth, "}");
        }
    }

    body.push_str("\n\treturn buf - start;\n}\n");
}

fn write_level(
    body: &mut String,
    field: &MsgField,
    level: &WireType,
    var: &str,
    next: &str,
    next_is_array: bool,
    depth: &mut usize,
) {
    let d = *depth;
    match level {
        WireType::Bool => line(body, d, &format!("msg_putbool(buf++, {var});")),
        WireType::Int => line(body, d, &format!("msg_puti64(buf, {var}); buf += 9;")),
        WireType::UInt => line(body, d, &format!("msg_putu64(buf, {var}); buf += 9;")),
        WireType::Float => line(body, d, &format!("msg_putf(buf, {var}); buf += 5;")),
        WireType::Double => line(body, d, &format!("msg_putd(buf, {var}); buf += 9;")),
        WireType::Str { len } => {
            line(body, d, &format!("msg_putssz32(buf, {len}); buf += 5;"));
            line(body, d, &format!("memcpy(buf, {var}, {len}); buf += {len};"));
        }
        WireType::DynStr => {
            let key = &field.key;
            line(body, d, &format!("int {key}_len = strlen({var});"));
            line(body, d, &format!("msg_putssz32(buf, {key}_len); buf += 5;"));
            line(
                body,
                d,
                &format!("memcpy(buf, {var}, {key}_len); buf += {key}_len;"),
            );
        }
        WireType::Map { schema } => {
            line(body, d, &format!("buf += _msg_write_{schema}(buf, &{var});"));
        }
        WireType::Ptr => line(body, d, &format!("typeof(*{var}) {next} = *{var};")),
        WireType::Array { len } => {
            let sz = array_len_expr(len);
            line(body, d, &format!("msg_putasz32(buf, {sz}); buf += 5;"));
            line(
                body,
                d,
                &format!("for (typeof(&*{var}) x = {var}; x - {var} < {sz}; x++) {{"),
            );
            let amp = if next_is_array { "&*" } else { "*" };
            line(body, d + 1, &format!("typeof({amp}{var}) {next} = *x;"));
            *depth += 1;
        }
        WireType::DynArray { len_field } => {
            let sz = format!("msg->{len_field}");
            line(body, d, &format!("msg_putasz32(buf, {sz}); buf += 5;"));
            line(
                body,
                d,
                &format!("for (typeof({var}) x = {var}; x - {var} < {sz}; x++) {{"),
            );
            line(body, d + 1, &format!("typeof(*{var}) {next} = *x;"));
            *depth += 1;
        }
    }
}

fn len_fn(body: &mut String, schema: &MessageSchema, schemas: &BTreeMap<String, MessageSchema>) {
    let _ = writeln!(
        body,
        "static int _msg_len_{0}(struct {0} *msg) {{",
        schema.name
    );
    if schema.dynamic {
        body.push_str("\tint dynlen = 0;\n");
    }

    // (msg type tag +) map header
    let mut fixed: u64 = 2 * schema.is_msg as u64 + 5;
    for field in &schema.fields {
        fixed += field.key.len() as u64 + 1;
        if tail_dynamic(field, schemas) {
            len_loop(body, field);
        } else if mid_dynamic(field) {
            let key = &field.key;
            line(
                body,
                0,
                &format!("int {key}_len = {};", len_expr(field, schemas)),
            );
            line(body, 0, &format!("dynlen += {key}_len;"));
        } else {
            fixed += u64::from(fixed_field_len(field, schemas));
        }
    }

    let _ = writeln!(
        body,
        "\treturn {fixed}{};",
        if schema.dynamic { " + dynlen" } else { "" }
    );
    body.push_str("}\n");
}

/// Runtime accumulation for a field whose innermost level is itself
/// variable-sized: unwind the chain exactly like the write side but add to
/// `dynlen` instead of emitting bytes.
fn len_loop(body: &mut String, field: &MsgField) {
    let key = &field.key;
    line(
        body,
        0,
        &format!("typeof(msg->{0}) {key}_0 = msg->{0};", field.name),
    );

    let mut depth = 0;
    let last = field.chain.len() - 1;
    for (i, level) in field.chain[..last].iter().enumerate() {
        let var = format!("{key}_{i}");
        let next = format!("{key}_{}", i + 1);
        let next_is_array = matches!(field.chain.get(i + 1), Some(WireType::Array { .. }));
        match level {
            WireType::Array { len } => {
                let sz = array_len_expr(len);
                line(body, depth, "dynlen += 5;");
                line(
                    body,
                    depth,
                    &format!("for (typeof(&*{var}) x = {var}; x - {var} < {sz}; x++) {{"),
                );
                let amp = if next_is_array { "&*" } else { "*" };
                line(body, depth + 1, &format!("typeof({amp}{var}) {next} = *x;"));
                depth += 1;
            }
            WireType::DynArray { len_field } => {
                line(body, depth, "dynlen += 5;");
                line(
                    body,
                    depth,
                    &format!(
                        "for (typeof({var}) x = {var}; x - {var} < msg->{len_field}; x++) {{"
                    ),
                );
                line(body, depth + 1, &format!("typeof(*{var}) {next} = *x;"));
                depth += 1;
            }
            // only other mid-chain level is a pointer passthrough
            _ => line(body, depth, &format!("typeof(*{var}) {next} = *{var};")),
        }
    }

    let tail_var = format!("{key}_{last}");
    match field.tail() {
        WireType::Map { schema } => line(
            body,
            depth,
            &format!("dynlen += _msg_len_{schema}(&{tail_var});"),
        ),
        // remaining dynamic tail is a runtime string: content + prefix
        _ => line(body, depth, &format!("dynlen += strlen({tail_var}) + 5;")),
    }

    while depth > 0 {
        depth -= 1;
        line(body, depth, "}");
    }
}

/// The innermost level's size can't be folded into a constant: runtime
/// string, or a nested schema that is itself dynamic.
fn tail_dynamic(field: &MsgField, schemas: &BTreeMap<String, MessageSchema>) -> bool {
    match field.tail() {
        WireType::DynStr => true,
        WireType::Map { schema } => schemas.get(schema).map_or(false, |s| s.dynamic),
        _ => false,
    }
}

/// A container level's element count is only known at runtime (or at C
/// compile time, for a named constant), so the total is an expression.
fn mid_dynamic(field: &MsgField) -> bool {
    field.chain.iter().any(|t| {
        matches!(
            t,
            WireType::DynArray { .. }
                | WireType::Array {
                    len: ArrayLen::Named(_)
                }
        )
    })
}

/// Encoded width of a fixed-size tail level.
fn tail_fixed_width(tail: &WireType, schemas: &BTreeMap<String, MessageSchema>) -> u32 {
    match tail {
        WireType::Map { schema } => schemas
            .get(schema)
            .map_or(5, |s| schema_fixed_len(s, schemas)),
        other => other.fixed_width(),
    }
}

/// Total encoded length of a fully static schema, headers and keys included.
fn schema_fixed_len(schema: &MessageSchema, schemas: &BTreeMap<String, MessageSchema>) -> u32 {
    let mut n = 2 * schema.is_msg as u32 + 5;
    for field in &schema.fields {
        n += field.key.len() as u32 + 1 + fixed_field_len(field, schemas);
    }
    n
}

/// Constant width of a field whose whole chain is fixed-size.
fn fixed_field_len(field: &MsgField, schemas: &BTreeMap<String, MessageSchema>) -> u32 {
    let mut w = tail_fixed_width(field.tail(), schemas);
    for level in field.chain[..field.chain.len() - 1].iter().rev() {
        match level {
            WireType::Array {
                len: ArrayLen::Literal(n),
            } => w = 5 + n * w,
            // pointer levels are a pure passthrough
            _ => {}
        }
    }
    w
}

/// Width expression for a field with runtime-counted containers but a
/// fixed-size tail, built innermost out.
fn len_expr(field: &MsgField, schemas: &BTreeMap<String, MessageSchema>) -> String {
    let mut expr = tail_fixed_width(field.tail(), schemas).to_string();
    for level in field.chain[..field.chain.len() - 1].iter().rev() {
        match level {
            WireType::Array { len } => {
                expr = format!("(5 + {} * {expr})", array_len_expr(len));
            }
            WireType::DynArray { len_field } => {
                expr = format!("(5 + msg->{len_field} * {expr})");
            }
            _ => {}
        }
    }
    expr
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, key: &str, chain: Vec<WireType>) -> MsgField {
        MsgField {
            name: name.to_string(),
            key: key.to_string(),
            chain,
        }
    }

    fn schema(name: &str, is_msg: bool, dynamic: bool, fields: Vec<MsgField>) -> MessageSchema {
        MessageSchema {
            name: name.to_string(),
            is_msg,
            fields,
            dynamic,
        }
    }

    fn lone(s: MessageSchema) -> (MessageSchema, BTreeMap<String, MessageSchema>) {
        let mut all = BTreeMap::new();
        all.insert(s.name.clone(), s.clone());
        (s, all)
    }

    #[test]
    fn test_write_header_and_scalars() {
        let (s, all) = lone(schema(
            "CmdSent",
            true,
            true,
            vec![
                field("flag", "f", vec![WireType::Bool]),
                field("name", "n", vec![WireType::DynStr]),
            ],
        ));
        let c = emit(&s, &all).content;

        assert!(c.contains(
            "static int _msg_write_CmdSent(unsigned char *buf, struct CmdSent *msg) {"
        ));
        assert!(c.contains("\tmsg_putasz4(buf++, 2);\n\tmsg_puti7(buf++, _demomsg_CmdSent);"));
        assert!(c.contains("\tmsg_putmsz32(buf, 2); buf += 5;"));
        assert!(c.contains("\tmsg_putssz5(buf++, 1);\n\tmemcpy(buf, \"f\", 1); buf += 1;"));
        assert!(c.contains("\tmsg_putbool(buf++, msg->flag);"));
        assert!(c.contains("\tint n_len = strlen(msg->name);"));
        assert!(c.contains("\tmsg_putssz32(buf, n_len); buf += 5;"));
        assert!(c.contains("\tmemcpy(buf, msg->name, n_len); buf += n_len;"));
        assert!(c.contains("\treturn buf - start;"));
    }

    #[test]
    fn test_len_fixed_plus_dynlen() {
        let (s, all) = lone(schema(
            "CmdSent",
            true,
            true,
            vec![
                field("flag", "f", vec![WireType::Bool]),
                field("name", "n", vec![WireType::DynStr]),
            ],
        ));
        let c = emit(&s, &all).content;

        // 2 (msg tag) + 5 (map) + 2 (key f) + 1 (bool) + 2 (key n) = 12
        assert!(c.contains("\tint dynlen = 0;"));
        assert!(c.contains("\ttypeof(msg->name) n_0 = msg->name;"));
        assert!(c.contains("\tdynlen += strlen(n_0) + 5;"));
        assert!(c.contains("\treturn 12 + dynlen;"));
    }

    #[test]
    fn test_fully_fixed_schema_is_a_constant() {
        let (s, all) = lone(schema(
            "Vec3",
            false,
            false,
            vec![
                field("x", "x", vec![WireType::Float]),
                field("y", "y", vec![WireType::Float]),
                field("z", "z", vec![WireType::Float]),
            ],
        ));
        let c = emit(&s, &all).content;

        assert!(!c.contains("dynlen"));
        // 5 (map) + 3 * (2 key + 5 float) = 26
        assert!(c.contains("\treturn 26;"));
    }

    #[test]
    fn test_fixed_array_unrolls_into_loop() {
        let (s, all) = lone(schema(
            "Pose",
            false,
            false,
            vec![field(
                "quat",
                "q",
                vec![
                    WireType::Array {
                        len: ArrayLen::Literal(4),
                    },
                    WireType::Double,
                ],
            )],
        ));
        let c = emit(&s, &all).content;

        assert!(c.contains("\tmsg_putasz32(buf, 4); buf += 5;"));
        assert!(c.contains("\tfor (typeof(&*msg->quat) x = msg->quat; x - msg->quat < 4; x++) {"));
        assert!(c.contains("\t\ttypeof(*msg->quat) q_0 = *x;"));
        assert!(c.contains("\t\tmsg_putd(buf, q_0); buf += 9;"));
        // 5 (map) + 2 (key) + 5 + 4 * 9 = 48
        assert!(c.contains("\treturn 48;"));
    }

    #[test]
    fn test_dyn_array_length_expression() {
        let (s, all) = lone(schema(
            "Samples",
            true,
            true,
            vec![field(
                "vals",
                "v",
                vec![
                    WireType::DynArray {
                        len_field: "nvals".to_string(),
                    },
                    WireType::Float,
                ],
            )],
        ));
        let c = emit(&s, &all).content;

        assert!(c.contains("\tmsg_putasz32(buf, msg->nvals); buf += 5;"));
        assert!(c.contains("\tfor (typeof(msg->vals) x = msg->vals; x - msg->vals < msg->nvals; x++) {"));
        assert!(c.contains("\tint v_len = (5 + msg->nvals * 5);"));
        assert!(c.contains("\tdynlen += v_len;"));
        // 2 + 5 + 2 (key v)
        assert!(c.contains("\treturn 9 + dynlen;"));
    }

    #[test]
    fn test_dyn_array_of_dyn_strings_loops_in_len() {
        let (s, all) = lone(schema(
            "Args",
            true,
            true,
            vec![field(
                "strs",
                "s",
                vec![
                    WireType::DynArray {
                        len_field: "n".to_string(),
                    },
                    WireType::DynStr,
                ],
            )],
        ));
        let c = emit(&s, &all).content;

        assert!(c.contains("\ttypeof(msg->strs) s_0 = msg->strs;"));
        assert!(c.contains("\tdynlen += 5;"));
        assert!(c.contains("\tfor (typeof(s_0) x = s_0; x - s_0 < msg->n; x++) {"));
        assert!(c.contains("\t\ttypeof(*s_0) s_1 = *x;"));
        assert!(c.contains("\t\tdynlen += strlen(s_1) + 5;"));
    }

    #[test]
    fn test_ptr_level_is_a_passthrough() {
        let (s, all) = lone(schema(
            "Boxed",
            false,
            false,
            vec![field("val", "v", vec![WireType::Ptr, WireType::Int])],
        ));
        let c = emit(&s, &all).content;

        assert!(c.contains("\ttypeof(*msg->val) v_0 = *msg->val;"));
        assert!(c.contains("\tmsg_puti64(buf, v_0); buf += 9;"));
        // 5 (map) + 2 (key) + 9 (int; ptr adds nothing)
        assert!(c.contains("\treturn 16;"));
    }

    #[test]
    fn test_map_tail_includes_and_delegates() {
        let vec3 = schema(
            "Vec3",
            false,
            false,
            vec![
                field("x", "x", vec![WireType::Float]),
                field("y", "y", vec![WireType::Float]),
                field("z", "z", vec![WireType::Float]),
            ],
        );
        let pos = schema(
            "PlayerPos",
            true,
            false,
            vec![field(
                "pos",
                "p",
                vec![WireType::Map {
                    schema: "Vec3".to_string(),
                }],
            )],
        );
        let mut all = BTreeMap::new();
        all.insert(vec3.name.clone(), vec3);
        all.insert(pos.name.clone(), pos.clone());

        let c = emit(&pos, &all).content;
        assert!(c.contains("#include <msg/Vec3.gen.h>"));
        assert!(c.contains("\tbuf += _msg_write_Vec3(buf, &msg->pos);"));
        // 2 + 5 + 2 (key) + 26 (Vec3 fixed)
        assert!(c.contains("\treturn 35;"));
    }

    #[test]
    fn test_dynamic_map_tail_uses_len_fn() {
        let inner = schema(
            "Note",
            false,
            true,
            vec![field("text", "t", vec![WireType::DynStr])],
        );
        let outer = schema(
            "Wrap",
            true,
            true,
            vec![field(
                "note",
                "n",
                vec![WireType::Map {
                    schema: "Note".to_string(),
                }],
            )],
        );
        let mut all = BTreeMap::new();
        all.insert(inner.name.clone(), inner);
        all.insert(outer.name.clone(), outer.clone());

        let c = emit(&outer, &all).content;
        assert!(c.contains("\ttypeof(msg->note) n_0 = msg->note;"));
        assert!(c.contains("\tdynlen += _msg_len_Note(&n_0);"));
    }

    #[test]
    fn test_guard_and_path() {
        let (s, all) = lone(schema("CmdSent", true, false, vec![]));
        let art = emit(&s, &all);
        assert_eq!(art.rel_path, PathBuf::from("msg/CmdSent.gen.h"));
        assert!(art.content.contains("#ifndef INC_MSG_CmdSent_H"));
    }

    #[test]
    fn test_nested_fixed_arrays_take_array_reference() {
        let (s, all) = lone(schema(
            "Grid",
            false,
            false,
            vec![field(
                "cells",
                "c",
                vec![
                    WireType::Array {
                        len: ArrayLen::Literal(2),
                    },
                    WireType::Array {
                        len: ArrayLen::Literal(3),
                    },
                    WireType::Int,
                ],
            )],
        ));
        let c = emit(&s, &all).content;

        // outer loop hands the inner loop an array reference, not a value
        assert!(c.contains("\t\ttypeof(&*msg->cells) c_0 = *x;"));
        assert!(c.contains("\t\tfor (typeof(&*c_0) x = c_0; x - c_0 < 3; x++) {"));
        assert!(c.contains("\t\t\ttypeof(*c_0) c_1 = *x;"));
        assert!(c.contains("\t\t\tmsg_puti64(buf, c_1); buf += 9;"));
        // 5 + 2 + (5 + 2*(5 + 3*9)) = 76
        assert!(c.contains("\treturn 76;"));
    }
}
