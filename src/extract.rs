//! Metadata extractor for annotated C source files.
//!
//! A [`SourceUnit`] is one loaded input file. It exposes four independent
//! enumerations over the annotations in that file:
//!
//! - [`SourceUnit::con_decls`] - console command/variable declarations
//!   (`DEF_CVAR*` / `DEF_CCMD*`)
//! - [`SourceUnit::feature_decl`] / [`SourceUnit::feat_directives`] - feature
//!   declaration (`FEATURE(...)`) and its dependency/requirement/lifecycle
//!   directives (`REQUIRE`, `REQUEST`, `REQUIRE_GAMEDATA`, `REQUIRE_GLOBAL`,
//!   `PREINIT`, `INIT`, `END`)
//! - [`SourceUnit::event_defs`] / [`SourceUnit::event_handlers`] - event
//!   definitions (`DEF_EVENT` / `DEF_PREDICATE`) and per-module handler
//!   registrations (`HANDLE_EVENT`)
//! - [`SourceUnit::msg_schemas`] - message schema declarations (`DEF_MSG` /
//!   `DEF_MSG_STRUCT` followed by `MSG_FIELD` lines)
//!
//! The extractor is line-oriented and deliberately ignorant of C: an
//! annotation is recognised when it starts a line (after whitespace), and
//! everything else is passed over. The rest of the generator consumes only
//! these enumerations.

use crate::error::ExtractError;
use crate::model::{ArrayLen, EventKind, MessageSchema, MsgField, WireType};
use std::path::{Path, PathBuf};

/// Wire-format keys are length-prefixed with a 5-bit size.
const MAX_KEY_LEN: usize = 31;

/// One loaded annotated source file.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    /// Path the file was loaded from.
    pub path: PathBuf,

    /// File content.
    pub content: String,
}

/// A console command or variable declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConDecl {
    /// Declared name.
    pub name: String,

    /// Variable rather than command.
    pub is_var: bool,

    /// Declared but not registered at startup.
    pub unregistered: bool,
}

/// A feature declaration found in a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureDecl {
    /// User-facing description; `None` when declared without one.
    pub desc: Option<String>,
}

/// One dependency/requirement/lifecycle directive of a feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatDirective {
    /// Hard dependency on another feature.
    Require(String),
    /// Optional dependency on another feature.
    Request(String),
    /// Required gamedata flag.
    RequireGamedata(String),
    /// Required global pointer.
    RequireGlobal(String),
    /// Has a pre-initialization step.
    Preinit,
    /// Has a main initialization step.
    Init,
    /// Has a teardown step.
    End,
}

/// An event definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDef {
    /// Unique event name.
    pub name: String,

    /// Parameter type tokens, passed through verbatim.
    pub params: Vec<String>,

    /// Dispatch discipline.
    pub kind: EventKind,
}

impl SourceUnit {
    /// Load one input file.
    pub fn load(path: &Path) -> Result<Self, ExtractError> {
        let content = std::fs::read_to_string(path).map_err(|e| ExtractError::Io {
            file: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            content,
        })
    }

    /// Build a unit from in-memory content. Used by tests and by callers
    /// that already hold the file.
    pub fn from_content(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    /// Enumerate console command/variable declarations.
    pub fn con_decls(&self) -> Vec<ConDecl> {
        let mut decls = Vec::new();
        for (line, _) in self.annotation_lines() {
            let Some(ann) = parse_annotation(line) else {
                continue;
            };
            let (is_var, unregistered) = match ann.name {
                "DEF_CVAR" | "DEF_CVAR_MIN" | "DEF_CVAR_MAX" | "DEF_CVAR_MINMAX" => (true, false),
                "DEF_CVAR_UNREG" | "DEF_CVAR_MINMAX_UNREG" => (true, true),
                "DEF_CCMD" | "DEF_CCMD_HERE" => (false, false),
                "DEF_CCMD_UNREG" | "DEF_CCMD_HERE_UNREG" => (false, true),
                _ => continue,
            };
            if let Some(name) = ann.args.first() {
                decls.push(ConDecl {
                    name: name.clone(),
                    is_var,
                    unregistered,
                });
            }
        }
        decls
    }

    /// Look for a feature declaration.
    ///
    /// Returns `None` if the file does not declare a feature, and a decl
    /// with an empty description when it is declared without a user-facing
    /// one.
    pub fn feature_decl(&self) -> Option<FeatureDecl> {
        for (line, _) in self.annotation_lines() {
            let Some(ann) = parse_annotation(line) else {
                continue;
            };
            if ann.name == "FEATURE" {
                let desc = ann.args.first().and_then(|a| unquote(a)).filter(|d| !d.is_empty());
                return Some(FeatureDecl { desc });
            }
        }
        None
    }

    /// Enumerate dependency/requirement/lifecycle directives.
    pub fn feat_directives(&self) -> Result<Vec<FeatDirective>, ExtractError> {
        let mut dirs = Vec::new();
        for (line, lineno) in self.annotation_lines() {
            if let Some(word) = bare_directive(line) {
                match word {
                    "PREINIT" => dirs.push(FeatDirective::Preinit),
                    "INIT" => dirs.push(FeatDirective::Init),
                    "END" => dirs.push(FeatDirective::End),
                    _ => {}
                }
                continue;
            }
            let Some(ann) = parse_annotation(line) else {
                continue;
            };
            let push = |dirs: &mut Vec<FeatDirective>,
                        make: fn(String) -> FeatDirective|
             -> Result<(), ExtractError> {
                let arg = ann.args.first().filter(|a| !a.is_empty()).ok_or_else(|| {
                    ExtractError::malformed(
                        self.path.clone(),
                        lineno,
                        format!("{} needs a name argument", ann.name),
                    )
                })?;
                dirs.push(make(arg.clone()));
                Ok(())
            };
            match ann.name {
                "REQUIRE" => push(&mut dirs, FeatDirective::Require)?,
                "REQUEST" => push(&mut dirs, FeatDirective::Request)?,
                "REQUIRE_GAMEDATA" => push(&mut dirs, FeatDirective::RequireGamedata)?,
                "REQUIRE_GLOBAL" => push(&mut dirs, FeatDirective::RequireGlobal)?,
                _ => {}
            }
        }
        Ok(dirs)
    }

    /// Enumerate event definitions.
    pub fn event_defs(&self) -> Result<Vec<EventDef>, ExtractError> {
        let mut defs = Vec::new();
        for (line, lineno) in self.annotation_lines() {
            let Some(ann) = parse_annotation(line) else {
                continue;
            };
            let kind = match ann.name {
                "DEF_EVENT" => EventKind::Notification,
                "DEF_PREDICATE" => EventKind::Predicate,
                _ => continue,
            };
            let mut args = ann.args.into_iter();
            let name = args.next().filter(|a| !a.is_empty()).ok_or_else(|| {
                ExtractError::malformed(self.path.clone(), lineno, "event definition needs a name")
            })?;
            defs.push(EventDef {
                name,
                params: args.collect(),
                kind,
            });
        }
        Ok(defs)
    }

    /// Enumerate names of events handled in this file.
    pub fn event_handlers(&self) -> Vec<String> {
        let mut names = Vec::new();
        for (line, _) in self.annotation_lines() {
            let Some(ann) = parse_annotation(line) else {
                continue;
            };
            if ann.name == "HANDLE_EVENT" {
                if let Some(name) = ann.args.first().filter(|a| !a.is_empty()) {
                    names.push(name.clone());
                }
            }
        }
        names
    }

    /// Enumerate message schema declarations with their field type chains.
    pub fn msg_schemas(&self) -> Result<Vec<MessageSchema>, ExtractError> {
        let mut schemas: Vec<MessageSchema> = Vec::new();
        for (line, lineno) in self.annotation_lines() {
            let Some(ann) = parse_annotation(line) else {
                continue;
            };
            match ann.name {
                "DEF_MSG" | "DEF_MSG_STRUCT" => {
                    let name = ann.args.first().filter(|a| !a.is_empty()).ok_or_else(|| {
                        ExtractError::malformed(self.path.clone(), lineno, "schema needs a name")
                    })?;
                    schemas.push(MessageSchema {
                        name: name.clone(),
                        is_msg: ann.name == "DEF_MSG",
                        fields: Vec::new(),
                        dynamic: false,
                    });
                }
                "MSG_FIELD" => {
                    let schema = schemas.last_mut().ok_or_else(|| {
                        ExtractError::malformed(
                            self.path.clone(),
                            lineno,
                            "MSG_FIELD outside of a schema declaration",
                        )
                    })?;
                    let field = self.parse_field(ann.args, lineno)?;
                    schema.fields.push(field);
                }
                _ => {}
            }
        }
        Ok(schemas)
    }

    /// Parse one `MSG_FIELD(name, "key", chain...)` annotation.
    fn parse_field(&self, args: Vec<String>, lineno: usize) -> Result<MsgField, ExtractError> {
        let malformed =
            |msg: String| ExtractError::malformed(self.path.clone(), lineno, msg);

        let mut it = args.into_iter();
        let name = it
            .next()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| malformed("field needs a name".to_string()))?;
        let key = it
            .next()
            .and_then(|a| unquote(&a))
            .ok_or_else(|| malformed(format!("field `{name}` needs a quoted wire key")))?;
        if key.is_empty() || key.len() > MAX_KEY_LEN {
            return Err(malformed(format!(
                "wire key for `{name}` must be 1..={MAX_KEY_LEN} bytes"
            )));
        }
        // keys double as generated local variable prefixes
        if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(malformed(format!(
                "wire key for `{name}` may only contain identifier characters"
            )));
        }

        let mut chain = Vec::new();
        for tok in it {
            chain.push(parse_wire_type(&tok).map_err(|e| {
                malformed(format!("field `{name}`: {e}"))
            })?);
        }
        if chain.is_empty() {
            return Err(malformed(format!("field `{name}` has an empty type chain")));
        }
        if chain.last().is_some_and(WireType::is_container) {
            return Err(malformed(format!(
                "field `{name}`: type chain must end in a scalar, string, or map"
            )));
        }
        if chain[..chain.len() - 1].iter().any(|t| !t.is_container()) {
            return Err(malformed(format!(
                "field `{name}`: only container levels may wrap further levels"
            )));
        }
        Ok(MsgField { name, key, chain })
    }

    /// Lines that can carry annotations: everything except `//` comments,
    /// paired with 1-indexed line numbers.
    fn annotation_lines(&self) -> impl Iterator<Item = (&str, usize)> {
        self.content
            .lines()
            .enumerate()
            .map(|(i, l)| (l.trim(), i + 1))
            .filter(|(l, _)| !l.is_empty() && !l.starts_with("//"))
    }
}

/// A recognised `NAME(args...)` annotation at the start of a line.
struct Annotation<'a> {
    name: &'a str,
    args: Vec<String>,
}

/// Parse a line-leading `NAME(...)` form. Arguments are split on top-level
/// commas, respecting nested parentheses and double-quoted strings. If the
/// closing parenthesis is missing (multi-line declarations), whatever
/// arguments fit on the line are returned; only their leading entries are
/// ever consumed in that case.
fn parse_annotation(line: &str) -> Option<Annotation<'_>> {
    let open = line.find('(')?;
    let name = &line[..open];
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
    {
        return None;
    }

    let body = &line[open + 1..];
    let mut args = Vec::new();
    let mut cur = String::new();
    let mut depth = 0u32;
    let mut in_str = false;
    let mut prev_escape = false;
    for c in body.chars() {
        if in_str {
            cur.push(c);
            if prev_escape {
                prev_escape = false;
            } else if c == '\\' {
                prev_escape = true;
            } else if c == '"' {
                in_str = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_str = true;
                cur.push(c);
            }
            '(' => {
                depth += 1;
                cur.push(c);
            }
            ')' if depth == 0 => break,
            ')' => {
                depth -= 1;
                cur.push(c);
            }
            ',' if depth == 0 => {
                args.push(cur.trim().to_string());
                cur.clear();
            }
            _ => cur.push(c),
        }
    }
    let last = cur.trim();
    if !last.is_empty() {
        args.push(last.to_string());
    }
    Some(Annotation { name, args })
}

/// Recognise a bare lifecycle directive: a line whose first token is the
/// directive, optionally followed by the opening brace of its block.
fn bare_directive(line: &str) -> Option<&str> {
    let word = line.split_whitespace().next()?;
    let rest = line[word.len()..].trim_start();
    if rest.is_empty() || rest.starts_with('{') {
        Some(word)
    } else {
        None
    }
}

/// Strip surrounding double quotes.
fn unquote(s: &str) -> Option<String> {
    let s = s.trim();
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        Some(s[1..s.len() - 1].to_string())
    } else {
        None
    }
}

/// Parse one type-chain token.
///
/// Plain tokens: `bool`, `int`, `uint`, `float`, `double`, `dynstr`, `ptr`.
/// Parameterised: `str(N)`, `arr(N)` / `arr(name)`, `dynarr(field)`,
/// `map(Schema)`.
fn parse_wire_type(tok: &str) -> Result<WireType, String> {
    let (head, arg) = match tok.find('(') {
        Some(open) => {
            let close = tok
                .rfind(')')
                .filter(|&close| close > open)
                .ok_or_else(|| format!("unterminated type token `{tok}`"))?;
            (&tok[..open], Some(tok[open + 1..close].trim()))
        }
        None => (tok, None),
    };
    let require_arg = |what: &str| -> Result<&str, String> {
        arg.filter(|a| !a.is_empty())
            .ok_or_else(|| format!("`{head}` needs a {what} argument"))
    };
    match head {
        "bool" => Ok(WireType::Bool),
        "int" => Ok(WireType::Int),
        "uint" => Ok(WireType::UInt),
        "float" => Ok(WireType::Float),
        "double" => Ok(WireType::Double),
        "dynstr" => Ok(WireType::DynStr),
        "ptr" => Ok(WireType::Ptr),
        "str" => {
            let arg = require_arg("length")?;
            let len = arg
                .parse::<u32>()
                .map_err(|_| format!("`str` length must be a literal, got `{arg}`"))?;
            Ok(WireType::Str { len })
        }
        "arr" => {
            let arg = require_arg("length")?;
            let len = match arg.parse::<u32>() {
                Ok(n) => ArrayLen::Literal(n),
                Err(_) => ArrayLen::Named(arg.to_string()),
            };
            Ok(WireType::Array { len })
        }
        "dynarr" => Ok(WireType::DynArray {
            len_field: require_arg("length field")?.to_string(),
        }),
        "map" => Ok(WireType::Map {
            schema: require_arg("schema")?.to_string(),
        }),
        _ => Err(format!("unknown type token `{tok}`")),
    }
}
