//! Data model and symbol tables.
//!
//! Three entity kinds come out of the harvest passes: features (initializable
//! modules), events (cross-module notification points), and message schemas
//! (serializable structures). Each kind is owned by its table for the whole
//! run; the dependency graph refers into the feature table by module name
//! only.

use crate::error::BuildError;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// One initializable module, declared by a `FEATURE(...)` annotation.
#[derive(Debug, Clone)]
pub struct Feature {
    /// Unique module name, derived from the declaring filename.
    pub modname: String,

    /// Human-readable description. `None` hides the feature from the
    /// user-facing listing.
    pub desc: Option<String>,

    /// Index of the declaring source unit in the build context, used to
    /// re-enumerate directives in the resolve pass.
    pub unit: usize,

    /// Hard dependencies, in declaration order. All must succeed.
    pub needs: Vec<String>,

    /// Optional dependencies, in declaration order. Kept separate from
    /// `needs` so the scheduler can visit them first.
    pub wants: Vec<String>,

    /// Required gamedata flag names, checked at generated-code runtime.
    pub need_gamedata: Vec<String>,

    /// Required global pointer names, checked at generated-code runtime.
    pub need_globals: Vec<String>,

    /// Declares a pre-initialization step.
    pub has_preinit: bool,

    /// Declares a teardown step.
    pub has_end: bool,

    /// Handles one or more events.
    pub has_evhandlers: bool,

    /// Another feature listed this one under its wants, so the success flag
    /// must be externally visible.
    pub is_requested: bool,
}

impl Feature {
    /// Create a fresh feature record for a declaring source unit.
    pub fn new(modname: impl Into<String>, desc: Option<String>, unit: usize) -> Self {
        Self {
            modname: modname.into(),
            desc,
            unit,
            needs: Vec::new(),
            wants: Vec::new(),
            need_gamedata: Vec::new(),
            need_globals: Vec::new(),
            has_preinit: false,
            has_end: false,
            has_evhandlers: false,
            is_requested: false,
        }
    }

    /// Whether the generated success flag is retained at all. Features with
    /// no teardown, no handlers and no requester don't need one.
    pub fn keeps_success_flag(&self) -> bool {
        self.has_end || self.has_evhandlers || self.is_requested
    }
}

/// Dispatch discipline of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Dispatch returns nothing; every handler runs.
    Notification,
    /// Dispatch returns a boolean; the first handler returning false vetoes.
    Predicate,
}

/// One registered handler for an event.
#[derive(Debug, Clone)]
pub struct HandlerBinding {
    /// Module that supplies the handler.
    pub module: String,

    /// The handler is skipped (notification) or vacuously true (predicate)
    /// when the owning feature failed to initialize.
    pub conditional: bool,
}

/// One cross-module notification point.
#[derive(Debug, Clone)]
pub struct Event {
    /// Unique event name.
    pub name: String,

    /// Parameter type tokens, used verbatim in emitted signatures.
    pub params: Vec<String>,

    /// Dispatch discipline.
    pub kind: EventKind,

    /// Handler bindings, in registration order.
    pub handlers: Vec<HandlerBinding>,
}

/// Length source for a fixed array level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrayLen {
    /// Literal element count, known at generation time.
    Literal(u32),
    /// Named count, resolved in the generated code.
    Named(String),
}

/// One level of a message field's type chain.
///
/// A chain reads outermost to innermost; the last level must be a scalar,
/// string, or map, since containers have to wrap something.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireType {
    Bool,
    Int,
    UInt,
    Float,
    Double,
    /// Fixed-size string with a literal byte length.
    Str { len: u32 },
    /// String whose length is computed at runtime.
    DynStr,
    /// Array with a generation-time or named element count.
    Array { len: ArrayLen },
    /// Array whose element count lives in a sibling field.
    DynArray { len_field: String },
    /// Single dereference, then recurse.
    Ptr,
    /// Nested schema, encoded by its own write function.
    Map { schema: String },
}

impl WireType {
    /// Encoded width of the level itself, excluding wrapped content.
    ///
    /// The generated write functions call fixed-width put helpers, so these
    /// are exact, not worst-case. Strings are a 5-byte length prefix plus
    /// content; arrays and maps contribute a 5-byte count prefix; pointers
    /// are a pure passthrough.
    pub fn fixed_width(&self) -> u32 {
        match self {
            WireType::Bool => 1,
            WireType::Int => 9,
            WireType::UInt => 9,
            WireType::Float => 5,
            WireType::Double => 9,
            WireType::Str { len } => 5 + len,
            WireType::DynStr => 5,
            WireType::Array { .. } => 5,
            WireType::DynArray { .. } => 5,
            WireType::Ptr => 0,
            WireType::Map { .. } => 5,
        }
    }

    /// Whether this level wraps further levels.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            WireType::Array { .. } | WireType::DynArray { .. } | WireType::Ptr
        )
    }
}

/// One named field of a message schema.
#[derive(Debug, Clone)]
pub struct MsgField {
    /// Field name in the host structure.
    pub name: String,

    /// Short textual key used in the wire format.
    pub key: String,

    /// Type chain, outermost level first. Never empty.
    pub chain: Vec<WireType>,
}

impl MsgField {
    /// Innermost level of the chain.
    pub fn tail(&self) -> &WireType {
        self.chain.last().expect("type chain is never empty")
    }
}

/// One serializable structure.
#[derive(Debug, Clone)]
pub struct MessageSchema {
    /// Schema name; also the generated C struct name.
    pub name: String,

    /// Top-level demo message (carries a type tag) rather than an embedded
    /// sub-structure.
    pub is_msg: bool,

    /// Fields in declaration order.
    pub fields: Vec<MsgField>,

    /// Total encoded length depends on runtime data. Computed after harvest
    /// by [`crate::driver`], since it needs the full schema set.
    pub dynamic: bool,
}

/// Ordered table of features, keyed by module name.
///
/// Iteration order is plain byte-wise name order, which is what makes the
/// generated output deterministic across runs.
#[derive(Debug, Default)]
pub struct FeatureTable {
    map: BTreeMap<String, Feature>,
}

impl FeatureTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a feature. Features are created exactly once, in the identify
    /// pass, so duplicates cannot occur by construction.
    pub fn insert(&mut self, feature: Feature) {
        self.map.insert(feature.modname.clone(), feature);
    }

    pub fn get(&self, modname: &str) -> Option<&Feature> {
        self.map.get(modname)
    }

    pub fn get_mut(&mut self, modname: &str) -> Option<&mut Feature> {
        self.map.get_mut(modname)
    }

    pub fn contains(&self, modname: &str) -> bool {
        self.map.contains_key(modname)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate features in module-name order.
    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.map.values()
    }

    /// Features carrying a description, sorted for the user-facing listing.
    ///
    /// This second ordering exists purely to alphabetise the display; it has
    /// no effect on generation order. Equal descriptions fall back to module
    /// name so the listing stays deterministic.
    pub fn by_description(&self) -> Vec<&Feature> {
        let mut listed: Vec<&Feature> = self.map.values().filter(|f| f.desc.is_some()).collect();
        listed.sort_by(|a, b| {
            cmp_descriptions(a.desc.as_deref().unwrap(), b.desc.as_deref().unwrap())
                .then_with(|| a.modname.cmp(&b.modname))
        });
        listed
    }
}

/// Ordered table of events, keyed by event name.
#[derive(Debug, Default)]
pub struct EventTable {
    map: BTreeMap<String, Event>,
}

impl EventTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an event definition. Duplicate names are a fatal error.
    pub fn insert(&mut self, event: Event) -> Result<(), BuildError> {
        if self.map.contains_key(&event.name) {
            return Err(BuildError::DuplicateEvent { name: event.name });
        }
        self.map.insert(event.name.clone(), event);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Event> {
        self.map.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Event> {
        self.map.get_mut(name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate events in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.map.values()
    }
}

/// Total order for the description-sorted listing.
///
/// Case-insensitive, with a shorter-string-is-less prefix rule, and
/// same-letter-different-case ties ranked uppercase first.
pub fn cmp_descriptions(a: &str, b: &str) -> Ordering {
    let mut ita = a.chars();
    let mut itb = b.chars();
    loop {
        match (ita.next(), itb.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) => {
                let (la, lb) = (ca.to_ascii_lowercase(), cb.to_ascii_lowercase());
                match la.cmp(&lb) {
                    Ordering::Equal => {}
                    other => return other,
                }
                // same letter: uppercase sorts first
                match (ca.is_ascii_uppercase(), cb.is_ascii_uppercase()) {
                    (true, false) => return Ordering::Less,
                    (false, true) => return Ordering::Greater,
                    _ => {}
                }
            }
        }
    }
}
