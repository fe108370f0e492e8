//! Field declarations: the closed set of node kinds and their validation rules.
//!
//! A [`FieldDescriptor`] describes how one named field of a type maps to XML.
//! Descriptors are created with the kind constructors ([`FieldDescriptor::text`],
//! [`FieldDescriptor::list`], ...), refined with the chained setters
//! ([`optional`](FieldDescriptor::optional), [`main`](FieldDescriptor::main), ...)
//! and handed to a [`TypeBuilder`](crate::schema::TypeBuilder), which assigns
//! the field name and the owning type.
//!
//! Serialization and deserialization of each kind live in
//! [`generator::xml`](crate::generator::xml) and [`parser`](crate::parser);
//! this module only owns `validate`.

use crate::error::{Error, Result};
use crate::model::{Entry, MixedList, Slot, TypedList, Value};
use crate::registry;
use crate::schema::TypeDescriptor;
use std::sync::Arc;

/// Marker accepted by [`Alternative::from`] for the literal-text alternative.
pub const PCDATA: &str = "#PCDATA";

/// Flavour of an attribute field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    /// Any text.
    CData,
    /// Text that is alphanumeric once `: _ - .` are removed.
    NmToken,
    /// Like [`AttributeKind::NmToken`] but whitespace separated.
    NmTokens,
    /// Text with the owner's entity table applied on output.
    String,
    /// A signed integer.
    Integer,
}

/// One alternative of a Choice field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alternative {
    /// Literal character data.
    Text,
    /// An instance of the named type.
    Type(String),
}

impl From<&str> for Alternative {
    fn from(s: &str) -> Self {
        if s == PCDATA {
            Alternative::Text
        } else {
            Alternative::Type(s.to_string())
        }
    }
}

impl From<String> for Alternative {
    fn from(s: String) -> Self {
        Alternative::from(s.as_str())
    }
}

/// The tagged set of field kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Attribute {
        kind: AttributeKind,
        permitted: Option<Vec<Value>>,
    },
    Text,
    Raw,
    Comment,
    Item {
        item_type: String,
    },
    Choice {
        alternatives: Vec<Alternative>,
    },
    List {
        item_type: String,
    },
    ProcessingInstruction {
        target: String,
    },
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Attribute { .. } => "Attribute",
            NodeKind::Text => "TextNode",
            NodeKind::Raw => "RawNode",
            NodeKind::Comment => "CommentNode",
            NodeKind::Item { .. } => "ItemNode",
            NodeKind::Choice { .. } => "ChoiceNode",
            NodeKind::List { .. } => "ListNode",
            NodeKind::ProcessingInstruction { .. } => "ProcessingInstructionNode",
        }
    }
}

/// Declaration of a single field of a type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub(crate) name: String,
    pub(crate) kind: NodeKind,
    pub(crate) optional: bool,
    pub(crate) repeatable: bool,
    pub(crate) default: Value,
    pub(crate) main: bool,
    pub(crate) owner: String,
    pub(crate) registry: String,
}

impl FieldDescriptor {
    fn with_kind(kind: NodeKind) -> Self {
        Self {
            name: String::new(),
            kind,
            optional: false,
            repeatable: false,
            default: Value::Null,
            main: false,
            owner: String::new(),
            registry: registry::DEFAULT_REGISTRY.to_string(),
        }
    }

    fn attribute(kind: AttributeKind) -> Self {
        Self::with_kind(NodeKind::Attribute {
            kind,
            permitted: None,
        })
    }

    pub fn cdata_attribute() -> Self {
        Self::attribute(AttributeKind::CData)
    }

    pub fn nmtoken_attribute() -> Self {
        Self::attribute(AttributeKind::NmToken)
    }

    pub fn nmtokens_attribute() -> Self {
        Self::attribute(AttributeKind::NmTokens)
    }

    pub fn string_attribute() -> Self {
        Self::attribute(AttributeKind::String)
    }

    pub fn integer_attribute() -> Self {
        Self::attribute(AttributeKind::Integer)
    }

    pub fn text() -> Self {
        Self::with_kind(NodeKind::Text)
    }

    pub fn raw() -> Self {
        Self::with_kind(NodeKind::Raw)
    }

    /// Comments are optional unless stated otherwise.
    pub fn comment() -> Self {
        Self::with_kind(NodeKind::Comment).optional(true)
    }

    /// Single nested reference to an instance of `item_type`.
    pub fn item(item_type: impl Into<String>) -> Self {
        Self::with_kind(NodeKind::Item {
            item_type: item_type.into(),
        })
    }

    /// Tagged union over `alternatives`; use [`PCDATA`] for literal text.
    pub fn choice<I, A>(alternatives: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Alternative>,
    {
        Self::with_kind(NodeKind::Choice {
            alternatives: alternatives.into_iter().map(Into::into).collect(),
        })
    }

    /// Homogeneous list of `item_type` instances. Optional and unbounded by default.
    pub fn list(item_type: impl Into<String>) -> Self {
        Self::with_kind(NodeKind::List {
            item_type: item_type.into(),
        })
        .optional(true)
        .repeatable(true)
    }

    /// Processing instruction `<?target key="value" ...?>`, emitted only with headers.
    pub fn processing_instruction<I, K, V>(target: impl Into<String>, data: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let pairs = data
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::with_kind(NodeKind::ProcessingInstruction {
            target: target.into(),
        })
        .optional(true)
        .default_value(Value::Pairs(pairs))
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Lists and Choices only; attributes never repeat.
    pub fn repeatable(mut self, repeatable: bool) -> Self {
        if !matches!(self.kind, NodeKind::Attribute { .. }) {
            self.repeatable = repeatable;
        }
        self
    }

    pub fn main(mut self) -> Self {
        self.main = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = value.into();
        self
    }

    /// Restrict an attribute to a fixed value set. Ignored for other kinds.
    pub fn permitted<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        if let NodeKind::Attribute { permitted, .. } = &mut self.kind {
            *permitted = Some(values.into_iter().map(Into::into).collect());
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_repeatable(&self) -> bool {
        self.repeatable
    }

    pub fn is_main(&self) -> bool {
        self.main
    }

    pub fn default(&self) -> &Value {
        &self.default
    }

    /// Name of the type this field belongs to.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    pub fn is_attribute(&self) -> bool {
        matches!(self.kind, NodeKind::Attribute { .. })
    }

    pub fn is_header(&self) -> bool {
        matches!(self.kind, NodeKind::ProcessingInstruction { .. })
    }

    /// True for the repeated kinds whose storage is a list.
    pub fn holds_sequence(&self) -> bool {
        match self.kind {
            NodeKind::List { .. } => true,
            NodeKind::Choice { .. } => self.repeatable,
            _ => false,
        }
    }

    /// Fresh per-instance value: lists are bound to this field.
    pub(crate) fn initial_value(self: &Arc<Self>) -> Value {
        match self.kind {
            NodeKind::List { .. } => Value::List(TypedList::new(self.clone())),
            NodeKind::Choice { .. } if self.repeatable => {
                Value::Mixed(MixedList::new(self.clone()))
            }
            _ => self.default.clone(),
        }
    }

    fn mismatch(&self, value: &Value) -> Error {
        Error::TypeMismatch {
            field: self.name.clone(),
            value: value.repr(),
        }
    }

    fn mismatch_entry(&self, entry: &Entry) -> Error {
        Error::TypeMismatch {
            field: self.name.clone(),
            value: entry.repr(),
        }
    }

    fn slot(&self) -> Slot {
        Slot {
            owner: self.owner.clone(),
            field: self.name.clone(),
        }
    }

    /// Check `value` for assignment to this field, returning the value to store.
    ///
    /// Sequences are re-bound to this field; nested instances get their
    /// parent slot updated.
    pub fn validate(self: &Arc<Self>, value: Value) -> Result<Value> {
        match &self.kind {
            NodeKind::Attribute { kind, permitted } => {
                self.validate_attribute(*kind, permitted.as_deref(), value)
            }
            NodeKind::Comment if !self.main => match value {
                Value::Text(ref s) if s.contains("--") => Err(self.mismatch(&value)),
                Value::Text(_) => Ok(value),
                Value::Null if self.optional => Ok(value),
                other => Err(self.mismatch(&other)),
            },
            NodeKind::Text | NodeKind::Raw | NodeKind::Comment => match value {
                Value::Text(_) => Ok(value),
                Value::Null if self.optional => Ok(value),
                other => Err(self.mismatch(&other)),
            },
            NodeKind::Item { item_type } => match value {
                Value::Null if self.optional => Ok(Value::Null),
                Value::Object(mut obj) if obj.is_a(item_type) => {
                    obj.set_parent(self.slot());
                    Ok(Value::Object(obj))
                }
                other => Err(self.mismatch(&other)),
            },
            NodeKind::Choice { alternatives } => self.validate_choice(alternatives, value),
            NodeKind::List { .. } => {
                let entries = match value {
                    Value::Null if self.optional => Vec::new(),
                    Value::List(list) => list.into_entries(),
                    Value::Mixed(list) => list.into_entries(),
                    Value::Entries(entries) => entries,
                    other => return Err(self.mismatch(&other)),
                };
                if entries.len() > 1 && !self.repeatable {
                    return Err(Error::TypeMismatch {
                        field: self.name.clone(),
                        value: format!("{} items", entries.len()),
                    });
                }
                let mut list = TypedList::new(self.clone());
                for entry in entries {
                    list.push(entry)?;
                }
                Ok(Value::List(list))
            }
            NodeKind::ProcessingInstruction { .. } => match value {
                Value::Pairs(_) => Ok(value),
                Value::Null if self.optional => Ok(value),
                other => Err(self.mismatch(&other)),
            },
        }
    }

    fn validate_attribute(
        &self,
        kind: AttributeKind,
        permitted: Option<&[Value]>,
        value: Value,
    ) -> Result<Value> {
        if value.is_null() {
            return if self.optional {
                Ok(value)
            } else {
                Err(self.mismatch(&value))
            };
        }
        // Optional attributes may always be reset to their default.
        if self.optional && value == self.default {
            return Ok(value);
        }
        let type_ok = match (kind, &value) {
            (AttributeKind::Integer, Value::Integer(_)) => true,
            (AttributeKind::Integer, _) => false,
            (AttributeKind::NmToken, Value::Text(s)) => is_name_token(s, false),
            (AttributeKind::NmTokens, Value::Text(s)) => is_name_token(s, true),
            (_, Value::Text(_)) => true,
            _ => false,
        };
        let permitted_ok = permitted.is_none_or(|set| set.contains(&value));
        if type_ok && permitted_ok {
            Ok(value)
        } else {
            Err(self.mismatch(&value))
        }
    }

    fn validate_choice(self: &Arc<Self>, alternatives: &[Alternative], value: Value) -> Result<Value> {
        // A Choice listing its own owner first is left-recursive.
        if alternatives.first() == Some(&Alternative::Type(self.owner.clone())) {
            return Err(Error::RecursionDetected {
                field: self.name.clone(),
                via: None,
            });
        }
        if self.repeatable {
            let entries = match value {
                Value::Null if self.optional => Vec::new(),
                Value::Mixed(list) => list.into_entries(),
                Value::List(list) => list.into_entries(),
                Value::Entries(entries) => entries,
                other => return Err(self.mismatch(&other)),
            };
            let mut list = MixedList::new(self.clone());
            for entry in entries {
                list.push(entry)?;
            }
            return Ok(Value::Mixed(list));
        }
        match value {
            Value::Null if self.optional => Ok(Value::Null),
            Value::Text(_) if alternatives.contains(&Alternative::Text) => Ok(value),
            Value::Object(mut obj) => {
                if !alternatives.contains(&Alternative::Type(obj.type_name().to_string())) {
                    return Err(self.mismatch(&Value::Object(obj)));
                }
                self.guard_recursion(obj.descriptor())?;
                obj.set_parent(self.slot());
                Ok(Value::Object(obj))
            }
            other => Err(self.mismatch(&other)),
        }
    }

    /// Single-hop recursion guard: inspects the declared fields of the
    /// assigned value's type, never deeper.
    fn guard_recursion(&self, value_type: &TypeDescriptor) -> Result<()> {
        let owner = Alternative::Type(self.owner.clone());
        for field in value_type.fields() {
            let points_back = match &field.kind {
                NodeKind::Item { item_type } | NodeKind::List { item_type } => {
                    *item_type == self.owner
                }
                NodeKind::Choice { alternatives } => {
                    alternatives.contains(&owner) || field.owner == self.owner
                }
                _ => false,
            };
            if points_back {
                return Err(Error::RecursionDetected {
                    field: self.name.clone(),
                    via: Some((field.name.clone(), value_type.name().to_string())),
                });
            }
        }
        Ok(())
    }

    /// Admission rule for one item of a repeated Choice.
    pub(crate) fn check_choice_item(&self, mut entry: Entry) -> Result<Entry> {
        let NodeKind::Choice { alternatives } = &self.kind else {
            return Err(self.mismatch_entry(&entry));
        };
        let accepted = match &entry {
            Entry::Text(_) => alternatives.contains(&Alternative::Text),
            Entry::Object(obj) => {
                alternatives.contains(&Alternative::Type(obj.type_name().to_string()))
            }
        };
        if !accepted {
            return Err(self.mismatch_entry(&entry));
        }
        if let Entry::Object(obj) = &mut entry {
            obj.set_parent(self.slot());
        }
        Ok(entry)
    }

    /// Admission rule for one item of a List: an instance of the item type
    /// (or a subtype), or anything the item type's own fields accept one hop down.
    pub(crate) fn check_list_item(&self, mut entry: Entry) -> Result<Entry> {
        let NodeKind::List { item_type } = &self.kind else {
            return Err(self.mismatch_entry(&entry));
        };
        let direct = matches!(&entry, Entry::Object(obj) if obj.is_a(item_type));
        if !direct {
            let item_ty = registry::resolve(&self.registry, item_type)?;
            if !fits_inside(&item_ty, &entry) {
                return Err(self.mismatch_entry(&entry));
            }
        }
        if let Entry::Object(obj) = &mut entry {
            obj.set_parent(self.slot());
        }
        Ok(entry)
    }
}

/// One-hop structural compatibility walk over the fields of `container`.
fn fits_inside(container: &TypeDescriptor, entry: &Entry) -> bool {
    container.fields().iter().any(|field| match (&field.kind, entry) {
        (NodeKind::Text, Entry::Text(_)) => field.main,
        (NodeKind::Choice { alternatives }, Entry::Text(_)) => {
            alternatives.contains(&Alternative::Text)
        }
        (NodeKind::Choice { alternatives }, Entry::Object(obj)) => {
            alternatives.contains(&Alternative::Type(obj.type_name().to_string()))
        }
        (NodeKind::Item { item_type }, Entry::Object(obj))
        | (NodeKind::List { item_type }, Entry::Object(obj)) => obj.is_a(item_type),
        _ => false,
    })
}

/// Name-token rule: once separators are removed, the rest must be
/// non-empty and alphanumeric.
pub fn is_name_token(value: &str, allow_whitespace: bool) -> bool {
    let mut rest = value.chars().filter(|c| {
        !matches!(*c, ':' | '_' | '-' | '.')
            && !(allow_whitespace && matches!(*c, ' ' | '\t' | '\r' | '\n'))
    });
    let Some(first) = rest.next() else {
        return false;
    };
    first.is_alphanumeric() && rest.all(char::is_alphanumeric)
}

/// XML name check used for element, attribute and field names.
pub fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}

/// Convenience for building sequence values from instances and text.
pub fn entries<I, E>(items: I) -> Value
where
    I: IntoIterator<Item = E>,
    E: Into<Entry>,
{
    Value::Entries(items.into_iter().map(Into::into).collect())
}
