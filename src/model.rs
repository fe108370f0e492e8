//! Runtime values: instances of mapped types and the values their fields hold.

use crate::dict;
use crate::error::{Error, Result};
use crate::generator::{self, XmlOptions};
use crate::node::{FieldDescriptor, NodeKind};
use crate::parser;
use crate::schema::TypeDescriptor;
use camino::Utf8Path;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// The value stored in one field of an [`Instance`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Text(String),
    Integer(i64),
    Object(Box<Instance>),
    /// Items of a List field.
    List(TypedList),
    /// Items of a repeated Choice field.
    Mixed(MixedList),
    /// Key/value data of a processing instruction.
    Pairs(Vec<(String, String)>),
    /// An unbound sequence, accepted by the setter of any list-valued field.
    Entries(Vec<Entry>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null, or a sequence with no items.
    pub fn is_absent(&self) -> bool {
        match self {
            Value::Null => true,
            Value::List(l) => l.is_empty(),
            Value::Mixed(l) => l.is_empty(),
            Value::Entries(e) => e.is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Instance> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut Instance> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Items of any sequence value, empty for scalars.
    pub fn items(&self) -> &[Entry] {
        match self {
            Value::List(l) => &l.items,
            Value::Mixed(l) => &l.items,
            Value::Entries(e) => e,
            _ => &[],
        }
    }

    /// Short description used in error messages.
    pub(crate) fn repr(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Text(s) => format!("{:?}", s),
            Value::Integer(i) => i.to_string(),
            Value::Object(obj) => format!("<{} instance>", obj.type_name()),
            Value::List(l) => format!("list of {}", l.len()),
            Value::Mixed(l) => format!("list of {}", l.len()),
            Value::Pairs(p) => format!("{} pairs", p.len()),
            Value::Entries(e) => format!("list of {}", e.len()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i.into())
    }
}

impl From<Instance> for Value {
    fn from(obj: Instance) -> Self {
        Value::Object(Box::new(obj))
    }
}

impl From<Vec<Entry>> for Value {
    fn from(entries: Vec<Entry>) -> Self {
        Value::Entries(entries)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One item of a List or repeated Choice.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Text(String),
    Object(Instance),
}

impl Entry {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Entry::Text(s) => Some(s),
            Entry::Object(_) => None,
        }
    }

    pub fn as_object(&self) -> Option<&Instance> {
        match self {
            Entry::Object(obj) => Some(obj),
            Entry::Text(_) => None,
        }
    }

    pub(crate) fn repr(&self) -> String {
        match self {
            Entry::Text(s) => format!("{:?}", s),
            Entry::Object(obj) => format!("<{} instance>", obj.type_name()),
        }
    }
}

impl From<&str> for Entry {
    fn from(s: &str) -> Self {
        Entry::Text(s.to_string())
    }
}

impl From<String> for Entry {
    fn from(s: String) -> Self {
        Entry::Text(s)
    }
}

impl From<Instance> for Entry {
    fn from(obj: Instance) -> Self {
        Entry::Object(obj)
    }
}

/// Ordered items of a List field; every mutation is checked against the field.
#[derive(Debug, Clone)]
pub struct TypedList {
    field: Arc<FieldDescriptor>,
    items: Vec<Entry>,
}

/// Ordered items of a repeated Choice field; every mutation is checked
/// against the alternative set.
#[derive(Debug, Clone)]
pub struct MixedList {
    field: Arc<FieldDescriptor>,
    items: Vec<Entry>,
}

impl TypedList {
    pub(crate) fn new(field: Arc<FieldDescriptor>) -> Self {
        Self {
            field,
            items: Vec::new(),
        }
    }

    fn admit(&self, entry: Entry, extra: usize) -> Result<Entry> {
        if !self.field.is_repeatable() && self.items.len() + extra >= 1 {
            return Err(Error::TypeMismatch {
                field: self.field.name().to_string(),
                value: format!("{} items", self.items.len() + extra + 1),
            });
        }
        self.field.check_list_item(entry)
    }

    pub fn push(&mut self, entry: impl Into<Entry>) -> Result<()> {
        let entry = self.admit(entry.into(), 0)?;
        self.items.push(entry);
        Ok(())
    }

    pub fn insert(&mut self, index: usize, entry: impl Into<Entry>) -> Result<()> {
        let entry = self.admit(entry.into(), 0)?;
        let index = index.min(self.items.len());
        self.items.insert(index, entry);
        Ok(())
    }

    /// All or nothing: on error the list is unchanged.
    pub fn extend<I, E>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = E>,
        E: Into<Entry>,
    {
        let mut checked = Vec::new();
        for entry in entries {
            checked.push(self.admit(entry.into(), checked.len())?);
        }
        self.items.extend(checked);
        Ok(())
    }

    pub fn field(&self) -> &FieldDescriptor {
        &self.field
    }

    pub(crate) fn into_entries(self) -> Vec<Entry> {
        self.items
    }
}

impl MixedList {
    pub(crate) fn new(field: Arc<FieldDescriptor>) -> Self {
        Self {
            field,
            items: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: impl Into<Entry>) -> Result<()> {
        let entry = self.field.check_choice_item(entry.into())?;
        self.items.push(entry);
        Ok(())
    }

    pub fn insert(&mut self, index: usize, entry: impl Into<Entry>) -> Result<()> {
        let entry = self.field.check_choice_item(entry.into())?;
        let index = index.min(self.items.len());
        self.items.insert(index, entry);
        Ok(())
    }

    /// All or nothing: on error the list is unchanged.
    pub fn extend<I, E>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = E>,
        E: Into<Entry>,
    {
        let checked = entries
            .into_iter()
            .map(|e| self.field.check_choice_item(e.into()))
            .collect::<Result<Vec<_>>>()?;
        self.items.extend(checked);
        Ok(())
    }

    pub fn field(&self) -> &FieldDescriptor {
        &self.field
    }

    pub(crate) fn into_entries(self) -> Vec<Entry> {
        self.items
    }
}

// Read access and removal need no validation; shared by both list kinds.
macro_rules! list_access {
    ($ty:ty) => {
        impl $ty {
            pub fn len(&self) -> usize {
                self.items.len()
            }

            pub fn is_empty(&self) -> bool {
                self.items.is_empty()
            }

            pub fn get(&self, index: usize) -> Option<&Entry> {
                self.items.get(index)
            }

            pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
                self.items.iter()
            }

            pub fn remove(&mut self, index: usize) -> Option<Entry> {
                (index < self.items.len()).then(|| self.items.remove(index))
            }

            pub fn clear(&mut self) {
                self.items.clear();
            }
        }

        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                self.items == other.items
            }
        }

        impl<'a> IntoIterator for &'a $ty {
            type Item = &'a Entry;
            type IntoIter = std::slice::Iter<'a, Entry>;

            fn into_iter(self) -> Self::IntoIter {
                self.items.iter()
            }
        }
    };
}

list_access!(TypedList);
list_access!(MixedList);

/// Where an instance currently sits: the owning type and field name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub owner: String,
    pub field: String,
}

/// A live object of a mapped type.
#[derive(Clone)]
pub struct Instance {
    descriptor: Arc<TypeDescriptor>,
    values: IndexMap<String, Value>,
    parent: Option<Slot>,
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.descriptor.name())
            .field("values", &self.values)
            .field("parent", &self.parent)
            .finish()
    }
}

impl Instance {
    /// Instance with every field at its default.
    pub fn new(ty: &Arc<TypeDescriptor>) -> Result<Self> {
        Self::construct(ty, None, Vec::<(&str, Value)>::new())
    }

    /// Instance whose only non-header field is set to `value`.
    pub fn with_value(ty: &Arc<TypeDescriptor>, value: impl Into<Value>) -> Result<Self> {
        Self::construct(ty, Some(value.into()), Vec::<(&str, Value)>::new())
    }

    /// Instance with the named fields set through their setters.
    pub fn with_fields<I, K>(ty: &Arc<TypeDescriptor>, fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        Self::construct(ty, None, fields)
    }

    /// Seed defaults, bind the positional value, apply the overrides, then
    /// run the init hook.
    pub fn construct<I, K>(
        ty: &Arc<TypeDescriptor>,
        positional: Option<Value>,
        overrides: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let values = ty
            .fields()
            .iter()
            .map(|f| (f.name().to_string(), f.initial_value()))
            .collect();
        let mut instance = Instance {
            descriptor: ty.clone(),
            values,
            parent: None,
        };

        if let Some(value) = positional {
            let mut body = ty.fields().iter().filter(|f| !f.is_header());
            match (body.next(), body.next()) {
                (Some(only), None) => {
                    let name = only.name().to_string();
                    instance.set(&name, value)?;
                }
                _ => tracing::warn!(
                    type_name = %ty.name(),
                    "positional value ignored: type does not have exactly one field"
                ),
            }
        }

        for (name, value) in overrides {
            instance.set(name.as_ref(), value)?;
        }

        if let Some(hook) = ty.init_hook() {
            hook(&mut instance)?;
        }
        Ok(instance)
    }

    /// Load `text` as an instance of `ty`.
    pub fn from_xml(ty: &Arc<TypeDescriptor>, text: &str) -> Result<Self> {
        parser::from_xml(ty, text)
    }

    /// Load the XML file at `path` as an instance of `ty`.
    pub fn from_xml_file(ty: &Arc<TypeDescriptor>, path: &Utf8Path) -> Result<Self> {
        parser::from_xml_file(ty, path)
    }

    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    pub fn type_name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn element_name(&self) -> &str {
        self.descriptor.element_name()
    }

    /// True when this instance's type is `type_name` or derives from it.
    pub fn is_a(&self, type_name: &str) -> bool {
        self.descriptor.is_a(type_name)
    }

    pub fn parent_slot(&self) -> Option<&Slot> {
        self.parent.as_ref()
    }

    pub(crate) fn set_parent(&mut self, slot: Slot) {
        self.parent = Some(slot);
    }

    fn field_descriptor(&self, name: &str) -> Result<Arc<FieldDescriptor>> {
        self.descriptor.field(name).cloned().ok_or_else(|| {
            Error::NamingError(format!(
                "'{}' has no field named '{}'",
                self.descriptor.name(),
                name
            ))
        })
    }

    /// Current value of a field, `None` if the type has no such field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn get_text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_text)
    }

    pub fn get_integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_integer)
    }

    pub fn get_object(&self, name: &str) -> Option<&Instance> {
        self.get(name).and_then(Value::as_object)
    }

    /// Mutable access to a nested instance. Changes made through it skip the
    /// parent's setter.
    pub fn get_object_mut(&mut self, name: &str) -> Option<&mut Instance> {
        self.values.get_mut(name).and_then(Value::as_object_mut)
    }

    /// Items of a List or repeated Choice field (empty for other kinds).
    pub fn items(&self, name: &str) -> &[Entry] {
        self.get(name).map(Value::items).unwrap_or(&[])
    }

    /// Validated assignment. On error the instance is left unchanged.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let field = self.field_descriptor(name)?;
        let value = field.validate(value.into())?;
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    pub fn list_mut(&mut self, name: &str) -> Result<&mut TypedList> {
        let field = self.field_descriptor(name)?;
        match self.values.get_mut(name) {
            Some(Value::List(list)) => Ok(list),
            _ => Err(Error::TypeMismatch {
                field: field.name().to_string(),
                value: format!("{} is not a list", field.kind().label()),
            }),
        }
    }

    pub fn mixed_mut(&mut self, name: &str) -> Result<&mut MixedList> {
        let field = self.field_descriptor(name)?;
        match self.values.get_mut(name) {
            Some(Value::Mixed(list)) => Ok(list),
            _ => Err(Error::TypeMismatch {
                field: field.name().to_string(),
                value: format!("{} is not a repeated choice", field.kind().label()),
            }),
        }
    }

    /// Push onto the main field, which must be a List or repeated Choice.
    pub fn append(&mut self, entry: impl Into<Entry>) -> Result<()> {
        let main = self.descriptor.main_field().cloned().ok_or_else(|| {
            Error::InvalidSchema(format!("'{}' has no main field", self.type_name()))
        })?;
        match main.kind() {
            NodeKind::List { .. } => self.list_mut(main.name())?.push(entry),
            NodeKind::Choice { .. } if main.is_repeatable() => {
                self.mixed_mut(main.name())?.push(entry)
            }
            other => Err(Error::TypeMismatch {
                field: main.name().to_string(),
                value: format!("cannot append to a {}", other.label()),
            }),
        }
    }

    /// Depth-first walk over scalar fields, descending into Item, List and
    /// repeated Choice contents. Header fields are skipped.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(&FieldDescriptor, &Instance, usize),
    {
        self.walk(&mut visit, 0);
    }

    fn walk<F>(&self, visit: &mut F, depth: usize)
    where
        F: FnMut(&FieldDescriptor, &Instance, usize),
    {
        for field in self.descriptor.fields() {
            if field.is_header() {
                continue;
            }
            let value = self.values.get(field.name()).unwrap_or(&Value::Null);
            match (field.kind(), value) {
                (NodeKind::Item { .. }, Value::Object(child)) => child.walk(visit, depth + 1),
                (NodeKind::Item { .. }, _) => {}
                (NodeKind::List { .. }, _) => {
                    for child in value.items().iter().filter_map(Entry::as_object) {
                        child.walk(visit, depth + 1);
                    }
                }
                (NodeKind::Choice { .. }, _) if field.is_repeatable() => {
                    for child in value.items().iter().filter_map(Entry::as_object) {
                        child.walk(visit, depth + 1);
                    }
                }
                _ => visit(&**field, self, depth),
            }
        }
    }

    pub fn to_dict(&self) -> serde_json::Value {
        dict::to_dict(self)
    }

    pub fn from_dict(ty: &Arc<TypeDescriptor>, data: &serde_json::Value) -> Result<Self> {
        dict::from_dict(ty, data)
    }

    pub fn to_xml(&self, opts: &XmlOptions) -> Result<String> {
        generator::xml::to_xml(self, opts)
    }

    /// Compact form without headers, used for comparison and embedding.
    pub fn canonical_xml(&self) -> Result<String> {
        generator::xml::to_xml(self, &XmlOptions::canonical())
    }
}

/// Instances are equal when their canonical forms are. Two instances that
/// cannot be serialized are equal when they fail the same way, so equality
/// stays reflexive.
impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        match (self.canonical_xml(), other.canonical_xml()) {
            (Ok(a), Ok(b)) => a == b,
            (Err(a), Err(b)) => a == b && self.type_name() == other.type_name(),
            _ => false,
        }
    }
}

impl PartialOrd for Instance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.canonical_xml(), other.canonical_xml()) {
            (Ok(a), Ok(b)) => Some(a.cmp(&b)),
            _ => (self == other).then_some(Ordering::Equal),
        }
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opts = XmlOptions {
            headers: false,
            ..XmlOptions::default()
        };
        match self.to_xml(&opts) {
            Ok(xml) => f.write_str(&xml),
            Err(e) => write!(f, "<{} (unserializable: {})>", self.type_name(), e),
        }
    }
}
