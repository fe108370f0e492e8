//! XML -> instance deserialization.
//!
//! - [`dom`] – Document tree over `quick-xml` events.
//!
//! Every field value found in the document goes through the instance's
//! validated setter, so loading and constructing by hand accept exactly the
//! same values.

pub mod dom;

use crate::error::{Error, Result};
use crate::model::{Entry, Instance, Value};
use crate::node::{Alternative, AttributeKind, FieldDescriptor, NodeKind};
use crate::registry;
use crate::schema::TypeDescriptor;
use camino::Utf8Path;
use dom::{Document, Node, NodeType};
use std::sync::Arc;

/// Parse `text` and load its root element as an instance of `ty`. The root
/// tag is not checked against the type's element name.
pub fn from_xml(ty: &Arc<TypeDescriptor>, text: &str) -> Result<Instance> {
    tracing::debug!(type_name = %ty.name(), len = text.len(), "deserializing");
    let doc = Document::parse(text)?;
    from_element(ty, doc.root_element())
}

/// Read the file at `path` and load it with [`from_xml`].
pub fn from_xml_file(ty: &Arc<TypeDescriptor>, path: &Utf8Path) -> Result<Instance> {
    let text = std::fs::read_to_string(path.as_std_path())
        .map_err(|e| Error::ParseFailure(format!("reading {}: {}", path, e)))?;
    tracing::debug!(path = %path, type_name = %ty.name(), "loading instance from file");
    from_xml(ty, &text)
}

/// Load `element` as an instance of `ty`.
pub fn from_element(ty: &Arc<TypeDescriptor>, element: Node<'_>) -> Result<Instance> {
    let mut instance = Instance::new(ty)?;
    for field in ty.fields() {
        if field.is_header() {
            continue;
        }
        let value = deserialize_field(ty, field, element)?;
        if value.is_absent() && !field.is_optional() {
            return Err(Error::RequiredNodeMissing {
                field: field.name().to_string(),
                markup: Some(element.to_markup()),
            });
        }
        instance.set(field.name(), value)?;
    }
    Ok(instance)
}

fn deserialize_field(ty: &TypeDescriptor, field: &FieldDescriptor, element: Node<'_>) -> Result<Value> {
    let strip = |s: String| {
        if ty.strip_strings() {
            s.trim().to_string()
        } else {
            s
        }
    };
    match field.kind() {
        NodeKind::Attribute { kind, .. } => {
            let Some(raw) = element.attribute(field.name()) else {
                return Ok(if field.is_optional() {
                    field.default().clone()
                } else {
                    Value::Null
                });
            };
            let raw = strip(raw.to_string());
            if *kind == AttributeKind::Integer {
                raw.trim()
                    .parse::<i64>()
                    .map(Value::Integer)
                    .map_err(|_| Error::TypeMismatch {
                        field: field.name().to_string(),
                        value: format!("{:?}", raw),
                    })
            } else {
                Ok(Value::Text(raw))
            }
        }
        NodeKind::Text => {
            let mut holders: Vec<Node<'_>> = element
                .element_children()
                .filter(|c| c.tag_name() == field.name())
                .collect();
            if holders.is_empty() {
                if !field.is_main() {
                    return Ok(Value::Null);
                }
                holders.push(element);
            }
            let text: String = holders
                .iter()
                .flat_map(|h| h.children())
                .filter(|c| c.node_type() == NodeType::Text)
                .map(|c| c.value())
                .collect();
            Ok(Value::Text(strip(text)))
        }
        NodeKind::Raw => Ok(collect_leaves(element, NodeType::CData, ty.strip_strings())),
        NodeKind::Comment => Ok(collect_leaves(element, NodeType::Comment, ty.strip_strings())),
        NodeKind::Item { item_type } => {
            let item_ty = registry::resolve(field.registry(), item_type)?;
            match nested_elements(ty, element, item_ty.element_name()).next() {
                Some(child) => Ok(Value::from(from_element(&item_ty, child)?)),
                None => Ok(Value::Null),
            }
        }
        NodeKind::List { item_type } => {
            let item_ty = registry::resolve(field.registry(), item_type)?;
            let mut children: Vec<Node<'_>> =
                nested_elements(ty, element, item_ty.element_name()).collect();
            if children.is_empty() && item_ty.element_name() != item_ty.name() {
                children = nested_elements(ty, element, item_ty.name()).collect();
            }
            let entries = children
                .into_iter()
                .map(|child| from_element(&item_ty, child).map(Entry::Object))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::Entries(entries))
        }
        NodeKind::Choice { alternatives } => {
            let mut found = Vec::new();
            for child in element.children() {
                if let Some(entry) = match_alternative(field, alternatives, child, ty.strip_strings())? {
                    if !field.is_repeatable() {
                        return Ok(match entry {
                            Entry::Text(s) => Value::Text(s),
                            Entry::Object(obj) => Value::from(obj),
                        });
                    }
                    found.push(entry);
                }
            }
            if field.is_repeatable() {
                Ok(Value::Entries(found))
            } else {
                Ok(Value::Null)
            }
        }
        NodeKind::ProcessingInstruction { .. } => Ok(field.default().clone()),
    }
}

/// Direct children tagged `tag` whose parent is an element of `owner`.
fn nested_elements<'a>(
    owner: &'a TypeDescriptor,
    element: Node<'a>,
    tag: &'a str,
) -> impl Iterator<Item = Node<'a>> + 'a {
    element.element_children().filter(move |child| {
        child.tag_name() == tag
            && child
                .parent_element()
                .is_some_and(|p| p.tag_name() == owner.element_name())
    })
}

/// Concatenated content of all direct children of one kind; empty is Null.
/// Comments lose the single space of padding written on each side.
fn collect_leaves(element: Node<'_>, node_type: NodeType, strip: bool) -> Value {
    let content: String = element
        .children()
        .filter(|c| c.node_type() == node_type)
        .map(|c| match node_type {
            NodeType::Comment => unpad_comment(c.value()),
            _ => c.value(),
        })
        .collect();
    let content = if strip { content.trim() } else { content.as_str() };
    if content.is_empty() {
        Value::Null
    } else {
        Value::Text(content.to_string())
    }
}

fn unpad_comment(body: &str) -> &str {
    let body = body.strip_prefix(' ').unwrap_or(body);
    body.strip_suffix(' ').unwrap_or(body)
}

/// First alternative accepting `child`, if any.
fn match_alternative(
    field: &FieldDescriptor,
    alternatives: &[Alternative],
    child: Node<'_>,
    strip: bool,
) -> Result<Option<Entry>> {
    for alternative in alternatives {
        match (alternative, child.node_type()) {
            (Alternative::Text, NodeType::Text) => {
                let text = child.value();
                let text = if strip { text.trim() } else { text };
                if !text.trim().is_empty() {
                    return Ok(Some(Entry::Text(text.to_string())));
                }
            }
            (Alternative::Type(name), NodeType::Element) => {
                let alt_ty = registry::resolve(field.registry(), name)?;
                if child.tag_name() == alt_ty.element_name() {
                    return Ok(Some(Entry::Object(from_element(&alt_ty, child)?)));
                }
            }
            _ => {}
        }
    }
    Ok(None)
}
