//! Generate XML text from an [`Instance`].
//!
//! Output is built compact first; indentation is a separate pass through
//! [`pretty`](super::pretty). Child instances are always embedded in
//! canonical form.

use super::XmlOptions;
use super::pretty::PrettyPrinter;
use crate::error::{Error, Result};
use crate::model::{Entry, Instance, Value};
use crate::node::{AttributeKind, FieldDescriptor, NodeKind};
use crate::registry;

/// Reserved characters and their replacements, always applied.
pub const DEFAULT_ENTITIES: [(&str, &str); 5] = [
    ("&", "&amp;"),
    ("<", "&lt;"),
    (">", "&gt;"),
    ("\"", "&quot;"),
    ("'", "&apos;"),
];

/// Escape `value` for markup. User entities are matched first; their
/// replacements are emitted as is. Everything else goes through
/// [`DEFAULT_ENTITIES`].
pub fn escape_text(value: &str, entities: &[(String, String)]) -> String {
    substitute(value, entities, true)
}

/// Single left-to-right pass; reserved characters are escaped only when asked.
fn substitute(value: &str, entities: &[(String, String)], escape_reserved: bool) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    'scan: while let Some(ch) = rest.chars().next() {
        for (literal, replacement) in entities {
            if !literal.is_empty() && rest.starts_with(literal.as_str()) {
                out.push_str(replacement);
                rest = &rest[literal.len()..];
                continue 'scan;
            }
        }
        match ch {
            '&' if escape_reserved => out.push_str("&amp;"),
            '<' if escape_reserved => out.push_str("&lt;"),
            '>' if escape_reserved => out.push_str("&gt;"),
            '"' if escape_reserved => out.push_str("&quot;"),
            '\'' if escape_reserved => out.push_str("&apos;"),
            _ => out.push(ch),
        }
        rest = &rest[ch.len_utf8()..];
    }
    out
}

/// Comment body: user entities only, since comments are never entity-decoded.
fn comment_body(field: &FieldDescriptor, value: &str, entities: &[(String, String)]) -> Result<String> {
    let body = substitute(value, entities, false);
    if body.contains("--") {
        return Err(Error::TypeMismatch {
            field: field.name().to_string(),
            value: format!("{:?} (\"--\" is not allowed in a comment)", value),
        });
    }
    Ok(body)
}

/// Serialize `instance` according to `opts`.
pub fn to_xml(instance: &Instance, opts: &XmlOptions) -> Result<String> {
    let ty = instance.descriptor();
    tracing::debug!(type_name = %ty.name(), headers = opts.headers, pretty = opts.pretty, "serializing");
    let body = compact(instance)?;
    let mut out = String::new();
    if opts.headers {
        out.push_str(&format!(
            "<?xml version=\"1.0\" encoding=\"{}\"?>",
            ty.encoding()
        ));
        for field in ty.header_fields() {
            if let (NodeKind::ProcessingInstruction { target }, Some(Value::Pairs(pairs))) =
                (field.kind(), instance.get(field.name()))
            {
                out.push_str(&processing_instruction(target, pairs));
            }
        }
    }
    out.push_str(&body);
    if opts.pretty && ty.pretty_print() && ty.strip_strings() {
        out = PrettyPrinter::new(" ".repeat(opts.indent)).pretty_print(&out)?;
    }
    Ok(out)
}

fn processing_instruction(target: &str, pairs: &[(String, String)]) -> String {
    let mut out = format!("<?{}", target);
    for (key, value) in pairs {
        out.push_str(&format!(" {}=\"{}\"", key, escape_text(value, &[])));
    }
    out.push_str("?>");
    out
}

/// Canonical body of `instance`: no headers, no whitespace added.
pub(crate) fn compact(instance: &Instance) -> Result<String> {
    let ty = instance.descriptor();
    let mut children = String::new();
    let mut main: Option<(&str, String)> = None;

    for field in ty.element_fields() {
        let value = field_value(instance, field);
        require(field, value)?;
        let markup = serialize_field(instance, field, value)?;
        if field.is_main() {
            main = Some((field.name(), markup.clone()));
        }
        children.push_str(&markup);
    }

    let mut attrs = String::new();
    for field in ty.attribute_fields() {
        let value = field_value(instance, field);
        require(field, value)?;
        let markup = serialize_field(instance, field, value)?;
        if !markup.is_empty() {
            attrs.push(' ');
            attrs.push_str(&markup);
        }
    }

    if let Some((name, markup)) = main {
        if !markup.is_empty() {
            children = strip_wrapper(&markup, name).to_string();
        }
    }

    let tag = ty.element_name();
    if children.is_empty() {
        Ok(format!("<{}{}/>", tag, attrs))
    } else {
        Ok(format!("<{}{}>{}</{}>", tag, attrs, children, tag))
    }
}

fn field_value<'a>(instance: &'a Instance, field: &FieldDescriptor) -> &'a Value {
    instance.get(field.name()).unwrap_or(&Value::Null)
}

fn require(field: &FieldDescriptor, value: &Value) -> Result<()> {
    if !field.is_optional() && value.is_absent() {
        return Err(Error::RequiredNodeMissing {
            field: field.name().to_string(),
            markup: None,
        });
    }
    Ok(())
}

fn serialize_field(instance: &Instance, field: &FieldDescriptor, value: &Value) -> Result<String> {
    let entities = instance.descriptor().entities();
    let name = field.name();
    match field.kind() {
        NodeKind::Attribute { kind, .. } => {
            if value.is_null() || (field.is_optional() && value == field.default()) {
                return Ok(String::new());
            }
            let text = match value {
                Value::Text(s) => s.clone(),
                Value::Integer(i) => i.to_string(),
                other => return Err(mismatch(field, other)),
            };
            let escaped = if *kind == AttributeKind::String {
                escape_text(&text, entities)
            } else {
                escape_text(&text, &[])
            };
            Ok(format!("{}=\"{}\"", name, escaped))
        }
        NodeKind::Text => match value {
            Value::Null => Ok(String::new()),
            Value::Text(s) if field.is_main() => Ok(escape_text(s, entities)),
            Value::Text(s) => Ok(format!("<{}>{}</{}>", name, escape_text(s, entities), name)),
            other => Err(mismatch(field, other)),
        },
        NodeKind::Raw => match value {
            Value::Null => Ok(String::new()),
            Value::Text(s) if s.is_empty() => Ok(String::new()),
            Value::Text(s) => Ok(format!("<![CDATA[{}]]>", s.replace("]]>", "]]]]><![CDATA[>"))),
            other => Err(mismatch(field, other)),
        },
        NodeKind::Comment => match value {
            Value::Null => Ok(String::new()),
            Value::Text(s) if s.is_empty() => Ok(String::new()),
            Value::Text(s) if field.is_main() => Ok(escape_text(s, entities)),
            Value::Text(s) => Ok(format!("<!-- {} -->", comment_body(field, s, entities)?)),
            other => Err(mismatch(field, other)),
        },
        NodeKind::Item { .. } => match value {
            Value::Null => Ok(String::new()),
            Value::Object(child) => compact(child),
            other => Err(mismatch(field, other)),
        },
        NodeKind::Choice { .. } => match value {
            Value::Null => Ok(String::new()),
            Value::Text(s) => Ok(escape_text(s, entities)),
            Value::Object(child) => {
                let markup = compact(child)?;
                // A nested instance of the enclosing type contributes only its content.
                if child.type_name() == instance.type_name() {
                    Ok(strip_outer_element(&markup, child.element_name()))
                } else {
                    Ok(markup)
                }
            }
            Value::Mixed(_) | Value::List(_) | Value::Entries(_) => {
                let mut out = String::new();
                for entry in value.items() {
                    match entry {
                        Entry::Text(s) => out.push_str(&escape_text(s, entities)),
                        Entry::Object(child) => out.push_str(&compact(child)?),
                    }
                }
                Ok(out)
            }
            other => Err(mismatch(field, other)),
        },
        NodeKind::List { item_type } => {
            let items = value.items();
            if items.is_empty() {
                return Ok(String::new());
            }
            let item_ty = registry::resolve(field.registry(), item_type)?;
            let wrapper = item_ty.element_name();
            let mut out = String::new();
            for entry in items {
                match entry {
                    Entry::Object(child) if child.is_a(item_type) => {
                        out.push_str(&compact(child)?)
                    }
                    Entry::Object(child) => {
                        out.push_str(&format!("<{}>{}</{}>", wrapper, compact(child)?, wrapper))
                    }
                    Entry::Text(s) => out.push_str(&format!(
                        "<{}>{}</{}>",
                        wrapper,
                        escape_text(s, entities),
                        wrapper
                    )),
                }
            }
            Ok(out)
        }
        NodeKind::ProcessingInstruction { .. } => Ok(String::new()),
    }
}

fn mismatch(field: &FieldDescriptor, value: &Value) -> Error {
    Error::TypeMismatch {
        field: field.name().to_string(),
        value: value.repr(),
    }
}

/// `<name>inner</name>` -> `inner`; anything else is returned unchanged.
fn strip_wrapper<'a>(markup: &'a str, name: &str) -> &'a str {
    let open = format!("<{}>", name);
    let close = format!("</{}>", name);
    if markup.len() >= open.len() + close.len() && markup.starts_with(&open) && markup.ends_with(&close) {
        &markup[open.len()..markup.len() - close.len()]
    } else {
        markup
    }
}

/// Content of a single element, dropping its tags and attributes.
fn strip_outer_element(markup: &str, tag: &str) -> String {
    let Some(open_end) = open_tag_end(markup) else {
        return markup.to_string();
    };
    if markup[..open_end].ends_with('/') {
        return String::new();
    }
    let close = format!("</{}>", tag);
    match markup.strip_suffix(close.as_str()) {
        Some(without_close) if without_close.len() > open_end => {
            without_close[open_end + 1..].to_string()
        }
        _ => markup.to_string(),
    }
}

/// Byte index of the `>` ending the first tag, skipping quoted values.
fn open_tag_end(markup: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in markup.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '>') => return Some(i),
            _ => {}
        }
    }
    None
}
