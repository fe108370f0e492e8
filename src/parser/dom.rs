//! Minimal read-only document tree built from `quick-xml` events.
//!
//! Unlike a merged-text DOM, CDATA sections, comments and processing
//! instructions stay distinct child nodes, which the Raw, Comment and
//! literal-text field kinds rely on. Entity and character references are
//! resolved into the surrounding text.

use crate::error::{Error, Result};
use quick_xml::Reader;
use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::{BytesStart, Event};
use std::fmt::Write as _;

/// Kind of a document node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Element,
    Text,
    CData,
    Comment,
    ProcessingInstruction,
}

#[derive(Debug)]
struct NodeData {
    node_type: NodeType,
    /// Tag name, or processing-instruction target.
    name: String,
    /// Character content for non-element nodes.
    value: String,
    attributes: Vec<(String, String)>,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// A parsed document: an arena of nodes and the root element.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: usize,
}

impl Document {
    pub fn parse(text: &str) -> Result<Self> {
        let mut reader = Reader::from_str(text);
        let mut nodes: Vec<NodeData> = Vec::new();
        let mut stack: Vec<usize> = Vec::new();
        let mut root: Option<usize> = None;

        loop {
            let event = reader.read_event().map_err(|e| {
                Error::ParseFailure(format!("at position {}: {}", reader.error_position(), e))
            })?;
            let parent = stack.last().copied();
            match event {
                Event::Start(e) => {
                    let id = push_element(&mut nodes, &mut root, &e, parent)?;
                    stack.push(id);
                }
                Event::Empty(e) => {
                    push_element(&mut nodes, &mut root, &e, parent)?;
                }
                Event::End(_) => {
                    stack.pop();
                }
                Event::Text(t) => {
                    let raw = String::from_utf8_lossy(&t);
                    let text = unescape(&raw).map_err(|e| Error::ParseFailure(e.to_string()))?;
                    push_text(&mut nodes, parent, &text);
                }
                Event::GeneralRef(r) => {
                    let name = String::from_utf8_lossy(&r);
                    let text = resolve_reference(&name).ok_or_else(|| {
                        Error::ParseFailure(format!("unknown entity '&{};'", name))
                    })?;
                    push_text(&mut nodes, parent, &text);
                }
                Event::CData(c) => {
                    let value = String::from_utf8_lossy(&c).into_owned();
                    push_leaf(&mut nodes, parent, NodeType::CData, String::new(), value);
                }
                Event::Comment(c) => {
                    let value = String::from_utf8_lossy(&c).into_owned();
                    push_leaf(&mut nodes, parent, NodeType::Comment, String::new(), value);
                }
                Event::PI(p) => {
                    let target = String::from_utf8_lossy(p.target()).into_owned();
                    let content = String::from_utf8_lossy(p.content()).trim().to_string();
                    push_leaf(
                        &mut nodes,
                        parent,
                        NodeType::ProcessingInstruction,
                        target,
                        content,
                    );
                }
                Event::Eof => break,
                // XML declaration and doctype carry nothing the mapping uses.
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(Error::ParseFailure(format!(
                "unclosed element <{}>",
                nodes[*open].name
            )));
        }
        let root = root.ok_or_else(|| Error::ParseFailure("no root element".to_string()))?;
        Ok(Document { nodes, root })
    }

    pub fn root_element(&self) -> Node<'_> {
        Node {
            doc: self,
            id: self.root,
        }
    }
}

fn push_element(
    nodes: &mut Vec<NodeData>,
    root: &mut Option<usize>,
    start: &BytesStart<'_>,
    parent: Option<usize>,
) -> Result<usize> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::ParseFailure(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let raw = String::from_utf8_lossy(&attr.value);
        let value = unescape(&raw)
            .map_err(|e| Error::ParseFailure(e.to_string()))?
            .into_owned();
        attributes.push((key, value));
    }
    if parent.is_none() {
        if root.is_some() {
            return Err(Error::ParseFailure(format!(
                "second root element <{}>",
                name
            )));
        }
        *root = Some(nodes.len());
    }
    Ok(push_node(
        nodes,
        NodeData {
            node_type: NodeType::Element,
            name,
            value: String::new(),
            attributes,
            parent,
            children: Vec::new(),
        },
    ))
}

/// Text outside the root element is dropped; adjacent text is merged.
fn push_text(nodes: &mut Vec<NodeData>, parent: Option<usize>, text: &str) {
    let Some(parent) = parent else {
        return;
    };
    if let Some(&last) = nodes[parent].children.last() {
        if nodes[last].node_type == NodeType::Text {
            nodes[last].value.push_str(text);
            return;
        }
    }
    push_leaf(nodes, Some(parent), NodeType::Text, String::new(), text.to_string());
}

/// Prolog and epilog comments and processing instructions are dropped.
fn push_leaf(
    nodes: &mut Vec<NodeData>,
    parent: Option<usize>,
    node_type: NodeType,
    name: String,
    value: String,
) {
    if parent.is_none() {
        return;
    }
    push_node(
        nodes,
        NodeData {
            node_type,
            name,
            value,
            attributes: Vec::new(),
            parent,
            children: Vec::new(),
        },
    );
}

fn push_node(nodes: &mut Vec<NodeData>, data: NodeData) -> usize {
    let id = nodes.len();
    if let Some(parent) = data.parent {
        nodes[parent].children.push(id);
    }
    nodes.push(data);
    id
}

fn resolve_reference(name: &str) -> Option<String> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    resolve_predefined_entity(name).map(str::to_string)
}

/// Borrowed handle to one node of a [`Document`].
#[derive(Clone, Copy)]
pub struct Node<'a> {
    doc: &'a Document,
    id: usize,
}

impl std::fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("type", &self.node_type())
            .field("name", &self.data().name)
            .finish()
    }
}

impl<'a> Node<'a> {
    fn data(&self) -> &'a NodeData {
        &self.doc.nodes[self.id]
    }

    pub fn node_type(&self) -> NodeType {
        self.data().node_type
    }

    pub fn is_element(&self) -> bool {
        self.node_type() == NodeType::Element
    }

    /// Element tag name (empty for character nodes).
    pub fn tag_name(&self) -> &'a str {
        match self.node_type() {
            NodeType::Element => &self.data().name,
            _ => "",
        }
    }

    /// Character content of text, CDATA, comment and PI nodes.
    pub fn value(&self) -> &'a str {
        &self.data().value
    }

    pub fn attribute(&self, name: &str) -> Option<&'a str> {
        self.data()
            .attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn attributes(self) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.data()
            .attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn children(self) -> impl Iterator<Item = Node<'a>> + 'a {
        let doc = self.doc;
        self.data().children.iter().map(move |&id| Node { doc, id })
    }

    pub fn element_children(self) -> impl Iterator<Item = Node<'a>> + 'a {
        self.children().filter(|n| n.is_element())
    }

    pub fn parent_element(&self) -> Option<Node<'a>> {
        self.data().parent.map(|id| Node { doc: self.doc, id })
    }

    /// Compact markup of this node and its subtree.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        self.write_markup(&mut out);
        out
    }

    fn write_markup(&self, out: &mut String) {
        let data = self.data();
        match data.node_type {
            NodeType::Element => {
                let _ = write!(out, "<{}", data.name);
                for (k, v) in &data.attributes {
                    let _ = write!(out, " {}=\"{}\"", k, quick_xml::escape::escape(v.as_str()));
                }
                if data.children.is_empty() {
                    out.push_str("/>");
                } else {
                    out.push('>');
                    for child in self.children() {
                        child.write_markup(out);
                    }
                    let _ = write!(out, "</{}>", data.name);
                }
            }
            NodeType::Text => out.push_str(&quick_xml::escape::escape(data.value.as_str())),
            NodeType::CData => {
                let _ = write!(out, "<![CDATA[{}]]>", data.value);
            }
            NodeType::Comment => {
                let _ = write!(out, "<!--{}-->", data.value);
            }
            NodeType::ProcessingInstruction => {
                let _ = write!(out, "<?{} {}?>", data.name, data.value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_cdata_and_comments_apart() {
        let doc = Document::parse("<a>x<![CDATA[<y>]]><!-- c --><?pi k=\"v\"?>z</a>")
            .expect("parse");
        let root = doc.root_element();
        let kinds: Vec<_> = root.children().map(|n| n.node_type()).collect();
        assert_eq!(
            kinds,
            [
                NodeType::Text,
                NodeType::CData,
                NodeType::Comment,
                NodeType::ProcessingInstruction,
                NodeType::Text
            ]
        );
        let values: Vec<_> = root.children().map(|n| n.value()).collect();
        assert_eq!(values[1], "<y>");
        assert_eq!(values[2], " c ");
    }

    #[test]
    fn test_references_merge_into_text() {
        let doc = Document::parse("<a t=\"1 &amp; 2\">x &lt; y &#65;&#x42;</a>").expect("parse");
        let root = doc.root_element();
        assert_eq!(root.attribute("t"), Some("1 & 2"));
        let texts: Vec<_> = root.children().collect();
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].value(), "x < y AB");
    }

    #[test]
    fn test_parent_and_markup() {
        let doc = Document::parse("<?xml version=\"1.0\"?>\n<a><b k=\"v\"/>t</a>").expect("parse");
        let root = doc.root_element();
        let b = root.element_children().next().expect("b");
        assert_eq!(b.tag_name(), "b");
        assert_eq!(b.parent_element().map(|p| p.tag_name()), Some("a"));
        assert_eq!(root.to_markup(), "<a><b k=\"v\"/>t</a>");
    }

    #[test]
    fn test_rejects_broken_input() {
        assert!(matches!(Document::parse("<a><b></a>"), Err(Error::ParseFailure(_))));
        assert!(matches!(Document::parse(""), Err(Error::ParseFailure(_))));
        assert!(matches!(Document::parse("<a>&nope;</a>"), Err(Error::ParseFailure(_))));
    }
}
