//! Declarative, bidirectional object <-> XML mapping.
//!
//! Types are declared at runtime with a [`TypeBuilder`]: an ordered list of
//! named fields, each with a [`NodeKind`] (attribute, text, CDATA, comment,
//! nested item, choice, list, processing instruction). Building registers the
//! type in a named [`Registry`] so other types can refer to it by name.
//!
//! An [`Instance`] of a type validates every assignment against the field's
//! rules, serializes to canonical or pretty XML, and loads back from XML or a
//! plain `serde_json` dictionary.
//!
//! ```no_run
//! use xmlobject::{FieldDescriptor, Instance, TypeBuilder, XmlOptions};
//!
//! let book = TypeBuilder::new("Book")
//!     .field("isbn", FieldDescriptor::string_attribute())
//!     .field("title", FieldDescriptor::text())
//!     .build()?;
//! let dune = Instance::with_fields(&book, [("isbn", "123".into()), ("title", "Dune".into())])?;
//! assert_eq!(dune.canonical_xml()?, r#"<Book isbn="123"><title>Dune</title></Book>"#);
//! # Ok::<(), xmlobject::Error>(())
//! ```

pub mod dict;
pub mod error;
pub mod generator;
pub mod model;
pub mod node;
pub mod parser;
pub mod registry;
pub mod schema;

pub use dict::{from_dict, to_dict};
pub use error::{Error, Result};
pub use generator::XmlOptions;
pub use generator::pretty::{PrettyPrinter, pretty_print};
pub use generator::xml::{DEFAULT_ENTITIES, escape_text};
pub use model::{Entry, Instance, MixedList, Slot, TypedList, Value};
pub use node::{Alternative, AttributeKind, FieldDescriptor, NodeKind, PCDATA, entries};
pub use parser::{from_xml, from_xml_file};
pub use registry::{DEFAULT_REGISTRY, Registry, registry};
pub use schema::{InitHook, TypeBuilder, TypeDescriptor};
