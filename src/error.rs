//! Error types shared by schema definition, field access, serialization,
//! deserialization and the pretty-printer.

use thiserror::Error;

/// Main error type for every fallible operation of the crate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A field setter (or list push) rejected a value.
    #[error("Incorrect type in assignment of '{field}' ({value})")]
    TypeMismatch { field: String, value: String },

    /// A non-optional field had no value on serialize or no match on deserialize.
    #[error("'{field}' node is not optional{}", in_markup(.markup))]
    RequiredNodeMissing {
        field: String,
        markup: Option<String>,
    },

    /// A Choice assignment would make a type contain itself one hop down.
    #[error("Left recursivity detected in \"{field}\"{}", through(.via))]
    RecursionDetected {
        field: String,
        /// `(field, type)` of the nested field that points back at the owner.
        via: Option<(String, String)>,
    },

    /// Tag stack mismatch found while re-indenting markup.
    #[error("Expected {} before {}", closing(.expected), found_tag(.found))]
    MalformedMarkup {
        expected: Option<String>,
        found: Option<String>,
    },

    /// No token pattern matched the remaining markup.
    #[error("Don't know how to handle '{0}'")]
    UnrecognizedMarkup(String),

    /// The XML parser rejected the input, or no registered type matched.
    #[error("Parse error: {0}")]
    ParseFailure(String),

    /// Invalid element-name override or unknown field name.
    #[error("Naming error: {0}")]
    NamingError(String),

    /// A type declaration breaks a structural rule.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// Registry lookup of a type that is not (yet) registered.
    #[error("Type '{name}' not found in registry '{registry}'")]
    NotFound { registry: String, name: String },
}

/// Result type alias for crate operations
pub type Result<T> = std::result::Result<T, Error>;

fn in_markup(markup: &Option<String>) -> String {
    match markup {
        Some(m) if !m.is_empty() => format!(" in \n{}", m),
        _ => String::new(),
    }
}

fn through(via: &Option<(String, String)>) -> String {
    match via {
        Some((field, ty)) => format!(" through \"{}\" attribute of \"{}\"", field, ty),
        None => String::new(),
    }
}

fn closing(expected: &Option<String>) -> String {
    match expected {
        Some(tag) => format!("an \"{}\" closing tag", tag),
        None => "no closing tag".to_string(),
    }
}

fn found_tag(found: &Option<String>) -> String {
    match found {
        Some(tag) => format!("the \"{}\" tag", tag),
        None => "the end of input".to_string(),
    }
}
