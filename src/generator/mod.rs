//! Markup generation for instances.
//!
//! This module provides:
//! - [`xml`] – Canonical and headed XML output from an [`Instance`](crate::model::Instance).
//! - [`pretty`] – Re-indentation of compact markup, doubling as a tag-balance check.

pub mod pretty;
pub mod xml;

use serde::{Deserialize, Serialize};

/// Output options for [`Instance::to_xml`](crate::model::Instance::to_xml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XmlOptions {
    /// Emit the XML declaration and processing-instruction fields.
    pub headers: bool,
    /// Re-indent the result, if the type allows it.
    pub pretty: bool,
    /// Spaces per nesting level when pretty printing.
    pub indent: usize,
}

impl Default for XmlOptions {
    fn default() -> Self {
        Self {
            headers: true,
            pretty: true,
            indent: 2,
        }
    }
}

impl XmlOptions {
    /// No headers, no indentation.
    pub fn canonical() -> Self {
        Self {
            headers: false,
            pretty: false,
            indent: 0,
        }
    }
}
