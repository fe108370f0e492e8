//! Type descriptors: the per-type metadata (fields, element name, output
//! flags) and the builder that validates and registers them.

use crate::error::{Error, Result};
use crate::model::Instance;
use crate::node::{FieldDescriptor, NodeKind, is_xml_name};
use crate::registry::{self, DEFAULT_REGISTRY};
use std::fmt;
use std::sync::Arc;

/// Hook run once at the end of instance construction.
pub type InitHook = Arc<dyn Fn(&mut Instance) -> Result<()> + Send + Sync>;

/// Immutable description of a mapped type, shared by all its instances.
pub struct TypeDescriptor {
    name: String,
    element_name: String,
    registry: String,
    fields: Vec<Arc<FieldDescriptor>>,
    element_order: Vec<String>,
    attribute_order: Vec<String>,
    entities: Vec<(String, String)>,
    strip_strings: bool,
    pretty_print: bool,
    encoding: String,
    ancestors: Vec<String>,
    init_hook: Option<InitHook>,
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("element_name", &self.element_name)
            .field("registry", &self.registry)
            .field("fields", &self.fields.iter().map(|f| f.name()).collect::<Vec<_>>())
            .field("ancestors", &self.ancestors)
            .field("has_init_hook", &self.init_hook.is_some())
            .finish()
    }
}

impl TypeDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tag used for this type in markup.
    pub fn element_name(&self) -> &str {
        &self.element_name
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// All fields in declaration order, inherited ones first.
    pub fn fields(&self) -> &[Arc<FieldDescriptor>] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Arc<FieldDescriptor>> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// The field marked `main`, if any.
    pub fn main_field(&self) -> Option<&Arc<FieldDescriptor>> {
        self.fields.iter().find(|f| f.is_main())
    }

    pub fn entities(&self) -> &[(String, String)] {
        &self.entities
    }

    pub fn strip_strings(&self) -> bool {
        self.strip_strings
    }

    pub fn pretty_print(&self) -> bool {
        self.pretty_print
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// Base type names, nearest first.
    pub fn ancestors(&self) -> &[String] {
        &self.ancestors
    }

    pub fn is_a(&self, type_name: &str) -> bool {
        self.name == type_name || self.ancestors.iter().any(|a| a == type_name)
    }

    pub(crate) fn init_hook(&self) -> Option<&InitHook> {
        self.init_hook.as_ref()
    }

    /// Child element fields in output order: the explicit order first, then
    /// the remaining ones in declaration order.
    pub fn element_fields(&self) -> Vec<&Arc<FieldDescriptor>> {
        self.ordered(&self.element_order, |f| !f.is_attribute() && !f.is_header())
    }

    /// Attribute fields in output order.
    pub fn attribute_fields(&self) -> Vec<&Arc<FieldDescriptor>> {
        self.ordered(&self.attribute_order, |f| f.is_attribute())
    }

    /// Processing-instruction fields in declaration order.
    pub fn header_fields(&self) -> Vec<&Arc<FieldDescriptor>> {
        self.fields.iter().filter(|f| f.is_header()).collect()
    }

    fn ordered<F>(&self, order: &[String], keep: F) -> Vec<&Arc<FieldDescriptor>>
    where
        F: Fn(&FieldDescriptor) -> bool,
    {
        let mut out: Vec<&Arc<FieldDescriptor>> = order
            .iter()
            .filter_map(|name| self.field(name))
            .filter(|f| keep(&***f))
            .collect();
        for field in &self.fields {
            if keep(&**field) && !order.iter().any(|n| n == field.name()) {
                out.push(field);
            }
        }
        out
    }
}

/// Builder for [`TypeDescriptor`]. [`TypeBuilder::build`] checks the
/// declaration and registers the result.
pub struct TypeBuilder {
    name: String,
    element_name: Option<String>,
    registry: String,
    fields: Vec<FieldDescriptor>,
    inherited: Vec<FieldDescriptor>,
    element_order: Vec<String>,
    attribute_order: Vec<String>,
    entities: Vec<(String, String)>,
    strip_strings: bool,
    pretty_print: bool,
    encoding: String,
    ancestors: Vec<String>,
    init_hook: Option<InitHook>,
}

impl TypeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            element_name: None,
            registry: DEFAULT_REGISTRY.to_string(),
            fields: Vec::new(),
            inherited: Vec::new(),
            element_order: Vec::new(),
            attribute_order: Vec::new(),
            entities: Vec::new(),
            strip_strings: true,
            pretty_print: true,
            encoding: "utf-8".to_string(),
            ancestors: Vec::new(),
            init_hook: None,
        }
    }

    /// Inherit fields, flags, entity table and init hook from `base`. The
    /// element name is not inherited.
    pub fn extends(mut self, base: &TypeDescriptor) -> Self {
        self.inherited = base.fields.iter().map(|f| (**f).clone()).collect();
        self.element_order = base.element_order.clone();
        self.attribute_order = base.attribute_order.clone();
        self.entities = base.entities.clone();
        self.strip_strings = base.strip_strings;
        self.pretty_print = base.pretty_print;
        self.encoding = base.encoding.clone();
        self.init_hook = base.init_hook.clone();
        self.ancestors = std::iter::once(base.name.clone())
            .chain(base.ancestors.iter().cloned())
            .collect();
        self
    }

    /// Override the element name. Spaces become underscores.
    pub fn element_name(mut self, name: impl Into<String>) -> Self {
        self.element_name = Some(name.into());
        self
    }

    pub fn registry(mut self, name: impl Into<String>) -> Self {
        self.registry = name.into();
        self
    }

    pub fn field(mut self, name: impl Into<String>, field: FieldDescriptor) -> Self {
        let mut field = field;
        field.name = name.into();
        self.fields.push(field);
        self
    }

    /// Literal-to-replacement pair applied before the fixed escapes.
    pub fn entity(mut self, literal: impl Into<String>, replacement: impl Into<String>) -> Self {
        self.entities.push((literal.into(), replacement.into()));
        self
    }

    pub fn strip_strings(mut self, strip: bool) -> Self {
        self.strip_strings = strip;
        self
    }

    pub fn pretty_print(mut self, pretty: bool) -> Self {
        self.pretty_print = pretty;
        self
    }

    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    pub fn element_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.element_order = order.into_iter().map(Into::into).collect();
        self
    }

    pub fn attribute_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attribute_order = order.into_iter().map(Into::into).collect();
        self
    }

    pub fn on_init<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Instance) -> Result<()> + Send + Sync + 'static,
    {
        self.init_hook = Some(Arc::new(hook));
        self
    }

    /// Check the declaration, then register it in its registry.
    pub fn build(self) -> Result<Arc<TypeDescriptor>> {
        if !is_xml_name(&self.name) {
            return Err(Error::NamingError(format!(
                "'{}' is not a valid type name",
                self.name
            )));
        }
        let element_name = match &self.element_name {
            Some(custom) => {
                let fixed = custom.replace(' ', "_");
                if !is_xml_name(&fixed) {
                    return Err(Error::NamingError(format!(
                        "'{}' is not a valid element name",
                        custom
                    )));
                }
                fixed
            }
            None => self.name.clone(),
        };

        for (i, field) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(Error::InvalidSchema(format!(
                    "field '{}' declared twice in '{}'",
                    field.name, self.name
                )));
            }
            if !is_xml_name(&field.name) {
                return Err(Error::NamingError(format!(
                    "'{}' is not a valid field name",
                    field.name
                )));
            }
            if let NodeKind::ProcessingInstruction { target } = &field.kind {
                if !is_xml_name(target) {
                    return Err(Error::NamingError(format!(
                        "'{}' is not a valid processing instruction target",
                        target
                    )));
                }
            }
        }

        // Inherited fields keep their position unless redeclared.
        let mut merged: Vec<FieldDescriptor> = self
            .inherited
            .into_iter()
            .filter(|f| !self.fields.iter().any(|own| own.name == f.name))
            .collect();
        merged.extend(self.fields);

        let mains = merged.iter().filter(|f| f.main).count();
        if mains > 1 {
            return Err(Error::InvalidSchema(format!(
                "'{}' declares {} main fields",
                self.name, mains
            )));
        }

        let fields = merged
            .into_iter()
            .map(|mut f| {
                f.owner = self.name.clone();
                f.registry = self.registry.clone();
                Arc::new(f)
            })
            .collect();

        let descriptor = Arc::new(TypeDescriptor {
            name: self.name,
            element_name,
            registry: self.registry,
            fields,
            element_order: self.element_order,
            attribute_order: self.attribute_order,
            entities: self.entities,
            strip_strings: self.strip_strings,
            pretty_print: self.pretty_print,
            encoding: self.encoding,
            ancestors: self.ancestors,
            init_hook: self.init_hook,
        });
        Ok(registry::registry(&descriptor.registry).register(descriptor))
    }
}
