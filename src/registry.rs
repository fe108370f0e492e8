//! Named registries of type descriptors.
//!
//! Type references inside field declarations (`Item`, `List`, `Choice`) are
//! plain names resolved lazily against the registry the owning type was
//! built into, so types may refer to each other before both exist.

use crate::error::{Error, Result};
use crate::model::Instance;
use crate::parser;
use crate::parser::dom::Document;
use crate::schema::TypeDescriptor;
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// Registry used by types that don't name one.
pub const DEFAULT_REGISTRY: &str = "default";

type Callback = Box<dyn FnOnce(&Arc<TypeDescriptor>) + Send>;

/// A name -> descriptor map plus the callbacks waiting for names not yet registered.
pub struct Registry {
    name: String,
    types: RwLock<IndexMap<String, Arc<TypeDescriptor>>>,
    pending: Mutex<HashMap<String, Vec<Callback>>>,
}

static REGISTRIES: OnceCell<RwLock<HashMap<String, Arc<Registry>>>> = OnceCell::new();

fn registries() -> &'static RwLock<HashMap<String, Arc<Registry>>> {
    REGISTRIES.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Get (creating on first use) the registry called `name`.
pub fn registry(name: &str) -> Arc<Registry> {
    if let Ok(r) = registries().read() {
        if let Some(reg) = r.get(name) {
            return reg.clone();
        }
    }
    let mut w = registries().write().unwrap_or_else(|e| e.into_inner());
    w.entry(name.to_string())
        .or_insert_with(|| {
            Arc::new(Registry {
                name: name.to_string(),
                types: RwLock::new(IndexMap::new()),
                pending: Mutex::new(HashMap::new()),
            })
        })
        .clone()
}

/// Shorthand for `registry(registry_name).resolve(type_name)`.
pub fn resolve(registry_name: &str, type_name: &str) -> Result<Arc<TypeDescriptor>> {
    registry(registry_name).resolve(type_name)
}

impl Registry {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert `ty` under its name. A later registration with the same name
    /// replaces the earlier one.
    pub fn register(&self, ty: Arc<TypeDescriptor>) -> Arc<TypeDescriptor> {
        {
            let mut w = self.types.write().unwrap_or_else(|e| e.into_inner());
            if w.insert(ty.name().to_string(), ty.clone()).is_some() {
                tracing::warn!(registry = %self.name, name = %ty.name(), "replacing registered type");
            } else {
                tracing::debug!(registry = %self.name, name = %ty.name(), "registered type");
            }
        }
        let callbacks = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(ty.name())
            .unwrap_or_default();
        for callback in callbacks {
            callback(&ty);
        }
        ty
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<TypeDescriptor>> {
        self.types
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                registry: self.name.clone(),
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types
            .read()
            .map(|r| r.contains_key(name))
            .unwrap_or(false)
    }

    /// Registered types in registration order.
    pub fn types(&self) -> Vec<Arc<TypeDescriptor>> {
        self.types
            .read()
            .map(|r| r.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Run `callback` once when `name` gets registered; immediately if it
    /// already is.
    pub fn on_register<F>(&self, name: &str, callback: F)
    where
        F: FnOnce(&Arc<TypeDescriptor>) + Send + 'static,
    {
        // Hold the pending lock across the lookup so a concurrent register
        // either sees the callback or is seen by it.
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        match self.resolve(name) {
            Ok(ty) => {
                drop(pending);
                callback(&ty);
            }
            Err(_) => pending
                .entry(name.to_string())
                .or_default()
                .push(Box::new(callback)),
        }
    }

    /// Deserialize a document whose root element is any registered type.
    pub fn instance_from_xml(&self, text: &str) -> Result<Instance> {
        let doc = Document::parse(text)?;
        let root = doc.root_element();
        let tag = root.tag_name();
        let ty = self
            .types()
            .into_iter()
            .find(|t| t.element_name() == tag)
            .ok_or_else(|| {
                Error::ParseFailure(format!(
                    "no type registered in '{}' for element <{}>",
                    self.name, tag
                ))
            })?;
        parser::from_element(&ty, root)
    }
}
