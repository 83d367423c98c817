//! Built-in resource modules
//!
//! Every module is pure data: an identifier template, an argument table,
//! normalization rules, comparator modifiers and output selectors. The
//! reconciliation driver is shared.

mod apim_api;
mod eventhub;
mod metric_alert;
mod servicebus_queue;
mod sql_database;
mod storage_account;

use crate::error::{Error, Result};
use declarative::ModuleDefinition;
use std::collections::BTreeMap;

type Constructor = fn() -> declarative::Result<ModuleDefinition>;

const BUILTIN: &[(&str, Constructor)] = &[
    ("apim_api", apim_api::module),
    ("eventhub", eventhub::module),
    ("metric_alert", metric_alert::module),
    ("servicebus_queue", servicebus_queue::module),
    ("sql_database", sql_database::module),
    ("storage_account", storage_account::module),
];

/// Module registry keyed by module name
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    modules: BTreeMap<String, ModuleDefinition>,
}

impl Catalog {
    /// Build the catalog of built-in modules, validating each one.
    pub fn builtin() -> Result<Self> {
        let mut catalog = Self::default();
        for (name, constructor) in BUILTIN {
            let module = constructor().map_err(|source| Error::Catalog {
                module: (*name).to_string(),
                source,
            })?;
            catalog.register(module);
        }
        Ok(catalog)
    }

    /// Add or replace a module
    pub fn register(&mut self, module: ModuleDefinition) {
        self.modules.insert(module.name.clone(), module);
    }

    pub fn get(&self, name: &str) -> Result<&ModuleDefinition> {
        self.modules.get(name).ok_or_else(|| Error::UnknownModule {
            name: name.to_string(),
        })
    }

    /// Module names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleDefinition> {
        self.modules.values()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
