//! Operator documents
//!
//! A document file holds either one resource (a table with a `module` key
//! next to the module's arguments) or a `resource` array of such tables.
//! TOML and JSON are accepted, chosen by extension.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use thiserror::Error;

const MODULE_KEY: &str = "module";
const RESOURCES_KEY: &str = "resource";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("unsupported document format '{0}' (expected .toml or .json)")]
    UnsupportedFormat(String),

    #[error("{location}: expected a table, found {found}")]
    NotATable { location: String, found: &'static str },

    #[error("{location}: missing 'module' key")]
    MissingModule { location: String },
}

/// One resource request read from a document file
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDocument {
    /// Catalog module name
    pub module: String,
    /// Module arguments (everything except `module`)
    pub args: Value,
    /// `file` or `file#index`, for messages
    pub location: String,
}

/// Load every resource declared in `path`
pub fn load(path: &Path) -> Result<Vec<ResourceDocument>> {
    let content = fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))?;
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    let value = match extension {
        "toml" => {
            let table: toml::Table =
                toml::from_str(&content).with_context(|| format!("Invalid TOML in {}", path.display()))?;
            toml_to_json(toml::Value::Table(table))
        }
        "json" => serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))?,
        other => return Err(DocumentError::UnsupportedFormat(other.to_string()).into()),
    };
    Ok(split(value, &path.display().to_string())?)
}

fn split(value: Value, source: &str) -> Result<Vec<ResourceDocument>, DocumentError> {
    let Value::Object(mut map) = value else {
        return Err(DocumentError::NotATable {
            location: source.to_string(),
            found: kind_of(&value),
        });
    };

    match map.remove(RESOURCES_KEY) {
        Some(Value::Array(items)) if !map.contains_key(MODULE_KEY) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| resource(item, format!("{source}#{i}")))
            .collect(),
        Some(other) => {
            // A module argument that happens to be called `resource`
            map.insert(RESOURCES_KEY.to_string(), other);
            Ok(vec![resource(Value::Object(map), source.to_string())?])
        }
        None => Ok(vec![resource(Value::Object(map), source.to_string())?]),
    }
}

fn resource(value: Value, location: String) -> Result<ResourceDocument, DocumentError> {
    let Value::Object(mut map) = value else {
        return Err(DocumentError::NotATable {
            location,
            found: kind_of(&value),
        });
    };
    let Some(Value::String(module)) = map.remove(MODULE_KEY) else {
        return Err(DocumentError::MissingModule { location });
    };
    Ok(ResourceDocument {
        module,
        args: Value::Object(map),
        location,
    })
}

/// TOML datetimes become RFC 3339 strings; everything else maps directly
fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => Value::from(f),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect::<Map<String, Value>>(),
        ),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "table",
    }
}
