//! Value transformers
//!
//! Small pure functions that translate operator vocabulary (snake_case,
//! shorthand enum values, booleans, short names) into the wire vocabulary
//! (camelCase, vendor enum spellings, full resource identifiers).
//!
//! Applied to `null` or to a missing key, every transformer is a no-op.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Named fragments used to render resource identifiers
pub type Fragments = BTreeMap<String, String>;

/// Convert `snake_case` to `CamelCase` (or `camelCase`).
///
/// Every `_`-separated segment gets its first character uppercased; the rest
/// of the segment is kept as-is, so already-camelized input is unchanged.
/// Empty segments (from consecutive underscores) are kept as a literal `_`.
pub fn snake_to_camel(s: &str, capitalize_first: bool) -> String {
    if s.is_empty() {
        return String::new();
    }

    let mut out = String::with_capacity(s.len());
    for (i, segment) in s.split('_').enumerate() {
        let mut chars = segment.chars();
        let Some(first) = chars.next() else {
            out.push('_');
            continue;
        };
        if i == 0 && !capitalize_first {
            out.extend(first.to_lowercase());
        } else {
            out.extend(first.to_uppercase());
        }
        out.push_str(chars.as_str());
    }
    out
}

/// Convert `camelCase` to `snake_case`.
///
/// Runs of capitals are treated as one word: `resourceID` becomes
/// `resource_id`, `httpsOnly` becomes `https_only`.
pub fn camel_to_snake(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1);
            let boundary = match prev {
                None | Some('_') => false,
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(|n| n.is_lowercase()),
                _ => false,
            };
            if boundary {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Recursively rewrite every mapping key from snake_case to camelCase.
pub fn camelize_keys(value: &mut Value) {
    match value {
        Value::Object(map) => {
            let entries = std::mem::take(map);
            for (key, mut inner) in entries {
                camelize_keys(&mut inner);
                map.insert(snake_to_camel(&key, false), inner);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(camelize_keys),
        _ => {}
    }
}

/// Map a string through an enum table, leaving unknown values unchanged.
pub fn enum_map(value: &Value, table: &[(String, String)]) -> Value {
    match value {
        Value::String(s) => table
            .iter()
            .find(|(from, _)| from == s)
            .map(|(_, to)| Value::String(to.clone()))
            .unwrap_or_else(|| value.clone()),
        _ => value.clone(),
    }
}

/// Wire strings a boolean maps to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoolMap {
    /// Value for `true`
    pub when_true: String,
    /// Value for `false`
    pub when_false: String,
}

impl BoolMap {
    pub fn new(when_true: impl Into<String>, when_false: impl Into<String>) -> Self {
        Self {
            when_true: when_true.into(),
            when_false: when_false.into(),
        }
    }
}

/// Map a boolean to its wire string.
///
/// A string that already is one of the mapped values passes through, so the
/// transformer can be applied to its own output. Any other type is rejected.
pub fn bool_map(value: &Value, map: &BoolMap) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Bool(true) => Ok(Value::String(map.when_true.clone())),
        Value::Bool(false) => Ok(Value::String(map.when_false.clone())),
        Value::String(s) if *s == map.when_true || *s == map.when_false => Ok(value.clone()),
        other => Err(Error::bad_input(format!(
            "expected a boolean, got {}",
            type_name(other)
        ))),
    }
}

/// Uppercase a string value.
pub fn uppercase(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.to_uppercase()),
        _ => value.clone(),
    }
}

/// Move `old_key` to `new_key`. No-op when `old_key` is missing or null.
pub fn rename(container: &mut Map<String, Value>, old_key: &str, new_key: &str) {
    if old_key == new_key || container.get(old_key).is_none_or(Value::is_null) {
        return;
    }
    if let Some(value) = container.remove(old_key) {
        container.insert(new_key.to_string(), value);
    }
}

/// Move `container[inner_key]` to `container[outer_key][inner_key]`.
///
/// The outer mapping is created when absent. Fails when `outer_key` already
/// holds something other than a mapping.
pub fn expand_into(container: &mut Map<String, Value>, inner_key: &str, outer_key: &str) -> Result<()> {
    if container.get(inner_key).is_none_or(Value::is_null) {
        return Ok(());
    }

    match container.get(outer_key) {
        None | Some(Value::Null) => {
            container.insert(outer_key.to_string(), Value::Object(Map::new()));
        }
        Some(Value::Object(_)) => {}
        Some(other) => {
            return Err(Error::bad_input(format!(
                "cannot expand '{inner_key}' into '{outer_key}': '{outer_key}' is a {}",
                type_name(other)
            )));
        }
    }

    if let Some(value) = container.remove(inner_key)
        && let Some(Value::Object(outer)) = container.get_mut(outer_key)
    {
        outer.insert(inner_key.to_string(), value);
    }
    Ok(())
}

/// A resource identifier template such as
/// `/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/Microsoft.EventHub/namespaces/{namespace_name}/eventhubs/{name}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceIdTemplate(String);

impl ResourceIdTemplate {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    /// The raw pattern
    pub fn pattern(&self) -> &str {
        &self.0
    }

    /// Placeholder names in order of appearance
    pub fn fields(&self) -> Vec<&str> {
        let mut fields = Vec::new();
        let mut rest = self.0.as_str();
        while let Some(start) = rest.find('{') {
            let Some(len) = rest[start..].find('}') else {
                break;
            };
            fields.push(&rest[start + 1..start + len]);
            rest = &rest[start + len + 1..];
        }
        fields
    }

    /// Render the template. Every placeholder must have a fragment.
    pub fn render(&self, fragments: &Fragments) -> Result<String> {
        let mut out = self.0.clone();
        for field in self.fields() {
            let value = fragments
                .get(field)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    Error::bad_input(format!(
                        "missing '{field}' to build identifier {}",
                        self.0
                    ))
                })?;
            out = out.replace(&format!("{{{field}}}"), value);
        }
        Ok(out)
    }
}

impl fmt::Display for ResourceIdTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Build a full resource identifier from a short name or a fragment mapping.
///
/// - a string starting with `/` is already an identifier and is kept
/// - any other string is used as the `name` fragment
/// - a mapping supplies fragments by key, overriding `defaults`
pub fn build_resource_id(value: &Value, template: &ResourceIdTemplate, defaults: &Fragments) -> Result<Value> {
    let mut fragments = defaults.clone();
    match value {
        Value::Null => return Ok(Value::Null),
        Value::String(s) if s.starts_with('/') => return Ok(value.clone()),
        Value::String(s) => {
            fragments.insert("name".to_string(), s.clone());
        }
        Value::Object(map) => {
            for (key, fragment) in map {
                match fragment {
                    Value::String(s) => {
                        fragments.insert(key.clone(), s.clone());
                    }
                    Value::Number(n) => {
                        fragments.insert(key.clone(), n.to_string());
                    }
                    Value::Null => {}
                    other => {
                        return Err(Error::bad_input(format!(
                            "identifier fragment '{key}' must be a string, got {}",
                            type_name(other)
                        )));
                    }
                }
            }
        }
        other => {
            return Err(Error::bad_input(format!(
                "expected a name, identifier or fragment mapping, got {}",
                type_name(other)
            )));
        }
    }
    template.render(&fragments).map(Value::String)
}

/// Short type name of a JSON value for error messages
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}
