//! Module definitions: the data each resource module declares
//!
//! A module is pure catalog data. It names the resource kind and API
//! version, the identifier template whose placeholders are the identity
//! arguments, the argument table the operator document is validated
//! against, the normalization rules, the comparator modifiers, and the
//! output selectors.

use crate::diff::Modifiers;
use crate::error::{Error, Result};
use crate::normalize::{RuleSet, strip_nulls};
use crate::transform::{Fragments, ResourceIdTemplate, camel_to_snake, type_name};
use crate::types::DesiredState;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Operator-document keys every module accepts
const STATE_KEY: &str = "state";
const ETAG_KEY: &str = "etag";

/// Type of an operator argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgKind {
    String,
    Int,
    Float,
    Bool,
    List,
    Dict,
    /// Any JSON value, passed through unchecked
    Raw,
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "str",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::List => "list",
            Self::Dict => "dict",
            Self::Raw => "raw",
        };
        write!(f, "{name}")
    }
}

impl ArgKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Int => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::Bool => value.is_boolean(),
            Self::List => value.is_array(),
            Self::Dict => value.is_object(),
            Self::Raw => true,
        }
    }
}

/// One entry of a module's argument table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgSpec {
    pub name: String,
    pub kind: ArgKind,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    /// Allowed values (string arguments and string list elements)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    /// Element type for lists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elements: Option<ArgKind>,
    /// Sub-options for dicts and lists of dicts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ArgSpec>,
}

impl ArgSpec {
    pub fn new(name: &str, kind: ArgKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: false,
            choices: Vec::new(),
            elements: None,
            options: Vec::new(),
        }
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, ArgKind::String)
    }

    pub fn int(name: &str) -> Self {
        Self::new(name, ArgKind::Int)
    }

    pub fn bool(name: &str) -> Self {
        Self::new(name, ArgKind::Bool)
    }

    pub fn dict(name: &str, options: Vec<ArgSpec>) -> Self {
        Self {
            options,
            ..Self::new(name, ArgKind::Dict)
        }
    }

    pub fn list(name: &str, elements: ArgKind) -> Self {
        Self {
            elements: Some(elements),
            ..Self::new(name, ArgKind::List)
        }
    }

    /// A list of dicts with the given sub-options
    pub fn list_of(name: &str, options: Vec<ArgSpec>) -> Self {
        Self {
            elements: Some(ArgKind::Dict),
            options,
            ..Self::new(name, ArgKind::List)
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn choices(mut self, choices: &[&str]) -> Self {
        self.choices = choices.iter().map(|c| (*c).to_string()).collect();
        self
    }

    fn validate(&self, value: &Value, path: &str) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        if !self.kind.accepts(value) {
            return Err(Error::bad_input(format!(
                "argument '{path}' must be of type {}, got {}",
                self.kind,
                type_name(value)
            )));
        }

        match value {
            Value::String(s) => self.check_choice(s, path),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    let item_path = format!("{path}[{i}]");
                    if let Some(kind) = self.elements
                        && !kind.accepts(item)
                    {
                        return Err(Error::bad_input(format!(
                            "argument '{item_path}' must be of type {kind}, got {}",
                            type_name(item)
                        )));
                    }
                    match item {
                        Value::String(s) => self.check_choice(s, &item_path)?,
                        Value::Object(map) if !self.options.is_empty() => {
                            validate_options(&self.options, map, &item_path)?;
                        }
                        _ => {}
                    }
                }
                Ok(())
            }
            Value::Object(map) if !self.options.is_empty() => validate_options(&self.options, map, path),
            _ => Ok(()),
        }
    }

    fn check_choice(&self, value: &str, path: &str) -> Result<()> {
        if self.choices.is_empty() || self.choices.iter().any(|c| c == value) {
            Ok(())
        } else {
            Err(Error::bad_input(format!(
                "value of '{path}' must be one of: {}, got: {value}",
                self.choices.join(", ")
            )))
        }
    }
}

fn validate_options(specs: &[ArgSpec], map: &Map<String, Value>, prefix: &str) -> Result<()> {
    for key in map.keys() {
        if !specs.iter().any(|s| &s.name == key) {
            return Err(Error::bad_input(format!(
                "unsupported argument '{}'",
                join_path(prefix, key)
            )));
        }
    }
    for spec in specs {
        let path = join_path(prefix, &spec.name);
        match map.get(&spec.name) {
            Some(value) if !value.is_null() => spec.validate(value, &path)?,
            _ if spec.required => {
                return Err(Error::bad_input(format!("missing required argument '{path}'")));
            }
            _ => {}
        }
    }
    Ok(())
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// A status field reported in the invocation result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputField {
    /// Result key; defaults to the snake_case form of the last pointer segment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// JSON pointer into the wire document
    pub pointer: String,
}

impl OutputField {
    pub fn new(pointer: &str) -> Self {
        Self {
            name: None,
            pointer: pointer.to_string(),
        }
    }

    pub fn named(name: &str, pointer: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            pointer: pointer.to_string(),
        }
    }

    /// Key under which the field is reported
    pub fn key(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => camel_to_snake(self.pointer.rsplit('/').next().unwrap_or_default()),
        }
    }
}

/// How an UPDATE body is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStyle {
    /// Full replacement: observed overlaid with desired, minus read-only fields
    #[default]
    Put,
    /// Merge: the desired document only
    Patch,
}

/// A validated operator request for one resource
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Desired state flag
    pub state: DesiredState,
    /// Identity fragments (every identifier-template placeholder)
    pub fragments: Fragments,
    /// ETag forwarded as `If-Match`
    pub etag: Option<String>,
    /// Desired attributes in operator vocabulary
    pub attributes: Value,
}

/// Declarative description of one resource module
#[derive(Debug, Clone)]
pub struct ModuleDefinition {
    /// Module name used in operator documents (e.g. "eventhub")
    pub name: String,
    /// Human-readable resource kind (e.g. "Event Hub")
    pub kind: String,
    /// ARM API version of the resource type
    pub api_version: String,
    /// Identifier template; its placeholders are the identity arguments
    pub id_template: ResourceIdTemplate,
    /// Attribute arguments
    pub arguments: Vec<ArgSpec>,
    /// Normalization rules from operator vocabulary to wire vocabulary
    pub rules: RuleSet,
    /// Comparator modifiers
    pub modifiers: Modifiers,
    /// Status fields reported on present actions
    pub outputs: Vec<OutputField>,
    pub update_style: UpdateStyle,
    /// JSON pointers the API rejects on write
    pub read_only: Vec<String>,
}

impl ModuleDefinition {
    pub fn new(name: &str, kind: &str, api_version: &str, id_template: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            api_version: api_version.to_string(),
            id_template: ResourceIdTemplate::new(id_template),
            arguments: Vec::new(),
            rules: RuleSet::empty(),
            modifiers: Modifiers::new(),
            outputs: Vec::new(),
            update_style: UpdateStyle::Put,
            read_only: Vec::new(),
        }
    }

    #[must_use]
    pub fn arguments(mut self, arguments: Vec<ArgSpec>) -> Self {
        self.arguments = arguments;
        self
    }

    #[must_use]
    pub fn rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    #[must_use]
    pub fn modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    #[must_use]
    pub fn outputs(mut self, outputs: Vec<OutputField>) -> Self {
        self.outputs = outputs;
        self
    }

    #[must_use]
    pub fn update_style(mut self, style: UpdateStyle) -> Self {
        self.update_style = style;
        self
    }

    #[must_use]
    pub fn read_only(mut self, pointers: &[&str]) -> Self {
        self.read_only = pointers.iter().map(|p| (*p).to_string()).collect();
        self
    }

    /// Identity argument names, in template order
    pub fn identity_fields(&self) -> Vec<&str> {
        self.id_template.fields()
    }

    /// Validate an operator document and split it into a [`Request`].
    ///
    /// Identity fragments missing from `input` are taken from `defaults`
    /// (typically the configured subscription).
    pub fn parse_request(&self, input: &Value, defaults: &Fragments) -> Result<Request> {
        let Value::Object(map) = input else {
            return Err(Error::bad_input(format!(
                "{} arguments must be a mapping, got {}",
                self.name,
                type_name(input)
            )));
        };

        let state = match map.get(STATE_KEY) {
            None | Some(Value::Null) => DesiredState::default(),
            Some(Value::String(s)) => s.parse()?,
            Some(other) => {
                return Err(Error::bad_input(format!(
                    "argument 'state' must be of type str, got {}",
                    type_name(other)
                )));
            }
        };

        let etag = match map.get(ETAG_KEY) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                return Err(Error::bad_input(format!(
                    "argument 'etag' must be of type str, got {}",
                    type_name(other)
                )));
            }
        };

        let identity = self.identity_fields();
        let mut fragments = Fragments::new();
        for field in &identity {
            let value = match map.get(*field) {
                Some(Value::String(s)) if !s.is_empty() => s.clone(),
                Some(Value::Null) | None => match defaults.get(*field) {
                    Some(s) if !s.is_empty() => s.clone(),
                    _ => return Err(Error::bad_input(format!("missing required argument '{field}'"))),
                },
                Some(other) => {
                    return Err(Error::bad_input(format!(
                        "argument '{field}' must be a non-empty str, got {}",
                        type_name(other)
                    )));
                }
            };
            fragments.insert((*field).to_string(), value);
        }

        let mut attributes = Map::new();
        for (key, value) in map {
            if key == STATE_KEY || key == ETAG_KEY || identity.contains(&key.as_str()) {
                continue;
            }
            attributes.insert(key.clone(), value.clone());
        }
        validate_options(&self.arguments, &attributes, "")?;

        Ok(Request {
            state,
            fragments,
            etag,
            attributes: Value::Object(attributes),
        })
    }

    /// Full identifier of the requested resource
    pub fn resource_id(&self, request: &Request) -> Result<String> {
        self.id_template.render(&request.fragments)
    }

    /// Normalize the request's attributes into the desired wire document.
    pub fn desired_document(&self, request: &Request) -> Result<Value> {
        let mut document = self.rules.normalize(request.attributes.clone(), &request.fragments)?;
        strip_nulls(&mut document);
        Ok(document)
    }

    /// Body of an UPDATE call
    pub fn update_body(&self, desired: &Value, observed: &Value) -> Value {
        match self.update_style {
            UpdateStyle::Patch => desired.clone(),
            UpdateStyle::Put => {
                let mut body = observed.clone();
                overlay(&mut body, desired);
                for pointer in &self.read_only {
                    remove_pointer(&mut body, pointer);
                }
                body
            }
        }
    }

    /// Select the module's status fields from a wire document
    pub fn select_outputs(&self, document: &Value) -> Map<String, Value> {
        self.outputs
            .iter()
            .filter_map(|field| {
                document
                    .pointer(&field.pointer)
                    .filter(|v| !v.is_null())
                    .map(|v| (field.key(), v.clone()))
            })
            .collect()
    }
}

/// Merge `top` into `base`: mappings recursively, everything else replaced
pub fn overlay(base: &mut Value, top: &Value) {
    match (base, top) {
        (Value::Object(base), Value::Object(top)) => {
            for (key, value) in top {
                match base.get_mut(key) {
                    Some(existing) if existing.is_object() && value.is_object() => overlay(existing, value),
                    _ => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, top) => *base = top.clone(),
    }
}

fn remove_pointer(document: &mut Value, pointer: &str) {
    let Some((parent, key)) = pointer.rsplit_once('/') else {
        return;
    };
    let container = if parent.is_empty() {
        Some(document)
    } else {
        document.pointer_mut(parent)
    };
    if let Some(Value::Object(map)) = container {
        map.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Rule;
    use serde_json::json;

    fn queue_module() -> ModuleDefinition {
        ModuleDefinition::new(
            "servicebus_queue",
            "Service Bus Queue",
            "2021-11-01",
            "/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/Microsoft.ServiceBus/namespaces/{namespace_name}/queues/{name}",
        )
        .arguments(vec![
            ArgSpec::int("max_size_in_megabytes"),
            ArgSpec::bool("requires_session"),
            ArgSpec::string("status").choices(&["active", "disabled"]),
            ArgSpec::list("tags_list", ArgKind::String),
            ArgSpec::dict("forwarding", vec![ArgSpec::string("to").required()]),
        ])
        .rules(
            RuleSet::new(vec![
                Rule::camelize_keys(""),
                Rule::camelize("status"),
            ])
            .unwrap(),
        )
        .outputs(vec![OutputField::new("/status"), OutputField::named("size", "/sizeInBytes")])
        .read_only(&["/id", "/countDetails/activeMessageCount"])
    }

    fn defaults() -> Fragments {
        Fragments::from([("subscription_id".to_string(), "sub".to_string())])
    }

    #[test]
    fn test_parse_request_splits_identity() {
        let module = queue_module();
        let input = json!({
            "resource_group": "rg1",
            "namespace_name": "ns1",
            "name": "q1",
            "state": "absent",
            "etag": "W/\"1\"",
            "status": "active",
        });
        let request = module.parse_request(&input, &defaults()).unwrap();
        assert_eq!(request.state, DesiredState::Absent);
        assert_eq!(request.etag.as_deref(), Some("W/\"1\""));
        assert_eq!(request.attributes, json!({"status": "active"}));
        assert_eq!(
            module.resource_id(&request).unwrap(),
            "/subscriptions/sub/resourceGroups/rg1/providers/Microsoft.ServiceBus/namespaces/ns1/queues/q1"
        );
    }

    #[test]
    fn test_parse_request_defaults_state() {
        let module = queue_module();
        let input = json!({"resource_group": "rg1", "namespace_name": "ns1", "name": "q1"});
        let request = module.parse_request(&input, &defaults()).unwrap();
        assert_eq!(request.state, DesiredState::Present);
    }

    #[test]
    fn test_parse_request_rejects_bad_input() {
        let module = queue_module();
        let base = json!({"resource_group": "rg1", "namespace_name": "ns1", "name": "q1"});
        let with = |key: &str, value: Value| {
            let mut doc = base.clone();
            doc[key] = value;
            module.parse_request(&doc, &defaults()).unwrap_err().to_string()
        };

        assert!(with("unknown", json!(1)).contains("unsupported argument 'unknown'"));
        assert!(with("max_size_in_megabytes", json!("big")).contains("must be of type int"));
        assert!(with("status", json!("paused")).contains("must be one of"));
        assert!(with("state", json!("gone")).contains("present, absent"));
        assert!(with("tags_list", json!(["a", 1])).contains("tags_list[1]"));
        assert!(with("forwarding", json!({})).contains("missing required argument 'forwarding.to'"));
        assert!(with("forwarding", json!({"to": "x", "via": "y"})).contains("forwarding.via"));

        let missing = json!({"resource_group": "rg1", "name": "q1"});
        let err = module.parse_request(&missing, &defaults()).unwrap_err();
        assert!(err.to_string().contains("namespace_name"));
        assert!(module.parse_request(&json!([1]), &defaults()).is_err());
    }

    #[test]
    fn test_null_arguments_are_accepted() {
        let module = queue_module();
        let input = json!({"resource_group": "rg1", "namespace_name": "ns1", "name": "q1", "status": null});
        assert!(module.parse_request(&input, &defaults()).is_ok());
    }

    #[test]
    fn test_desired_document() {
        let module = queue_module();
        let input = json!({
            "resource_group": "rg1", "namespace_name": "ns1", "name": "q1",
            "max_size_in_megabytes": 1024, "requires_session": null, "status": "disabled",
        });
        let request = module.parse_request(&input, &defaults()).unwrap();
        assert_eq!(
            module.desired_document(&request).unwrap(),
            json!({"maxSizeInMegabytes": 1024, "status": "Disabled"})
        );
    }

    #[test]
    fn test_put_update_body_keeps_unset_fields() {
        let module = queue_module();
        let observed = json!({
            "id": "/x/q1",
            "maxSizeInMegabytes": 1024,
            "status": "Active",
            "countDetails": {"activeMessageCount": 3, "deadLetterMessageCount": 0},
        });
        let body = module.update_body(&json!({"status": "Disabled"}), &observed);
        assert_eq!(
            body,
            json!({
                "maxSizeInMegabytes": 1024,
                "status": "Disabled",
                "countDetails": {"deadLetterMessageCount": 0},
            })
        );

        let patch = module.clone().update_style(UpdateStyle::Patch);
        assert_eq!(patch.update_body(&json!({"status": "Disabled"}), &observed), json!({"status": "Disabled"}));
    }

    #[test]
    fn test_select_outputs() {
        let module = queue_module();
        let outputs = module.select_outputs(&json!({"status": "Active", "sizeInBytes": 0, "other": 1}));
        assert_eq!(Value::Object(outputs), json!({"status": "Active", "size": 0}));
        assert!(module.select_outputs(&json!({})).is_empty());
    }

    #[test]
    fn test_overlay_replaces_lists() {
        let mut base = json!({"a": {"b": 1, "c": 2}, "l": [1, 2, 3]});
        overlay(&mut base, &json!({"a": {"b": 9}, "l": [4]}));
        assert_eq!(base, json!({"a": {"b": 9, "c": 2}, "l": [4]}));
    }

    #[test]
    fn test_output_field_key() {
        assert_eq!(OutputField::new("/provisioningState").key(), "provisioning_state");
        assert_eq!(OutputField::named("endpoint", "/primaryEndpoints/blob").key(), "endpoint");
    }
}
