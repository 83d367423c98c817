//! Parameter normalizer
//!
//! Turns the operator document into the wire document by applying an ordered
//! list of rules. Each rule addresses a path (`sku/name`, `rules/*/action`)
//! and an operation from [`crate::transform`].
//!
//! Missing paths are skipped, unknown keys are left alone, and rules run in
//! declaration order so later rules can rely on earlier renames. A validated
//! rule set is idempotent: normalizing its own output changes nothing.

use crate::error::{Error, Result};
use crate::transform::{
    self, BoolMap, Fragments, ResourceIdTemplate, build_resource_id, camelize_keys,
    snake_to_camel,
};
use serde_json::Value;
use std::fmt;

/// One step of a rule path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Exactly one mapping key
    Key(String),
    /// Every element of a list
    Each,
}

/// Path a rule applies to, written `a/b/*/c`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RulePath(Vec<Segment>);

impl RulePath {
    /// Parse a slash-separated path. `*` matches every list element.
    pub fn parse(path: &str) -> Self {
        Self(
            path.split('/')
                .filter(|s| !s.is_empty())
                .map(|s| match s {
                    "*" => Segment::Each,
                    key => Segment::Key(key.to_string()),
                })
                .collect(),
        )
    }

    /// The path addressing the whole document
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Split into the container path and the final key, if the path ends in a key
    fn split_last_key(&self) -> Option<(&[Segment], &str)> {
        match self.0.split_last() {
            Some((Segment::Key(key), parent)) => Some((parent, key.as_str())),
            _ => None,
        }
    }
}

impl fmt::Display for RulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        let parts: Vec<&str> = self
            .0
            .iter()
            .map(|s| match s {
                Segment::Key(k) => k.as_str(),
                Segment::Each => "*",
            })
            .collect();
        write!(f, "{}", parts.join("/"))
    }
}

/// Operation applied at a rule path
#[derive(Debug, Clone, PartialEq)]
pub enum RuleOp {
    /// `send_disabled` -> `SendDisabled`
    CamelizeCapital,
    /// `send_disabled` -> `sendDisabled`
    CamelizeLower,
    /// `lrs` -> `LRS`
    Uppercase,
    /// Literal value table; unknown values pass through
    EnumMap(Vec<(String, String)>),
    /// Boolean to wire string
    BoolMap(BoolMap),
    /// Move the key to a new name within the same mapping
    Rename(String),
    /// Move the key into an outer envelope mapping
    ExpandInto(String),
    /// Short name or fragment mapping to a full resource identifier
    ResourceId(ResourceIdTemplate),
    /// Rewrite every mapping key below the path to camelCase
    CamelizeKeys,
}

impl RuleOp {
    fn moves_key(&self) -> bool {
        matches!(self, Self::Rename(_) | Self::ExpandInto(_))
    }
}

impl fmt::Display for RuleOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CamelizeCapital => write!(f, "camelize"),
            Self::CamelizeLower => write!(f, "camelize-lower"),
            Self::Uppercase => write!(f, "uppercase"),
            Self::EnumMap(table) => {
                let pairs: Vec<String> = table.iter().map(|(a, b)| format!("{a}={b}")).collect();
                write!(f, "enum-map({})", pairs.join(", "))
            }
            Self::BoolMap(map) => write!(f, "bool-map(true={}, false={})", map.when_true, map.when_false),
            Self::Rename(to) => write!(f, "rename({to})"),
            Self::ExpandInto(outer) => write!(f, "expand-into({outer})"),
            Self::ResourceId(template) => write!(f, "resource-id({template})"),
            Self::CamelizeKeys => write!(f, "camelize-keys"),
        }
    }
}

/// A normalization rule: a path plus an operation
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub path: RulePath,
    pub op: RuleOp,
}

impl Rule {
    pub fn new(path: &str, op: RuleOp) -> Self {
        Self {
            path: RulePath::parse(path),
            op,
        }
    }

    pub fn camelize(path: &str) -> Self {
        Self::new(path, RuleOp::CamelizeCapital)
    }

    pub fn camelize_lower(path: &str) -> Self {
        Self::new(path, RuleOp::CamelizeLower)
    }

    pub fn uppercase(path: &str) -> Self {
        Self::new(path, RuleOp::Uppercase)
    }

    pub fn enum_map(path: &str, table: &[(&str, &str)]) -> Self {
        let table = table
            .iter()
            .map(|(from, to)| ((*from).to_string(), (*to).to_string()))
            .collect();
        Self::new(path, RuleOp::EnumMap(table))
    }

    pub fn bool_map(path: &str, when_true: &str, when_false: &str) -> Self {
        Self::new(path, RuleOp::BoolMap(BoolMap::new(when_true, when_false)))
    }

    pub fn rename(path: &str, new_key: &str) -> Self {
        Self::new(path, RuleOp::Rename(new_key.to_string()))
    }

    pub fn expand_into(path: &str, outer_key: &str) -> Self {
        Self::new(path, RuleOp::ExpandInto(outer_key.to_string()))
    }

    pub fn resource_id(path: &str, template: &str) -> Self {
        Self::new(path, RuleOp::ResourceId(ResourceIdTemplate::new(template)))
    }

    pub fn camelize_keys(path: &str) -> Self {
        Self::new(path, RuleOp::CamelizeKeys)
    }

    fn validate(&self) -> Result<()> {
        let path = self.path.to_string();

        if self.path.is_root() && self.op != RuleOp::CamelizeKeys {
            return Err(Error::bad_rule(path, "only camelize-keys may address the whole document"));
        }

        if self.op.moves_key() && self.path.split_last_key().is_none() {
            return Err(Error::bad_rule(path, format!("{} must end in a key", self.op)));
        }

        match &self.op {
            RuleOp::Rename(to) | RuleOp::ExpandInto(to) if to.is_empty() => {
                Err(Error::bad_rule(path, "target key is empty"))
            }
            RuleOp::EnumMap(table) => {
                for (from, to) in table {
                    if let Some((_, again)) = table.iter().find(|(f, _)| f == to)
                        && again != to
                    {
                        return Err(Error::bad_rule(
                            path,
                            format!("'{from}' maps to '{to}', which maps on to '{again}'"),
                        ));
                    }
                }
                Ok(())
            }
            RuleOp::ResourceId(template) if template.fields().is_empty() => {
                Err(Error::bad_rule(path, "identifier template has no placeholders"))
            }
            _ => Ok(()),
        }
    }
}

/// An ordered, validated list of rules
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Validate and wrap a list of rules
    pub fn new(rules: Vec<Rule>) -> Result<Self> {
        for rule in &rules {
            rule.validate()?;
        }
        Ok(Self { rules })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply every rule in order
    pub fn normalize(&self, document: Value, fragments: &Fragments) -> Result<Value> {
        normalize(document, self, fragments)
    }
}

/// Apply `rules` to `document`.
///
/// `fragments` supplies defaults (subscription, resource group) for
/// resource-identifier rules.
pub fn normalize(mut document: Value, rules: &RuleSet, fragments: &Fragments) -> Result<Value> {
    for rule in rules.rules() {
        apply_rule(&mut document, rule, fragments).map_err(|e| match e {
            Error::BadInput { message } => Error::bad_input(format!("{}: {message}", rule.path)),
            other => other,
        })?;
    }
    Ok(document)
}

fn apply_rule(document: &mut Value, rule: &Rule, fragments: &Fragments) -> Result<()> {
    match &rule.op {
        RuleOp::Rename(new_key) => {
            let Some((parent, key)) = rule.path.split_last_key() else {
                return Ok(());
            };
            for_each_target(document, parent, &mut |container: &mut Value| {
                if let Value::Object(map) = container {
                    transform::rename(map, key, new_key);
                }
                Ok(())
            })
        }
        RuleOp::ExpandInto(outer) => {
            let Some((parent, key)) = rule.path.split_last_key() else {
                return Ok(());
            };
            for_each_target(document, parent, &mut |container: &mut Value| match container {
                Value::Object(map) => transform::expand_into(map, key, outer),
                _ => Ok(()),
            })
        }
        op => for_each_target(document, rule.path.segments(), &mut |value: &mut Value| {
            *value = transform_value(value, op, fragments)?;
            Ok(())
        }),
    }
}

fn transform_value(value: &mut Value, op: &RuleOp, fragments: &Fragments) -> Result<Value> {
    Ok(match op {
        RuleOp::CamelizeCapital => camelize_string(value, true),
        RuleOp::CamelizeLower => camelize_string(value, false),
        RuleOp::Uppercase => transform::uppercase(value),
        RuleOp::EnumMap(table) => transform::enum_map(value, table),
        RuleOp::BoolMap(map) => transform::bool_map(value, map)?,
        RuleOp::ResourceId(template) => build_resource_id(value, template, fragments)?,
        RuleOp::CamelizeKeys => {
            let mut out = std::mem::take(value);
            camelize_keys(&mut out);
            out
        }
        RuleOp::Rename(_) | RuleOp::ExpandInto(_) => value.clone(),
    })
}

fn camelize_string(value: &Value, capitalize_first: bool) -> Value {
    match value {
        Value::String(s) => Value::String(snake_to_camel(s, capitalize_first)),
        _ => value.clone(),
    }
}

/// Visit every value addressed by `segments`. Missing keys and non-list
/// values under `*` are skipped.
fn for_each_target(
    value: &mut Value,
    segments: &[Segment],
    f: &mut dyn FnMut(&mut Value) -> Result<()>,
) -> Result<()> {
    let Some((head, rest)) = segments.split_first() else {
        return f(value);
    };

    match (head, value) {
        (Segment::Key(key), Value::Object(map)) => match map.get_mut(key) {
            Some(child) => for_each_target(child, rest, f),
            None => Ok(()),
        },
        (Segment::Each, Value::Array(items)) => {
            for item in items {
                for_each_target(item, rest, f)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Remove keys whose value is null, recursively.
///
/// Operators express "don't care" by leaving fields out; an explicit null is
/// treated the same way before the document is sent anywhere.
pub fn strip_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {}
    }
}
