//! Structural comparison of desired and observed documents
//!
//! The comparator is asymmetric: a `null` (or missing) value on the desired
//! side matches anything, which is what makes partial declarations
//! idempotent. Lists of mappings are compared as sets keyed by identity,
//! scalar lists as sorted multisets, and `/location` ignores casing and
//! whitespace.

use crate::transform::type_name;
use crate::types::Action;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Path that always uses location comparison
const LOCATION_PATH: &str = "/location";

/// How scalars at a path are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Comparison {
    /// Value equality (numbers numerically, RFC 3339 timestamps as instants)
    #[default]
    Default,
    /// Never report a difference
    Ignore,
    /// Strings compared ignoring case
    CaseInsensitive,
    /// Strings compared ignoring case and whitespace (Azure regions)
    Location,
}

/// Comparison settings for one path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifier {
    pub comparison: Comparison,
    /// Whether the cloud API can change this value in place
    pub updatable: bool,
}

impl Default for Modifier {
    fn default() -> Self {
        Self {
            comparison: Comparison::Default,
            updatable: true,
        }
    }
}

/// Per-path modifiers, keyed by wildcard path (`/sku/name`, `/rules/*/name`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers(BTreeMap<String, Modifier>);

impl Modifiers {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(mut self, path: &str, f: impl FnOnce(&mut Modifier)) -> Self {
        f(self.0.entry(path.to_string()).or_default());
        self
    }

    /// Never report differences at `path`
    pub fn ignore(self, path: &str) -> Self {
        self.entry(path, |m| m.comparison = Comparison::Ignore)
    }

    /// Compare strings at `path` ignoring case
    pub fn case_insensitive(self, path: &str) -> Self {
        self.entry(path, |m| m.comparison = Comparison::CaseInsensitive)
    }

    /// Compare strings at `path` like regions
    pub fn location(self, path: &str) -> Self {
        self.entry(path, |m| m.comparison = Comparison::Location)
    }

    /// Differences at `path` cannot be applied as an update
    pub fn immutable(self, path: &str) -> Self {
        self.entry(path, |m| m.updatable = false)
    }

    pub fn get(&self, pattern: &str) -> Option<&Modifier> {
        self.0.get(pattern)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Modifier)> {
        self.0.iter()
    }
}

/// One detected difference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Difference {
    /// Human-readable path (`/partitionCount`, `/rules/[name=r1]/action`)
    pub path: String,
    /// Why the values differ
    pub reason: String,
    /// Whether the difference can be applied as an update
    pub updatable: bool,
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "changed [{}] {}", self.path, self.reason)
    }
}

/// Comparison verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Equal,
    Changed(Difference),
}

impl Verdict {
    pub fn is_equal(&self) -> bool {
        matches!(self, Self::Equal)
    }

    pub fn difference(&self) -> Option<&Difference> {
        match self {
            Self::Equal => None,
            Self::Changed(d) => Some(d),
        }
    }
}

/// Compare with the canonical rules only (no per-path modifiers).
pub fn compare(desired: &Value, observed: &Value, path: &str) -> Verdict {
    let modifiers = Modifiers::new();
    let mut walk = Walk::new(&modifiers, true);
    walk.visit(desired, observed, path, path);
    walk.verdict()
}

/// Structural comparator with per-path modifiers
#[derive(Debug, Clone, Copy)]
pub struct Comparator<'a> {
    modifiers: &'a Modifiers,
}

impl<'a> Comparator<'a> {
    pub fn new(modifiers: &'a Modifiers) -> Self {
        Self { modifiers }
    }

    /// First difference, if any
    pub fn compare(&self, desired: &Value, observed: &Value) -> Verdict {
        let mut walk = Walk::new(self.modifiers, true);
        walk.visit(desired, observed, "", "");
        walk.verdict()
    }

    /// Every difference, in document order
    pub fn compare_all(&self, desired: &Value, observed: &Value) -> Vec<Difference> {
        let mut walk = Walk::new(self.modifiers, false);
        walk.visit(desired, observed, "", "");
        walk.found
    }
}

struct Walk<'a> {
    modifiers: &'a Modifiers,
    first_only: bool,
    found: Vec<Difference>,
}

impl<'a> Walk<'a> {
    fn new(modifiers: &'a Modifiers, first_only: bool) -> Self {
        Self {
            modifiers,
            first_only,
            found: Vec::new(),
        }
    }

    fn done(&self) -> bool {
        self.first_only && !self.found.is_empty()
    }

    fn verdict(mut self) -> Verdict {
        match self.found.drain(..).next() {
            Some(d) => Verdict::Changed(d),
            None => Verdict::Equal,
        }
    }

    fn modifier(&self, pattern: &str) -> Modifier {
        let mut modifier = self.modifiers.get(pattern).copied().unwrap_or_default();
        if pattern == LOCATION_PATH && modifier.comparison == Comparison::Default {
            modifier.comparison = Comparison::Location;
        }
        modifier
    }

    fn changed(&mut self, path: &str, pattern: &str, reason: String) {
        let updatable = self.modifier(pattern).updatable;
        self.found.push(Difference {
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            reason,
            updatable,
        });
    }

    /// `path` is the display path, `pattern` the wildcard path used for modifiers
    fn visit(&mut self, desired: &Value, observed: &Value, path: &str, pattern: &str) {
        if self.done() || desired.is_null() {
            return;
        }
        if self.modifier(pattern).comparison == Comparison::Ignore {
            return;
        }

        match (desired, observed) {
            (Value::Object(want), Value::Object(have)) => {
                for (key, value) in want {
                    let child = have.get(key).unwrap_or(&Value::Null);
                    self.visit(
                        value,
                        child,
                        &format!("{path}/{key}"),
                        &format!("{pattern}/{key}"),
                    );
                    if self.done() {
                        return;
                    }
                }
            }
            (Value::Object(_), other) => {
                self.changed(path, pattern, format!("expected a mapping, found {}", type_name(other)));
            }
            (Value::Array(want), Value::Array(have)) => {
                if want.len() != have.len() {
                    self.changed(
                        path,
                        pattern,
                        format!("list length differs: {} != {}", want.len(), have.len()),
                    );
                    return;
                }
                self.visit_list(want, have, path, pattern);
            }
            (Value::Array(_), other) => {
                self.changed(path, pattern, format!("expected a list, found {}", type_name(other)));
            }
            (_, Value::Object(_) | Value::Array(_)) => {
                self.changed(
                    path,
                    pattern,
                    format!("expected a scalar, found {}", type_name(observed)),
                );
            }
            _ => {
                let comparison = self.modifier(pattern).comparison;
                if !scalars_equal(desired, observed, comparison) {
                    self.changed(
                        path,
                        pattern,
                        format!("{} != {}", render(desired), render(observed)),
                    );
                }
            }
        }
    }

    fn visit_list(&mut self, want: &[Value], have: &[Value], path: &str, pattern: &str) {
        let element_pattern = format!("{pattern}/*");

        if let Some(key) = identity_key(want) {
            let mut want: Vec<&Value> = want.iter().collect();
            let mut have: Vec<&Value> = have.iter().collect();
            let comparison = self.modifier(&format!("{element_pattern}/{key}")).comparison;
            let by_key = |a: &&Value, b: &&Value| {
                cmp_under(
                    a.get(key).unwrap_or(&Value::Null),
                    b.get(key).unwrap_or(&Value::Null),
                    comparison,
                )
            };
            want.sort_by(by_key);
            have.sort_by(by_key);

            for (i, (w, h)) in want.iter().zip(&have).enumerate() {
                let label = match w.get(key) {
                    Some(Value::String(s)) => format!("[{key}={s}]"),
                    _ => i.to_string(),
                };
                self.visit(w, h, &format!("{path}/{label}"), &element_pattern);
                if self.done() {
                    return;
                }
            }
        } else {
            let mut want: Vec<&Value> = want.iter().collect();
            let mut have: Vec<&Value> = have.iter().collect();
            let comparison = self.modifier(&element_pattern).comparison;
            want.sort_by(|a, b| cmp_under(a, b, comparison));
            have.sort_by(|a, b| cmp_under(a, b, comparison));

            for (i, (w, h)) in want.iter().zip(&have).enumerate() {
                self.visit(w, h, &format!("{path}/{i}"), &element_pattern);
                if self.done() {
                    return;
                }
            }
        }
    }
}

/// Sort key for a list of mappings: `id`, then `name`, then the first key
/// of the first element. `None` when the list does not hold mappings.
fn identity_key(items: &[Value]) -> Option<&str> {
    let first = items.first()?.as_object()?;
    if first.contains_key("id") {
        Some("id")
    } else if first.contains_key("name") {
        Some("name")
    } else {
        first.keys().next().map(String::as_str)
    }
}

fn scalars_equal(desired: &Value, observed: &Value, comparison: Comparison) -> bool {
    match (desired, observed) {
        (Value::String(a), Value::String(b)) => match comparison {
            Comparison::Ignore => true,
            Comparison::Location => squash(a) == squash(b),
            Comparison::CaseInsensitive => a.to_lowercase() == b.to_lowercase(),
            Comparison::Default => a == b || same_instant(a, b),
        },
        (Value::Number(a), Value::Number(b)) => {
            a == b || matches!((a.as_f64(), b.as_f64()), (Some(x), Some(y)) if x == y)
        }
        _ => desired == observed,
    }
}

/// Sort order consistent with `scalars_equal`: values equal under
/// `comparison` sort next to each other on both sides.
fn cmp_under(a: &Value, b: &Value, comparison: Comparison) -> Ordering {
    match (a, b, comparison) {
        (Value::String(x), Value::String(y), Comparison::CaseInsensitive) => {
            x.to_lowercase().cmp(&y.to_lowercase())
        }
        (Value::String(x), Value::String(y), Comparison::Location) => squash(x).cmp(&squash(y)),
        _ => cmp_values(a, b),
    }
}

fn squash(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn same_instant(a: &str, b: &str) -> bool {
    match (DateTime::parse_from_rfc3339(a), DateTime::parse_from_rfc3339(b)) {
        (Ok(x), Ok(y)) => x == y,
        _ => false,
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values, used to sort lists before comparing them.
pub fn cmp_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y)
            .map(|(p, q)| cmp_values(p, q))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(_), Value::Object(_)) => a.to_string().cmp(&b.to_string()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// A diff between desired and observed state of one resource
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDiff {
    /// Full resource identifier
    pub resource_id: String,
    /// Resource kind (e.g. "Event Hub")
    pub resource_kind: String,
    /// Action the driver selected
    pub action: Action,
    /// Normalized desired document (absent for `state: absent`)
    pub desired: Option<Value>,
    /// Observed document (absent when the resource does not exist)
    pub observed: Option<Value>,
    /// Every difference found
    pub differences: Vec<Difference>,
}

impl ResourceDiff {
    /// Check if this diff represents an addition
    pub fn is_addition(&self) -> bool {
        self.action == Action::Create
    }

    /// Check if this diff represents a removal
    pub fn is_removal(&self) -> bool {
        self.action == Action::Delete
    }

    /// Check if this diff represents a modification
    pub fn is_modification(&self) -> bool {
        self.action == Action::Update
    }

    pub fn has_changes(&self) -> bool {
        self.action.is_change()
    }
}
