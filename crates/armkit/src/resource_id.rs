//! ARM resource identifiers
//!
//! ```text
//! /subscriptions/{sub}/resourceGroups/{rg}/providers/{Namespace}/{type}/{name}[/{type}/{name}]...
//! ```

use crate::error::{Error, Result};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static RESOURCE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^/subscriptions/([^/]+)/resourceGroups/([^/]+)/providers/([^/]+)/(.+)$")
        .expect("Invalid resource id regex")
});

/// A parsed ARM resource identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    pub subscription_id: String,
    pub resource_group: String,
    /// Provider namespace, e.g. `Microsoft.EventHub`
    pub namespace: String,
    /// `(type, name)` pairs from the top-level resource down
    pub segments: Vec<(String, String)>,
}

impl ResourceId {
    pub fn parse(id: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidResourceId {
            id: id.to_string(),
            reason: reason.to_string(),
        };

        let caps = RESOURCE_ID
            .captures(id.trim_end_matches('/'))
            .ok_or_else(|| invalid("expected /subscriptions/../resourceGroups/../providers/.."))?;

        let parts: Vec<&str> = caps[4].split('/').collect();
        if parts.len() % 2 != 0 || parts.iter().any(|p| p.is_empty()) {
            return Err(invalid("type and name segments must come in pairs"));
        }

        Ok(Self {
            subscription_id: caps[1].to_string(),
            resource_group: caps[2].to_string(),
            namespace: caps[3].to_string(),
            segments: parts
                .chunks(2)
                .map(|pair| (pair[0].to_string(), pair[1].to_string()))
                .collect(),
        })
    }

    /// Name of the addressed (innermost) resource
    pub fn name(&self) -> &str {
        self.segments.last().map_or("", |(_, name)| name.as_str())
    }

    /// Full resource type, e.g. `Microsoft.EventHub/namespaces/eventhubs`
    pub fn resource_type(&self) -> String {
        let mut out = self.namespace.clone();
        for (kind, _) in &self.segments {
            out.push('/');
            out.push_str(kind);
        }
        out
    }

    /// Identifier of the enclosing resource, if this is a child resource
    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() < 2 {
            return None;
        }
        let mut parent = self.clone();
        parent.segments.pop();
        Some(parent)
    }
}

impl FromStr for ResourceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}/providers/{}",
            self.subscription_id, self.resource_group, self.namespace
        )?;
        for (kind, name) in &self.segments {
            write!(f, "/{kind}/{name}")?;
        }
        Ok(())
    }
}
