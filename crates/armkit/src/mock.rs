//! In-memory ARM backend for tests
//!
//! Stores wire documents (with the `properties` envelope) keyed by
//! case-insensitive resource id and records every call. It can simulate
//! long-running operations, deletes that linger for a few reads, ETag
//! preconditions, and injected failures.

use crate::model::{flatten, unflatten};
use crate::resource_id::ResourceId;
use declarative::resource::overlay;
use declarative::{
    ClientError, ClientResult, Operation, PollStatus, Poller, ResourceClient, Target, WriteOptions,
};
use serde_json::{Value, json};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Kind of call received by the mock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Get,
    Create,
    Update,
    CreateOrUpdate,
    Patch,
    Delete,
}

impl CallKind {
    /// Whether the call mutates state
    pub fn is_mutation(self) -> bool {
        !matches!(self, Self::Get)
    }
}

/// One recorded call
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub kind: CallKind,
    pub id: String,
    /// Body as received (SDK model view)
    pub body: Option<Value>,
    pub if_match: Option<String>,
}

#[derive(Default)]
struct State {
    resources: BTreeMap<String, Value>,
    /// Remaining reads that still see a deleted resource
    lingering: BTreeMap<String, usize>,
    linger_reads: usize,
    pending_polls: usize,
    /// Model paths (`/a/*/b`) whose string values are stored lowercased
    lowercased: Vec<String>,
    failures: VecDeque<(CallKind, ClientError)>,
    calls: Vec<CallRecord>,
    etag_counter: u64,
}

impl State {
    fn take_failure(&mut self, kind: CallKind) -> Option<ClientError> {
        let index = self.failures.iter().position(|(k, _)| *k == kind)?;
        self.failures.remove(index).map(|(_, e)| e)
    }

    fn check_etag(&self, key: &str, if_match: Option<&str>) -> ClientResult<()> {
        let Some(expected) = if_match else {
            return Ok(());
        };
        let current = self
            .resources
            .get(key)
            .and_then(|doc| doc.get("etag"))
            .and_then(Value::as_str);
        if expected == "*" || current == Some(expected) {
            Ok(())
        } else {
            Err(ClientError::Api {
                status: 412,
                code: Some("PreconditionFailed".to_string()),
                message: format!("etag {expected} does not match"),
            })
        }
    }

    fn next_etag(&mut self) -> String {
        self.etag_counter += 1;
        format!("W/\"{}\"", self.etag_counter)
    }

    /// Store a model document; the ETag only moves when the content does
    fn store(&mut self, id: &str, model: &Value) -> Value {
        let key = id.to_ascii_lowercase();
        let mut model = model.clone();
        for path in &self.lowercased {
            let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
            lowercase_at(&mut model, &segments);
        }
        let mut wire = stamp(id, unflatten(model));
        let previous = self.resources.get(&key).cloned();
        let unchanged = previous.as_ref().is_some_and(|prev| {
            let mut prev = prev.clone();
            if let Value::Object(map) = &mut prev {
                map.remove("etag");
            }
            prev == wire
        });
        let etag = match previous.as_ref().and_then(|p| p.get("etag")).and_then(Value::as_str) {
            Some(etag) if unchanged => etag.to_string(),
            _ => self.next_etag(),
        };
        wire["etag"] = json!(etag);
        self.resources.insert(key, wire.clone());
        flatten(wire)
    }
}

fn lowercase_at(value: &mut Value, segments: &[&str]) {
    let Some((head, rest)) = segments.split_first() else {
        if let Value::String(s) = value {
            *s = s.to_lowercase();
        }
        return;
    };
    match (value, *head) {
        (Value::Array(items), "*") => items.iter_mut().for_each(|item| lowercase_at(item, rest)),
        (Value::Object(map), key) => {
            if let Some(child) = map.get_mut(key) {
                lowercase_at(child, rest);
            }
        }
        _ => {}
    }
}

/// Add the read-only fields ARM reports on every resource
fn stamp(id: &str, mut wire: Value) -> Value {
    if !wire.is_object() {
        wire = json!({});
    }
    let (name, kind) = match ResourceId::parse(id) {
        Ok(parsed) => (parsed.name().to_string(), parsed.resource_type()),
        Err(_) => (id.rsplit('/').next().unwrap_or_default().to_string(), String::new()),
    };
    wire["id"] = json!(id);
    wire["name"] = json!(name);
    wire["type"] = json!(kind);
    if !wire.get("properties").is_some_and(Value::is_object) {
        wire["properties"] = json!({});
    }
    wire["properties"]["provisioningState"] = json!("Succeeded");
    wire
}

/// Simulated ARM backend.
///
/// Clones share state, so a test can keep a handle for assertions while the
/// driver owns another.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<State>>,
}

impl MockBackend {
    /// Create a new empty mock backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deleted resources stay visible for `reads` more GETs.
    #[must_use]
    pub fn with_lingering_deletes(self, reads: usize) -> Self {
        self.state().linger_reads = reads;
        self
    }

    /// Mutations report "in progress" `polls` times before finishing.
    #[must_use]
    pub fn with_pending_polls(self, polls: usize) -> Self {
        self.state().pending_polls = polls;
        self
    }

    /// Store string values at these model paths lowercased, the way ARM
    /// echoes back some resource ids.
    #[must_use]
    pub fn with_lowercased(self, paths: &[&str]) -> Self {
        self.state().lowercased = paths.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Seed a resource (SDK model view). Returns the stored representation.
    pub fn insert(&self, id: &str, model: &Value) -> Value {
        self.state().store(id, model)
    }

    /// Fail the next call of `kind` with `error`.
    pub fn fail_next(&self, kind: CallKind, error: ClientError) {
        self.state().failures.push_back((kind, error));
    }

    /// Current representation of a resource (SDK model view).
    pub fn resource(&self, id: &str) -> Option<Value> {
        self.state().resources.get(&id.to_ascii_lowercase()).cloned().map(flatten)
    }

    pub fn len(&self) -> usize {
        self.state().resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every call received so far
    pub fn calls(&self) -> Vec<CallRecord> {
        self.state().calls.clone()
    }

    /// Number of calls of `kind`
    pub fn count(&self, kind: CallKind) -> usize {
        self.state().calls.iter().filter(|c| c.kind == kind).count()
    }

    /// Number of mutating calls
    pub fn mutations(&self) -> usize {
        self.state().calls.iter().filter(|c| c.kind.is_mutation()).count()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    fn record(state: &mut State, kind: CallKind, target: &Target, body: Option<&Value>, options: Option<&WriteOptions>) {
        state.calls.push(CallRecord {
            kind,
            id: target.id.clone(),
            body: body.cloned(),
            if_match: options.and_then(|o| o.if_match.clone()),
        });
    }

    fn complete(pending_polls: usize, result: Option<Value>) -> Operation {
        if pending_polls == 0 {
            Operation::Completed(result)
        } else {
            Operation::Pending(Box::new(MockPoller {
                remaining: pending_polls,
                result,
            }))
        }
    }

    fn put(&self, kind: CallKind, target: &Target, body: &Value, options: &WriteOptions) -> ClientResult<Operation> {
        let mut state = self.state();
        Self::record(&mut state, kind, target, Some(body), Some(options));
        if let Some(e) = state.take_failure(kind) {
            return Err(e);
        }
        let key = target.id.to_ascii_lowercase();
        state.check_etag(&key, options.if_match.as_deref())?;
        state.lingering.remove(&key);
        let stored = state.store(&target.id, body);
        Ok(Self::complete(state.pending_polls, Some(stored)))
    }
}

impl ResourceClient for MockBackend {
    fn get(&self, target: &Target) -> ClientResult<Value> {
        let mut state = self.state();
        Self::record(&mut state, CallKind::Get, target, None, None);
        if let Some(e) = state.take_failure(CallKind::Get) {
            return Err(e);
        }

        let key = target.id.to_ascii_lowercase();
        if let Some(remaining) = state.lingering.get_mut(&key) {
            if *remaining == 0 {
                state.lingering.remove(&key);
                state.resources.remove(&key);
            } else {
                *remaining -= 1;
            }
        }
        state.resources.get(&key).cloned().map(flatten).ok_or(ClientError::NotFound)
    }

    fn create_or_update(&self, target: &Target, body: &Value, options: &WriteOptions) -> ClientResult<Operation> {
        self.put(CallKind::CreateOrUpdate, target, body, options)
    }

    fn create(&self, target: &Target, body: &Value, options: &WriteOptions) -> ClientResult<Operation> {
        self.put(CallKind::Create, target, body, options)
    }

    fn update(&self, target: &Target, body: &Value, options: &WriteOptions) -> ClientResult<Operation> {
        self.put(CallKind::Update, target, body, options)
    }

    fn patch(&self, target: &Target, body: &Value, options: &WriteOptions) -> ClientResult<Operation> {
        let mut state = self.state();
        Self::record(&mut state, CallKind::Patch, target, Some(body), Some(options));
        if let Some(e) = state.take_failure(CallKind::Patch) {
            return Err(e);
        }
        let key = target.id.to_ascii_lowercase();
        state.check_etag(&key, options.if_match.as_deref())?;
        let Some(current) = state.resources.get(&key).cloned() else {
            return Err(ClientError::NotFound);
        };
        let mut merged = flatten(current);
        overlay(&mut merged, body);
        let stored = state.store(&target.id, &merged);
        Ok(Self::complete(state.pending_polls, Some(stored)))
    }

    fn delete(&self, target: &Target, options: &WriteOptions) -> ClientResult<Operation> {
        let mut state = self.state();
        Self::record(&mut state, CallKind::Delete, target, None, Some(options));
        if let Some(e) = state.take_failure(CallKind::Delete) {
            return Err(e);
        }
        let key = target.id.to_ascii_lowercase();
        state.check_etag(&key, options.if_match.as_deref())?;
        if state.resources.contains_key(&key) {
            if state.linger_reads == 0 {
                state.resources.remove(&key);
            } else {
                let reads = state.linger_reads;
                state.lingering.insert(key, reads);
            }
        }
        Ok(Self::complete(state.pending_polls, None))
    }
}

/// Reports "in progress" a fixed number of times, then succeeds
struct MockPoller {
    remaining: usize,
    result: Option<Value>,
}

impl Poller for MockPoller {
    fn poll(&mut self) -> ClientResult<PollStatus> {
        if self.remaining == 0 {
            return Ok(PollStatus::Succeeded(self.result.take()));
        }
        self.remaining -= 1;
        Ok(PollStatus::InProgress)
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.ServiceBus/namespaces/ns/queues/q1";

    fn target() -> Target {
        Target::new("Queue", ID, "2021-11-01")
    }

    #[test]
    fn test_insert_and_get() {
        let mock = MockBackend::new();
        mock.insert(ID, &json!({"maxSizeInMegabytes": 1024}));
        let doc = mock.get(&target()).unwrap();
        assert_eq!(doc["id"], json!(ID));
        assert_eq!(doc["name"], json!("q1"));
        assert_eq!(doc["type"], json!("Microsoft.ServiceBus/namespaces/queues"));
        assert_eq!(doc["maxSizeInMegabytes"], json!(1024));
        assert_eq!(doc["provisioningState"], json!("Succeeded"));
        assert_eq!(mock.count(CallKind::Get), 1);
    }

    #[test]
    fn test_get_is_case_insensitive() {
        let mock = MockBackend::new();
        mock.insert(ID, &json!({}));
        let upper = Target::new("Queue", ID.to_uppercase(), "2021-11-01");
        assert!(mock.get(&upper).is_ok());
    }

    #[test]
    fn test_missing_resource_is_not_found() {
        let mock = MockBackend::new();
        assert_eq!(mock.get(&target()), Err(ClientError::NotFound));
    }

    #[test]
    fn test_etag_moves_only_on_change() {
        let mock = MockBackend::new();
        let first = mock.insert(ID, &json!({"status": "Active"}));
        let same = mock.insert(ID, &json!({"status": "Active"}));
        let changed = mock.insert(ID, &json!({"status": "Disabled"}));
        assert_eq!(first["etag"], same["etag"]);
        assert_ne!(first["etag"], changed["etag"]);
    }

    #[test]
    fn test_if_match_mismatch_is_rejected() {
        let mock = MockBackend::new();
        mock.insert(ID, &json!({}));
        let options = WriteOptions {
            if_match: Some("W/\"99\"".to_string()),
        };
        let err = mock.update(&target(), &json!({}), &options).unwrap_err();
        assert!(matches!(err, ClientError::Api { status: 412, .. }));
    }

    #[test]
    fn test_patch_merges() {
        let mock = MockBackend::new();
        mock.insert(ID, &json!({"maxSizeInMegabytes": 1024, "status": "Active"}));
        mock.patch(&target(), &json!({"status": "Disabled"}), &WriteOptions::default()).unwrap();
        let doc = mock.resource(ID).unwrap();
        assert_eq!(doc["maxSizeInMegabytes"], json!(1024));
        assert_eq!(doc["status"], json!("Disabled"));
    }

    #[test]
    fn test_lowercased_paths() {
        let mock = MockBackend::new().with_lowercased(&["/scopes/*", "/actions/*/actionGroupId"]);
        let stored = mock.insert(
            ID,
            &json!({
                "scopes": ["/A/Zeta", "/A/alpha"],
                "actions": [{"actionGroupId": "/X/Oncall", "webhookProperties": {"Key": "V"}}],
                "description": "Mixed Case"
            }),
        );
        assert_eq!(stored["scopes"], json!(["/a/zeta", "/a/alpha"]));
        assert_eq!(stored["actions"][0]["actionGroupId"], json!("/x/oncall"));
        assert_eq!(stored["actions"][0]["webhookProperties"], json!({"Key": "V"}));
        assert_eq!(stored["description"], json!("Mixed Case"));
    }

    #[test]
    fn test_lingering_delete() {
        let mock = MockBackend::new().with_lingering_deletes(2);
        mock.insert(ID, &json!({}));
        mock.delete(&target(), &WriteOptions::default()).unwrap();
        assert!(mock.get(&target()).is_ok());
        assert!(mock.get(&target()).is_ok());
        assert_eq!(mock.get(&target()), Err(ClientError::NotFound));
        assert!(mock.is_empty());
    }

    #[test]
    fn test_injected_failure_applies_once() {
        let mock = MockBackend::new();
        mock.fail_next(CallKind::Get, ClientError::api(503, "busy"));
        assert!(matches!(mock.get(&target()), Err(ClientError::Api { status: 503, .. })));
        assert_eq!(mock.get(&target()), Err(ClientError::NotFound));
    }

    #[test]
    fn test_pending_operations() {
        let mock = MockBackend::new().with_pending_polls(2);
        let Operation::Pending(mut poller) = mock.create(&target(), &json!({}), &WriteOptions::default()).unwrap()
        else {
            panic!("expected a pending operation");
        };
        assert_eq!(poller.poll().unwrap(), PollStatus::InProgress);
        assert_eq!(poller.poll().unwrap(), PollStatus::InProgress);
        assert!(matches!(poller.poll().unwrap(), PollStatus::Succeeded(Some(_))));
    }
}
