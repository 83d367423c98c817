//! End-to-end reconciliation against the in-memory ARM backend.

use armkit::{CallKind, Catalog, MockBackend};
use declarative::{
    Action, ApplyContext, CancelFlag, ClientError, Error, ExecuteOptions, Failure, Fragments, ManualClock,
    NoProgress, Outcome, plan, reconcile,
};
use serde_json::{Value, json};
use std::time::Duration;

const EVENTHUB_ID: &str =
    "/subscriptions/sub1/resourceGroups/rg1/providers/Microsoft.EventHub/namespaces/ns1/eventhubs/eh1";
const STORAGE_ID: &str = "/subscriptions/sub1/resourceGroups/rg1/providers/Microsoft.Storage/storageAccounts/acct1";

fn defaults() -> Fragments {
    Fragments::from([("subscription_id".to_string(), "sub1".to_string())])
}

fn eventhub_input() -> Value {
    json!({
        "state": "present",
        "resource_group": "rg1",
        "namespace_name": "ns1",
        "name": "eh1",
        "message_retention_in_days": 3,
        "partition_count": 4,
        "status": "active"
    })
}

/// Paths the metric alert API echoes back lowercased
const METRIC_ALERT_LOWERCASED: &[&str] = &["/scopes/*", "/actions/*/actionGroupId"];

fn metric_alert_input() -> Value {
    json!({
        "resource_group": "rg1",
        "name": "cpu-high",
        "location": "global",
        "severity": 2,
        "scopes": [
            "/subscriptions/sub1/resourceGroups/rg1/providers/Microsoft.Compute/virtualMachines/Zeta",
            "/subscriptions/sub1/resourceGroups/rg1/providers/Microsoft.Compute/virtualMachines/alpha"
        ],
        "evaluation_frequency": "pt1m",
        "window_size": "pt5m",
        "criteria": {
            "odata_type": "single_resource_multiple_metric_criteria",
            "all_of": [{
                "name": "cpu",
                "metric_name": "Percentage CPU",
                "operator": "greater_than",
                "threshold": 90,
                "time_aggregation": "average",
                "criterion_type": "static_threshold_criterion"
            }]
        },
        "actions": [{"action_group_id": "Zeta-Oncall"}, {"action_group_id": "alpha-ops"}]
    })
}

fn with_args(mut input: Value, args: &Value) -> Value {
    if let (Value::Object(map), Value::Object(extra)) = (&mut input, args) {
        for (key, value) in extra {
            map.insert(key.clone(), value.clone());
        }
    }
    input
}

fn run_with(
    module: &str,
    input: &Value,
    backend: &MockBackend,
    clock: &ManualClock,
    options: &ExecuteOptions,
) -> Result<Outcome, Failure> {
    let catalog = Catalog::builtin().unwrap();
    let module = catalog.get(module).unwrap();
    let request = module.parse_request(input, &defaults())?;
    let mut progress = NoProgress;
    let mut ctx = ApplyContext::new(clock, &mut progress);
    reconcile(module, &request, backend, options, &mut ctx)
}

fn run(module: &str, input: &Value, backend: &MockBackend) -> Outcome {
    run_with(module, input, backend, &ManualClock::new(), &ExecuteOptions::default()).unwrap()
}

#[test]
fn test_create_on_empty_backend() {
    let backend = MockBackend::new();
    let outcome = run("eventhub", &eventhub_input(), &backend);

    assert_eq!(backend.count(CallKind::Get), 1);
    assert_eq!(backend.count(CallKind::Create), 1);
    assert_eq!(backend.mutations(), 1);

    let create = backend.calls().into_iter().find(|c| c.kind == CallKind::Create).unwrap();
    assert_eq!(
        create.body,
        Some(json!({"messageRetentionInDays": 3, "partitionCount": 4, "status": "Active"}))
    );
    assert_eq!(outcome.action, Action::Create);
    assert_eq!(
        outcome.to_json(),
        json!({"changed": true, "id": EVENTHUB_ID, "status": "Active"})
    );
}

#[test]
fn test_noop_when_resource_matches() {
    let backend = MockBackend::new();
    backend.insert(
        EVENTHUB_ID,
        &json!({"messageRetentionInDays": 3, "partitionCount": 4, "status": "Active"}),
    );

    let outcome = run("eventhub", &eventhub_input(), &backend);

    assert_eq!(backend.count(CallKind::Get), 1);
    assert_eq!(backend.mutations(), 0);
    assert_eq!(outcome.action, Action::Noop);
    assert_eq!(
        outcome.to_json(),
        json!({"changed": false, "id": EVENTHUB_ID, "status": "Active"})
    );
}

#[test]
fn test_update_by_scalar() {
    let backend = MockBackend::new();
    run("eventhub", &eventhub_input(), &backend);
    backend.clear_calls();

    let input = with_args(eventhub_input(), &json!({"partition_count": 8}));
    let outcome = run("eventhub", &input, &backend);

    assert_eq!(outcome.action, Action::Update);
    assert!(outcome.changed);
    assert_eq!(outcome.diff.as_ref().map(|d| d.path.as_str()), Some("/partitionCount"));
    assert_eq!(backend.count(CallKind::Update), 1);

    let calls = backend.calls();
    assert_eq!(calls[0].kind, CallKind::Get);
    assert_eq!(calls[1].kind, CallKind::Update);
    assert_eq!(backend.resource(EVENTHUB_ID).unwrap()["partitionCount"], json!(8));
}

#[test]
fn test_update_body_omits_read_only_fields() {
    let backend = MockBackend::new();
    run("eventhub", &eventhub_input(), &backend);
    backend.clear_calls();

    let input = with_args(eventhub_input(), &json!({"status": "disabled"}));
    run("eventhub", &input, &backend);

    let update = backend.calls().into_iter().find(|c| c.kind == CallKind::Update).unwrap();
    let body = update.body.unwrap();
    assert_eq!(body["status"], json!("Disabled"));
    assert_eq!(body["partitionCount"], json!(4));
    for field in ["id", "name", "type", "etag", "provisioningState"] {
        assert!(body.get(field).is_none(), "{field} sent on update");
    }
}

#[test]
fn test_enum_values_are_camelized() {
    let backend = MockBackend::new();
    let input = with_args(eventhub_input(), &json!({"status": "send_disabled"}));
    let outcome = run("eventhub", &input, &backend);

    let create = backend.calls().into_iter().find(|c| c.kind == CallKind::Create).unwrap();
    assert_eq!(create.body.unwrap()["status"], json!("SendDisabled"));
    assert_eq!(outcome.outputs["status"], json!("SendDisabled"));
}

#[test]
fn test_location_casing_is_equal() {
    let backend = MockBackend::new();
    backend.insert(
        STORAGE_ID,
        &json!({"location": "East US", "sku": {"name": "Standard_LRS"}, "accessTier": "Hot"}),
    );

    let input = json!({
        "resource_group": "rg1",
        "name": "acct1",
        "location": "eastus",
        "account_type": "standard_lrs",
        "access_tier": "hot"
    });
    let outcome = run("storage_account", &input, &backend);

    assert_eq!(outcome.action, Action::Noop);
    assert!(!outcome.changed);
    assert_eq!(backend.mutations(), 0);
}

#[test]
fn test_delete_waits_for_lingering_resource() {
    let backend = MockBackend::new().with_lingering_deletes(3);
    backend.insert(EVENTHUB_ID, &json!({"status": "Active"}));
    let clock = ManualClock::new();

    let input = with_args(eventhub_input(), &json!({"state": "absent"}));
    let outcome = run_with("eventhub", &input, &backend, &clock, &ExecuteOptions::default()).unwrap();

    assert_eq!(outcome.action, Action::Delete);
    assert_eq!(outcome.to_json(), json!({"changed": true}));
    assert_eq!(backend.count(CallKind::Delete), 1);

    let calls = backend.calls();
    let delete_at = calls.iter().position(|c| c.kind == CallKind::Delete).unwrap();
    let gets_after = calls[delete_at..].iter().filter(|c| c.kind == CallKind::Get).count();
    assert_eq!(gets_after, 4);
    assert_eq!(backend.count(CallKind::Get), 5);
    assert!(backend.resource(EVENTHUB_ID).is_none());

    assert_eq!(clock.sleeps(), vec![Duration::from_secs(20); 3]);
}

#[test]
fn test_delete_wait_covers_every_lingering_read() {
    for lingering in [0, 1, 5] {
        let backend = MockBackend::new().with_lingering_deletes(lingering);
        backend.insert(EVENTHUB_ID, &json!({}));
        let clock = ManualClock::new();
        let options = ExecuteOptions::default();

        let input = with_args(eventhub_input(), &json!({"state": "absent"}));
        run_with("eventhub", &input, &backend, &clock, &options).unwrap();

        let waited: Duration = clock.sleeps().iter().sum();
        let expected = options.delete_poll_interval * u32::try_from(lingering).unwrap();
        assert!(waited >= expected, "{lingering}: waited {waited:?}");
    }
}

#[test]
fn test_delete_times_out() {
    let backend = MockBackend::new().with_lingering_deletes(100);
    backend.insert(EVENTHUB_ID, &json!({}));
    let options = ExecuteOptions {
        delete_timeout: Duration::from_secs(60),
        ..ExecuteOptions::default()
    };

    let input = with_args(eventhub_input(), &json!({"state": "absent"}));
    let failure = run_with("eventhub", &input, &backend, &ManualClock::new(), &options).unwrap_err();

    assert!(failure.changed);
    assert!(matches!(failure.error, Error::OperationTimeout { .. }));
}

#[test]
fn test_absent_resource_is_noop() {
    let backend = MockBackend::new();
    let input = with_args(eventhub_input(), &json!({"state": "absent"}));
    let outcome = run("eventhub", &input, &backend);

    assert_eq!(outcome.action, Action::Noop);
    assert_eq!(outcome.to_json(), json!({"changed": false}));
    assert_eq!(backend.mutations(), 0);
}

#[test]
fn test_second_run_is_idempotent() {
    let inputs = [
        ("eventhub", eventhub_input()),
        (
            "servicebus_queue",
            json!({"resource_group": "rg1", "namespace_name": "ns1", "name": "q1", "max_size_in_mb": 1024, "requires_session": true}),
        ),
        (
            "storage_account",
            json!({"resource_group": "rg1", "name": "acct1", "location": "westeurope", "account_type": "Standard_GRS", "https_only": true}),
        ),
        (
            "sql_database",
            json!({"resource_group": "rg1", "server_name": "srv", "name": "db", "create_mode": "default", "read_scale": true}),
        ),
        ("metric_alert", metric_alert_input()),
        (
            "apim_api",
            json!({
                "resource_group": "rg1",
                "service_name": "gw",
                "api_id": "echo",
                "display_name": "Echo",
                "path": "echo",
                "protocols": ["https", "http"],
                "service_url": "https://Echo.example.com",
                "subscription_key_parameter_names": {"header": "X-Key", "query": "key"}
            }),
        ),
    ];

    for (module, input) in inputs {
        let backend = MockBackend::new().with_lowercased(METRIC_ALERT_LOWERCASED);
        let first = run(module, &input, &backend);
        let second = run(module, &input, &backend);
        assert!(first.changed, "{module}: first run");
        assert!(!second.changed, "{module}: second run {:?}", second.diff);
    }
}

#[test]
fn test_lowercased_echo_of_ids_is_not_a_change() {
    let backend = MockBackend::new().with_lowercased(METRIC_ALERT_LOWERCASED);
    let first = run("metric_alert", &metric_alert_input(), &backend);
    assert_eq!(first.action, Action::Create);

    let id = "/subscriptions/sub1/resourceGroups/rg1/providers/Microsoft.Insights/metricAlerts/cpu-high";
    let stored = backend.resource(id).unwrap();
    assert_eq!(
        stored["scopes"][0],
        json!("/subscriptions/sub1/resourcegroups/rg1/providers/microsoft.compute/virtualmachines/zeta")
    );

    let second = run("metric_alert", &metric_alert_input(), &backend);
    assert_eq!(second.action, Action::Noop, "{:?}", second.diff);
    assert_eq!(backend.mutations(), 1);
}

#[test]
fn test_unset_fields_never_cause_updates() {
    let backend = MockBackend::new();
    backend.insert(
        EVENTHUB_ID,
        &json!({
            "messageRetentionInDays": 3,
            "partitionCount": 4,
            "status": "Active",
            "captureDescription": {"enabled": false}
        }),
    );

    let input = json!({"resource_group": "rg1", "namespace_name": "ns1", "name": "eh1", "partition_count": 4});
    let outcome = run("eventhub", &input, &backend);
    assert!(!outcome.changed);
}

#[test]
fn test_check_mode_does_not_mutate() {
    let backend = MockBackend::new();
    let outcome = run_with(
        "eventhub",
        &eventhub_input(),
        &backend,
        &ManualClock::new(),
        &ExecuteOptions::check(),
    )
    .unwrap();

    assert!(outcome.changed);
    assert!(outcome.check_mode);
    assert_eq!(outcome.action, Action::Create);
    assert_eq!(backend.mutations(), 0);
    assert!(backend.is_empty());
}

#[test]
fn test_plan_reports_differences() {
    let backend = MockBackend::new();
    run("eventhub", &eventhub_input(), &backend);

    let catalog = Catalog::builtin().unwrap();
    let module = catalog.get("eventhub").unwrap();
    let input = with_args(eventhub_input(), &json!({"partition_count": 8, "status": "disabled"}));
    let request = module.parse_request(&input, &defaults()).unwrap();
    let clock = ManualClock::new();
    let mut progress = NoProgress;
    let mut ctx = ApplyContext::new(&clock, &mut progress);
    let diff = plan(module, &request, &backend, &ExecuteOptions::default(), &mut ctx).unwrap();

    assert!(diff.is_modification());
    let paths: Vec<_> = diff.differences.iter().map(|d| d.path.as_str()).collect();
    assert_eq!(paths, vec!["/partitionCount", "/status"]);
}

#[test]
fn test_immutable_field_blocks_update() {
    let backend = MockBackend::new();
    let input = json!({"resource_group": "rg1", "namespace_name": "ns1", "name": "q1", "requires_session": false});
    run("servicebus_queue", &input, &backend);
    backend.clear_calls();

    let input = with_args(input, &json!({"requires_session": true}));
    let failure = run_with("servicebus_queue", &input, &backend, &ManualClock::new(), &ExecuteOptions::default())
        .unwrap_err();

    assert!(!failure.changed);
    assert!(matches!(failure.error, Error::NotUpdatable { ref path, .. } if path == "/requiresSession"));
    assert_eq!(backend.mutations(), 0);
}

#[test]
fn test_storage_account_updates_with_patch() {
    let backend = MockBackend::new();
    let input = json!({"resource_group": "rg1", "name": "acct1", "location": "westeurope", "account_type": "Standard_LRS", "access_tier": "hot"});
    run("storage_account", &input, &backend);
    backend.clear_calls();

    let input = with_args(input, &json!({"access_tier": "cool"}));
    let outcome = run("storage_account", &input, &backend);

    assert!(outcome.changed);
    assert_eq!(backend.count(CallKind::Patch), 1);
    assert_eq!(backend.count(CallKind::Update), 0);
    let patch = backend.calls().into_iter().find(|c| c.kind == CallKind::Patch).unwrap();
    assert_eq!(patch.body.unwrap()["accessTier"], json!("Cool"));
}

#[test]
fn test_etag_is_forwarded() {
    let backend = MockBackend::new();
    let stored = backend.insert(EVENTHUB_ID, &json!({"partitionCount": 2}));
    let etag = stored["etag"].as_str().unwrap().to_string();

    let input = with_args(eventhub_input(), &json!({"etag": etag}));
    run("eventhub", &input, &backend);

    let update = backend.calls().into_iter().find(|c| c.kind == CallKind::Update).unwrap();
    assert_eq!(update.if_match.as_deref(), Some(etag.as_str()));
}

#[test]
fn test_stale_etag_fails_without_change() {
    let backend = MockBackend::new();
    backend.insert(EVENTHUB_ID, &json!({"partitionCount": 2}));

    let input = with_args(eventhub_input(), &json!({"etag": "W/\"stale\""}));
    let failure = run_with("eventhub", &input, &backend, &ManualClock::new(), &ExecuteOptions::default())
        .unwrap_err();

    assert!(!failure.changed);
    let message = failure.error.to_string();
    assert!(message.contains("Event Hub"), "{message}");
    assert!(message.contains(EVENTHUB_ID), "{message}");
}

#[test]
fn test_long_running_create_is_polled() {
    let backend = MockBackend::new().with_pending_polls(2);
    let clock = ManualClock::new();
    let outcome = run_with("eventhub", &eventhub_input(), &backend, &clock, &ExecuteOptions::default()).unwrap();

    assert!(outcome.changed);
    assert_eq!(outcome.outputs["status"], json!("Active"));
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(5); 2]);
}

#[test]
fn test_transient_get_failure_is_retried() {
    let backend = MockBackend::new();
    backend.fail_next(CallKind::Get, ClientError::api(503, "service unavailable"));
    let clock = ManualClock::new();

    let outcome = run_with("eventhub", &eventhub_input(), &backend, &clock, &ExecuteOptions::default()).unwrap();

    assert!(outcome.changed);
    assert_eq!(backend.count(CallKind::Get), 2);
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(1)]);
}

#[test]
fn test_upstream_error_is_surfaced() {
    let backend = MockBackend::new();
    backend.fail_next(CallKind::Get, ClientError::api(403, "forbidden"));

    let failure = run_with(
        "eventhub",
        &eventhub_input(),
        &backend,
        &ManualClock::new(),
        &ExecuteOptions::default(),
    )
    .unwrap_err();

    assert!(!failure.changed);
    assert!(matches!(failure.error, Error::Upstream { .. }));
    assert_eq!(backend.count(CallKind::Get), 1);
    assert_eq!(backend.mutations(), 0);
}

#[test]
fn test_bad_input_issues_no_calls() {
    let backend = MockBackend::new();
    let input = with_args(eventhub_input(), &json!({"status": "paused"}));

    let failure = run_with("eventhub", &input, &backend, &ManualClock::new(), &ExecuteOptions::default())
        .unwrap_err();

    assert!(matches!(failure.error, Error::BadInput { .. }));
    assert!(backend.calls().is_empty());
}

#[test]
fn test_cancelled_before_any_call() {
    let backend = MockBackend::new();
    let catalog = Catalog::builtin().unwrap();
    let module = catalog.get("eventhub").unwrap();
    let request = module.parse_request(&eventhub_input(), &defaults()).unwrap();

    let cancel = CancelFlag::new();
    cancel.cancel();
    let clock = ManualClock::new();
    let mut progress = NoProgress;
    let mut ctx = ApplyContext::new(&clock, &mut progress).with_cancel(cancel);

    let failure = reconcile(module, &request, &backend, &ExecuteOptions::default(), &mut ctx).unwrap_err();
    assert!(matches!(failure.error, Error::Cancelled { .. }));
    assert!(backend.calls().is_empty());
}
