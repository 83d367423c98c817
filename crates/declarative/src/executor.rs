//! Reconciliation driver - GET, decide, mutate, wait
//!
//! One invocation reconciles one resource, sequentially: a GET strictly
//! precedes any mutation, and a DELETE is followed by GETs until the
//! resource is gone.

use crate::client::{ClientError, Operation, ResourceClient, Target, WriteOptions};
use crate::context::ApplyContext;
use crate::diff::ResourceDiff;
use crate::error::{Error, Failure};
use crate::lro::{self, LroError};
use crate::planner::{self, Decision};
use crate::resource::{ModuleDefinition, Request, UpdateStyle, overlay};
use crate::retry::{LogCallback, with_retry};
use crate::types::{Action, ExecuteOptions, OperationKind, Outcome, ResourceState};
use serde_json::{Map, Value};
use std::time::Duration;

/// Everything known after the GET and the decision
struct Prepared {
    target: Target,
    desired: Value,
    observed: ResourceState,
    decision: Decision,
}

/// Reconcile one resource towards the requested state.
///
/// On failure, [`Failure::changed`] tells whether the upstream had already
/// acknowledged a mutation.
pub fn reconcile(
    module: &ModuleDefinition,
    request: &Request,
    client: &dyn ResourceClient,
    options: &ExecuteOptions,
    ctx: &mut ApplyContext<'_>,
) -> Result<Outcome, Failure> {
    let prepared = prepare(module, request, client, options, ctx)?;
    let Prepared {
        target,
        desired,
        observed,
        decision,
    } = prepared;

    ctx.progress.on_action(&target.id, decision.action);

    if decision.action == Action::Update
        && let Some(blocking) = decision.blocking_difference()
    {
        return Err(Failure::unchanged(Error::NotUpdatable {
            kind: target.kind.clone(),
            id: target.id.clone(),
            path: blocking.path.clone(),
            reason: blocking.reason.clone(),
        }));
    }

    let write = WriteOptions {
        if_match: request.etag.clone(),
    };

    let outcome = if options.check_mode {
        log::debug!("check mode: {} {} would {}", target.kind, target.id, decision.action);
        let representation = match decision.action {
            Action::Noop | Action::Update => observed.document(),
            Action::Create | Action::Delete => None,
        };
        finish(module, request, &target, &decision, true, decision.action.is_change(), representation)
    } else {
        match decision.action {
            Action::Noop => finish(module, request, &target, &decision, false, false, observed.document()),
            Action::Create => {
                let final_doc = mutate(&target, OperationKind::Create, options, ctx, || {
                    client.create(&target, &desired, &write)
                })?
                .unwrap_or_else(|| desired.clone());
                finish(module, request, &target, &decision, false, true, Some(&final_doc))
            }
            Action::Update => {
                let current = observed.document().cloned().unwrap_or_default();
                let body = module.update_body(&desired, &current);
                let returned = mutate(&target, OperationKind::Update, options, ctx, || {
                    match module.update_style {
                        UpdateStyle::Put => client.update(&target, &body, &write),
                        UpdateStyle::Patch => client.patch(&target, &body, &write),
                    }
                })?;
                // A representation identical to the pre-call one means the
                // server treated the request as a no-op.
                let changed = returned.as_ref() != Some(&current);
                if !changed {
                    log::info!("{} {} unchanged by update", target.kind, target.id);
                }
                let final_doc = match returned {
                    Some(doc) => doc,
                    None => after_update(&target, client, options, ctx, current, &body)?,
                };
                finish(module, request, &target, &decision, false, changed, Some(&final_doc))
            }
            Action::Delete => {
                mutate(&target, OperationKind::Delete, options, ctx, || {
                    client.delete(&target, &write)
                })?;
                wait_until_absent(&target, client, options, ctx)?;
                finish(module, request, &target, &decision, false, true, None)
            }
        }
    };

    ctx.progress.on_complete(&target.id, &outcome);
    Ok(outcome)
}

/// GET the resource and decide the action without mutating anything.
pub fn plan(
    module: &ModuleDefinition,
    request: &Request,
    client: &dyn ResourceClient,
    options: &ExecuteOptions,
    ctx: &mut ApplyContext<'_>,
) -> Result<ResourceDiff, Failure> {
    let prepared = prepare(module, request, client, options, ctx)?;
    Ok(ResourceDiff {
        resource_id: prepared.target.id,
        resource_kind: prepared.target.kind,
        action: prepared.decision.action,
        desired: request.state.is_present().then_some(prepared.desired),
        observed: prepared.observed.document().cloned(),
        differences: prepared.decision.differences,
    })
}

fn prepare(
    module: &ModuleDefinition,
    request: &Request,
    client: &dyn ResourceClient,
    options: &ExecuteOptions,
    ctx: &mut ApplyContext<'_>,
) -> Result<Prepared, Failure> {
    let id = module.resource_id(request)?;
    let target = Target::new(&module.kind, id, &module.api_version);

    // Normalize before any SDK call so bad input never reaches the API
    let desired = if request.state.is_present() {
        module.desired_document(request)?
    } else {
        Value::Null
    };

    let observed = read(&target, client, options, ctx).map_err(Failure::unchanged)?;
    log::debug!(
        "{} {} is {}",
        target.kind,
        target.id,
        if observed.is_present() { "present" } else { "absent" }
    );

    let decision = planner::decide(request.state, &observed, &desired, &module.modifiers);
    if let Some(difference) = decision.first_difference() {
        log::debug!("{} {}: {}", target.kind, target.id, difference);
    }

    Ok(Prepared {
        target,
        desired,
        observed,
        decision,
    })
}

/// GET with retries; the not-found sentinel means absent
fn read(
    target: &Target,
    client: &dyn ResourceClient,
    options: &ExecuteOptions,
    ctx: &ApplyContext<'_>,
) -> Result<ResourceState, Error> {
    check_cancel(target, OperationKind::Read, ctx)?;
    let what = format!("get {target}");
    let callback = LogCallback { what: &what };
    match with_retry(&options.retry, ctx.clock, Some(&callback), || client.get(target)) {
        Ok(document) => Ok(ResourceState::Present(document)),
        Err(ClientError::NotFound) => Ok(ResourceState::Absent),
        Err(e) => Err(upstream(target, OperationKind::Read, &e)),
    }
}

/// Representation after an update that returned none: read it back, or
/// assume the body was applied when the read finds nothing.
fn after_update(
    target: &Target,
    client: &dyn ResourceClient,
    options: &ExecuteOptions,
    ctx: &ApplyContext<'_>,
    mut current: Value,
    body: &Value,
) -> Result<Value, Failure> {
    match read(target, client, options, ctx).map_err(Failure::after_change)? {
        ResourceState::Present(doc) => Ok(doc),
        ResourceState::Absent => {
            overlay(&mut current, body);
            Ok(current)
        }
    }
}

/// Submit a mutation and resolve its long-running operation.
///
/// Submission failures leave `changed` false; once the upstream has
/// accepted the call every later failure reports `changed` true.
fn mutate(
    target: &Target,
    operation: OperationKind,
    options: &ExecuteOptions,
    ctx: &mut ApplyContext<'_>,
    call: impl FnMut() -> Result<Operation, ClientError>,
) -> Result<Option<Value>, Failure> {
    check_cancel(target, operation, ctx).map_err(Failure::unchanged)?;

    log::info!("{operation} {target}");
    let what = format!("{operation} {target}");
    let callback = LogCallback { what: &what };
    let pending = with_retry(&options.retry, ctx.clock, Some(&callback), call)
        .map_err(|e| Failure::unchanged(upstream(target, operation, &e)))?;

    let clock = ctx.clock;
    let cancel = ctx.cancel.clone();
    let progress = &mut *ctx.progress;
    lro::resolve(
        pending,
        options.operation_timeout,
        clock,
        &options.retry,
        &cancel,
        |waited| progress.on_wait(&target.id, operation, waited),
    )
    .map_err(|e| Failure::after_change(lro_error(target, operation, e)))
}

/// GET until the resource is gone or the delete budget runs out
fn wait_until_absent(
    target: &Target,
    client: &dyn ResourceClient,
    options: &ExecuteOptions,
    ctx: &mut ApplyContext<'_>,
) -> Result<(), Failure> {
    let start = ctx.clock.elapsed();
    loop {
        let state = read(target, client, options, ctx).map_err(Failure::after_change)?;
        if state.is_absent() {
            return Ok(());
        }

        let waited = ctx.clock.elapsed().saturating_sub(start);
        if waited >= options.delete_timeout {
            return Err(Failure::after_change(Error::OperationTimeout {
                operation: OperationKind::Delete,
                kind: target.kind.clone(),
                id: target.id.clone(),
                waited,
            }));
        }

        log::warn!("{target} still present after delete, waited {}s", waited.as_secs());
        ctx.progress.on_wait(&target.id, OperationKind::Delete, waited);
        let remaining = options.delete_timeout - waited;
        ctx.clock
            .sleep(options.delete_poll_interval.max(Duration::from_millis(1)).min(remaining));
    }
}

fn finish(
    module: &ModuleDefinition,
    request: &Request,
    target: &Target,
    decision: &Decision,
    check_mode: bool,
    changed: bool,
    representation: Option<&Value>,
) -> Outcome {
    let (id, outputs) = if request.state.is_present() {
        let id = representation
            .and_then(|doc| doc.get("id"))
            .and_then(Value::as_str)
            .unwrap_or(&target.id)
            .to_string();
        let outputs = representation
            .map(|doc| module.select_outputs(doc))
            .unwrap_or_default();
        (Some(id), outputs)
    } else {
        (None, Map::new())
    };

    Outcome {
        changed,
        action: decision.action,
        check_mode,
        id,
        outputs,
        diff: decision.first_difference().cloned(),
    }
}

fn check_cancel(target: &Target, operation: OperationKind, ctx: &ApplyContext<'_>) -> Result<(), Error> {
    if ctx.cancel.is_cancelled() {
        return Err(Error::Cancelled {
            operation,
            kind: target.kind.clone(),
            id: target.id.clone(),
        });
    }
    Ok(())
}

fn upstream(target: &Target, operation: OperationKind, error: &ClientError) -> Error {
    Error::Upstream {
        operation,
        kind: target.kind.clone(),
        id: target.id.clone(),
        message: error.to_string(),
    }
}

fn lro_error(target: &Target, operation: OperationKind, error: LroError) -> Error {
    match error {
        LroError::Timeout(waited) => Error::OperationTimeout {
            operation,
            kind: target.kind.clone(),
            id: target.id.clone(),
            waited,
        },
        LroError::Cancelled => Error::Cancelled {
            operation,
            kind: target.kind.clone(),
            id: target.id.clone(),
        },
        LroError::Failed(message) => Error::Upstream {
            operation,
            kind: target.kind.clone(),
            id: target.id.clone(),
            message,
        },
        LroError::Client(e) => upstream(target, operation, &e),
    }
}
