//! `armsync apply` - make remote resources match the documents

use anyhow::{Result, bail};
use armkit::Catalog;
use chrono::Local;
use colored::Colorize;
use declarative::{
    ApplyContext, CancelFlag, ExecuteOptions, ExecuteSummary, Failure, NoProgress, Outcome, ResourceClient,
    SystemClock, plan, reconcile,
};
use serde_json::{Value, json};
use std::time::Duration;

use super::Prepared;
use crate::Context;
use crate::cli::ApplyArgs;
use crate::config::Settings;
use crate::progress::Spinner;
use crate::{signal, ui};

pub fn run(ctx: &Context, settings: &Settings, args: ApplyArgs) -> Result<()> {
    let catalog = Catalog::builtin()?;
    let prepared = super::prepare(&catalog, &args.files, &settings.defaults())?;
    let client = super::connect(settings)?;

    let mut options = settings.execute_options(args.check);
    if let Some(secs) = args.timeout {
        options.operation_timeout = Duration::from_secs(secs);
        options.delete_timeout = Duration::from_secs(secs);
    }

    let cancel = CancelFlag::new();
    signal::install(&cancel);

    if !args.check && !args.yes && !args.json {
        let pending = preview(&prepared, &client, &options, &cancel)?;
        if pending == 0 {
            ui::success("No changes needed");
            return Ok(());
        }
        if !confirm_proceed(pending)? {
            println!();
            println!("  {} Aborted", "✗".red());
            return Ok(());
        }
    }

    if !args.json && !ctx.quiet {
        ui::header(&format!(
            "{} {} resources ({})",
            if args.check { "Checking" } else { "Applying" },
            prepared.len(),
            Local::now().format("%H:%M:%S")
        ));
    }

    let summary = execute(ctx, &prepared, &client, &options, &cancel, args.json);

    if !args.json {
        ui::summary(&summary, args.check);
    }
    if !summary.is_success() {
        bail!("{} of {} resources failed", summary.failed, summary.total());
    }
    Ok(())
}

/// Reconcile each resource in order. Stops early once cancelled.
pub fn execute(
    ctx: &Context,
    prepared: &[Prepared<'_>],
    client: &dyn ResourceClient,
    options: &ExecuteOptions,
    cancel: &CancelFlag,
    json: bool,
) -> ExecuteSummary {
    let clock = SystemClock::new();
    let mut summary = ExecuteSummary::default();

    for item in prepared {
        let mut spinner = Spinner::new(ctx.quiet || json);
        let mut apply_ctx = ApplyContext::new(&clock, &mut spinner).with_cancel(cancel.clone());
        let result = reconcile(item.module, &item.request, client, options, &mut apply_ctx);
        drop(spinner);

        match &result {
            Ok(outcome) => summary.add_outcome(outcome),
            Err(_) => summary.add_failure(),
        }
        if json {
            println!("{}", result_json(&result));
        } else {
            report(ctx, item, &result);
        }

        if cancel.is_cancelled() {
            ui::warn("Interrupted - remaining resources were not processed");
            break;
        }
    }
    summary
}

/// Plan every resource and print what would change. Returns the number of changes.
fn preview(
    prepared: &[Prepared<'_>],
    client: &dyn ResourceClient,
    options: &ExecuteOptions,
    cancel: &CancelFlag,
) -> Result<usize> {
    let clock = SystemClock::new();
    let mut pending = 0;

    ui::header("Planned changes");
    for item in prepared {
        let mut progress = NoProgress;
        let mut apply_ctx = ApplyContext::new(&clock, &mut progress).with_cancel(cancel.clone());
        let diff = plan(item.module, &item.request, client, options, &mut apply_ctx)
            .map_err(|failure| anyhow::anyhow!("{}: {}", item.document.location, failure.error))?;

        if diff.has_changes() {
            pending += 1;
        }
        println!(
            "  {} {} {}",
            ui::action_symbol(diff.action),
            diff.resource_kind.bold(),
            diff.resource_id.dimmed()
        );
        for difference in diff.differences.iter().take(5) {
            ui::dim(&format!("  {difference}"));
        }
    }
    Ok(pending)
}

fn confirm_proceed(pending: usize) -> Result<bool> {
    use dialoguer::Confirm;

    println!();
    let confirmed = Confirm::new()
        .with_prompt(format!("Apply {pending} changes?"))
        .default(false)
        .interact()?;

    Ok(confirmed)
}

fn report(ctx: &Context, item: &Prepared<'_>, result: &Result<Outcome, Failure>) {
    let id = item
        .module
        .resource_id(&item.request)
        .unwrap_or_else(|_| item.document.location.clone());

    match result {
        Ok(outcome) => {
            let status = if outcome.changed {
                outcome.action.to_string().yellow()
            } else {
                "ok".green()
            };
            println!("  {} {} {}", ui::action_symbol(outcome.action), status, id);
            if let Some(diff) = &outcome.diff
                && ctx.verbose > 0
            {
                ui::dim(&format!("  {diff}"));
            }
            if ctx.verbose > 0 {
                for (key, value) in &outcome.outputs {
                    ui::kv(key, &value.to_string());
                }
            }
        }
        Err(failure) => {
            ui::error(&format!("{}: {}", item.document.location, failure.error));
            if failure.changed {
                ui::warn("The resource was modified before the failure");
            }
            ui::dim(failure.error.category().advice());
        }
    }
}

/// Operator-facing result object
fn result_json(result: &Result<Outcome, Failure>) -> Value {
    match result {
        Ok(outcome) => outcome.to_json(),
        Err(failure) => json!({
            "changed": failure.changed,
            "failed": true,
            "msg": failure.error.to_string(),
        }),
    }
}
