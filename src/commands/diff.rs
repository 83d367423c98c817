//! `armsync diff` - preview what apply would change

use anyhow::{Result, bail};
use armkit::Catalog;
use colored::Colorize;
use declarative::resource::overlay;
use declarative::{ApplyContext, CancelFlag, NoProgress, ResourceDiff, SystemClock, plan};
use serde_json::Value;
use similar::{ChangeTag, TextDiff};

use crate::Context;
use crate::cli::DiffArgs;
use crate::config::Settings;
use crate::{signal, ui};

pub fn run(ctx: &Context, settings: &Settings, args: DiffArgs) -> Result<()> {
    let catalog = Catalog::builtin()?;
    let prepared = super::prepare(&catalog, &args.files, &settings.defaults())?;
    let client = super::connect(settings)?;
    let options = settings.execute_options(true);

    let cancel = CancelFlag::new();
    signal::install(&cancel);
    let clock = SystemClock::new();

    let mut changes = 0;
    let mut failed = 0;
    for item in &prepared {
        let mut progress = NoProgress;
        let mut apply_ctx = ApplyContext::new(&clock, &mut progress).with_cancel(cancel.clone());
        match plan(item.module, &item.request, &client, &options, &mut apply_ctx) {
            Ok(diff) => {
                if diff.has_changes() {
                    changes += 1;
                }
                display(ctx, &diff);
            }
            Err(failure) => {
                failed += 1;
                ui::error(&format!("{}: {}", item.document.location, failure.error));
            }
        }
        if cancel.is_cancelled() {
            break;
        }
    }

    println!();
    if changes == 0 && failed == 0 {
        ui::success("No changes needed");
    } else {
        ui::info(&format!("{changes} of {} resources would change", prepared.len()));
    }
    if failed > 0 {
        bail!("{failed} resources could not be read");
    }
    Ok(())
}

fn display(ctx: &Context, diff: &ResourceDiff) {
    println!();
    println!(
        "{} {} {}",
        ui::action_symbol(diff.action),
        diff.resource_kind.bold(),
        diff.resource_id
    );
    if !diff.has_changes() {
        ui::dim("up to date");
        return;
    }

    for difference in &diff.differences {
        let marker = if difference.updatable { "" } else { " (requires replacement)" };
        ui::dim(&format!("{difference}{marker}"));
    }

    let (before, after) = render_pair(diff);
    let text = TextDiff::from_lines(&before, &after);
    for change in text.iter_all_changes() {
        match change.tag() {
            ChangeTag::Delete => print!("    {}", format!("- {change}").red()),
            ChangeTag::Insert => print!("    {}", format!("+ {change}").green()),
            ChangeTag::Equal if ctx.verbose > 0 => print!("      {}", change.to_string().dimmed()),
            ChangeTag::Equal => {}
        }
    }
}

/// Observed document and the document apply would leave behind
fn render_pair(diff: &ResourceDiff) -> (String, String) {
    let before = diff.observed.as_ref().map(pretty).unwrap_or_default();
    let after = match (&diff.observed, &diff.desired) {
        (_, None) => String::new(),
        (None, Some(desired)) => pretty(desired),
        (Some(observed), Some(desired)) => {
            let mut merged = observed.clone();
            overlay(&mut merged, desired);
            pretty(&merged)
        }
    };
    (before, after)
}

fn pretty(value: &Value) -> String {
    let mut text = serde_json::to_string_pretty(value).unwrap_or_default();
    text.push('\n');
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::Action;
    use serde_json::json;

    fn resource_diff(observed: Option<Value>, desired: Option<Value>) -> ResourceDiff {
        ResourceDiff {
            resource_id: "/subscriptions/s/resourceGroups/rg/providers/Microsoft.EventHub/namespaces/ns/eventhubs/eh".to_string(),
            resource_kind: "Event Hub".to_string(),
            action: Action::Update,
            desired,
            observed,
            differences: Vec::new(),
        }
    }

    #[test]
    fn test_render_pair_keeps_unset_fields() {
        let diff = resource_diff(
            Some(json!({"partitionCount": 4, "status": "Active"})),
            Some(json!({"partitionCount": 8})),
        );
        let (before, after) = render_pair(&diff);
        assert!(before.contains("\"partitionCount\": 4"));
        assert!(after.contains("\"partitionCount\": 8"));
        assert!(after.contains("\"status\": \"Active\""));
    }

    #[test]
    fn test_render_pair_for_delete() {
        let diff = resource_diff(Some(json!({"status": "Active"})), None);
        let (before, after) = render_pair(&diff);
        assert!(!before.is_empty());
        assert!(after.is_empty());
    }

    #[test]
    fn test_render_pair_for_create() {
        let diff = resource_diff(None, Some(json!({"status": "Active"})));
        let (before, after) = render_pair(&diff);
        assert!(before.is_empty());
        assert!(after.contains("Active"));
    }
}
