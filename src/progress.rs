//! Terminal progress for reconciliation runs

use crate::ui;
use declarative::{Action, OperationKind, Outcome, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner shown while the driver waits on Azure
pub struct Spinner {
    bar: Option<ProgressBar>,
    quiet: bool,
}

impl Spinner {
    pub fn new(quiet: bool) -> Self {
        Self { bar: None, quiet }
    }

    fn bar(&mut self) -> &ProgressBar {
        self.bar.get_or_insert_with(|| {
            let bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner:.cyan} {msg}") {
                bar.set_style(style);
            }
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        })
    }

    fn clear(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl ProgressCallback for Spinner {
    fn on_action(&mut self, id: &str, action: Action) {
        log::debug!("{id}: {action}");
    }

    fn on_wait(&mut self, id: &str, operation: OperationKind, waited: Duration) {
        if self.quiet {
            return;
        }
        let what = match operation {
            OperationKind::Delete => "waiting for delete of",
            _ => "waiting on",
        };
        let message = format!("{what} {id} ({})", ui::format_wait(waited));
        self.bar().set_message(message);
    }

    fn on_complete(&mut self, _id: &str, _outcome: &Outcome) {
        self.clear();
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.clear();
    }
}
