use colored::{ColoredString, Colorize};
use declarative::{Action, ExecuteSummary};
use std::time::Duration;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Diff-style symbol for an action
pub fn action_symbol(action: Action) -> ColoredString {
    match action {
        Action::Noop => "○".dimmed(),
        Action::Create => "+".green(),
        Action::Update => "~".yellow(),
        Action::Delete => "-".red(),
    }
}

/// Human-readable wait, e.g. `1m 20s`
pub fn format_wait(waited: Duration) -> String {
    let secs = waited.as_secs();
    if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}

/// Print final summary
pub fn summary(summary: &ExecuteSummary, check_mode: bool) {
    println!();
    if !summary.is_success() {
        println!("  {} Finished with errors", "⚠".yellow().bold());
    } else if check_mode {
        println!("  {} Check mode - no changes made", "ℹ".blue().bold());
    } else {
        println!("  {} All resources reconciled", "✓".green().bold());
    }

    let verb = if check_mode { "would be " } else { "" };
    if summary.created > 0 {
        println!("    • {} resources {verb}created", summary.created);
    }
    if summary.updated > 0 {
        println!("    • {} resources {verb}updated", summary.updated);
    }
    if summary.deleted > 0 {
        println!("    • {} resources {verb}deleted", summary.deleted);
    }
    if summary.no_change > 0 {
        println!("    • {} resources unchanged", summary.no_change);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_wait() {
        assert_eq!(format_wait(Duration::from_secs(0)), "0s");
        assert_eq!(format_wait(Duration::from_secs(59)), "59s");
        assert_eq!(format_wait(Duration::from_secs(80)), "1m 20s");
        assert_eq!(format_wait(Duration::from_secs(1200)), "20m 00s");
    }

    #[test]
    fn test_action_symbols_are_distinct() {
        let symbols: Vec<String> = [Action::Noop, Action::Create, Action::Update, Action::Delete]
            .into_iter()
            .map(|a| action_symbol(a).to_string())
            .collect();
        for (i, a) in symbols.iter().enumerate() {
            for b in &symbols[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
