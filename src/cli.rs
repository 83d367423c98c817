use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "armsync")]
#[command(version)]
#[command(about = "Declarative reconciliation of Azure Resource Manager resources", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Settings file (default: ~/.config/armsync/config.toml)
    #[arg(long, global = true, env = "ARMSYNC_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Make remote resources match the documents
    Apply(ApplyArgs),

    /// Preview what apply would change
    Diff(DiffArgs),

    /// List the available resource modules
    Modules,

    /// Describe one resource module
    Show {
        /// Module name (e.g. eventhub)
        module: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Apply / Diff
// ============================================================================

#[derive(Args)]
pub struct ApplyArgs {
    /// Resource documents (TOML or JSON)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Decide actions without changing anything
    #[arg(long, alias = "dry-run")]
    pub check: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Wait budget for long-running operations, in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Print one JSON result object per resource
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct DiffArgs {
    /// Resource documents (TOML or JSON)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}
