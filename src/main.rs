mod cli;
mod commands;
mod config;
mod document;
mod progress;
mod signal;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    match cli.command {
        Command::Apply(args) => {
            let settings = config::Settings::load(cli.config.as_deref())?;
            commands::apply::run(&ctx, &settings, args)
        }
        Command::Diff(args) => {
            let settings = config::Settings::load(cli.config.as_deref())?;
            commands::diff::run(&ctx, &settings, args)
        }
        Command::Modules => commands::modules::list(),
        Command::Show { module } => commands::modules::show(&module),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "armsync", &mut io::stdout());
            Ok(())
        }
    }
}
