mod cli;
mod commands;
mod config;
mod manifest;
mod paths;
mod state;
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
    log::trace!("Verbosity {}", ctx.verbose);

    match cli.command {
        Command::Validate { manifest } => commands::validate::run(&ctx, &manifest),
        Command::Plan(args) => commands::plan::run(&ctx, args),
        Command::Apply(args) => commands::apply::run(&ctx, args),
        Command::Refresh(args) => commands::state::refresh(&ctx, args),
        Command::Destroy { state, yes } => commands::state::destroy(&ctx, state, yes),
        Command::Lookup(args) => commands::lookup::run(&ctx, args),
        Command::Show { state, reveal } => commands::state::show(&ctx, &state, reveal),
        Command::Schema { kind } => commands::schema::run(&ctx, kind.map(Into::into)),
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "scribae", &mut io::stdout());
            Ok(())
        }
    }
}
