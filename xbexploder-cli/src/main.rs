mod add;
mod app;
mod output;

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use clap::Parser;

use crate::app::Cli;

/// Set by the Ctrl+C handler; checked once the patch has been written or abandoned.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

fn main() -> anyhow::Result<()> {
    // The patch runs to completion so that a temporary copy is always persisted or removed
    ctrlc::set_handler(|| {
        INTERRUPTED.store(true, Ordering::SeqCst);
        eprintln!("\nInterrupted, finishing the current write...");
    })
    .context("failed to set Ctrl+C handler")?;

    let cli = Cli::parse();

    // Show xbexploder info+ on stderr unless --json; --verbose enables debug; RUST_LOG overrides
    if !cli.global.json {
        let level = if cli.global.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        env_logger::Builder::new()
            .filter_module("xbexploder", level)
            .parse_default_env()
            .target(env_logger::Target::Stderr)
            .format_timestamp(None)
            .format_module_path(false)
            .format_target(false)
            .init();
    }

    let result = add::run(&cli);
    if INTERRUPTED.load(Ordering::SeqCst) {
        if let Err(error) = &result {
            eprintln!("Error: {error:?}");
        }
        eprintln!("Cancelled.");
        std::process::exit(130);
    }
    result
}
