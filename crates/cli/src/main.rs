//! Trellis command line tool.
//!
//! Reformats XML and JSON documents and lists their node paths using the
//! `trellis-serde` node tree.

mod commands;
mod config;

use std::io;

use clap::Parser;
use tracing::debug;

use crate::config::{CliConfig, Command, init_logging};

fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(2);
    }

    debug!(command = ?config.command, "Running command");
    let stdout = io::stdout().lock();
    match &config.command {
        Command::Fmt(args) => commands::fmt(args, stdout)?,
        Command::Paths(args) => commands::paths(args, stdout)?,
    }

    Ok(())
}
