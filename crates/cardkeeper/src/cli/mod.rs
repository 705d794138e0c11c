//! Command-line interface for cardkeeper.
//!
//! This module provides the CLI structure for the `cardkeeper` binary and the
//! small terminal helpers its commands share.

mod commands;

use std::io::{BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::Verbosity;

pub use commands::{
    AddCommand, ConfigCommand, EditCommand, ListCommand, RemoveCommand, ShowCommand,
    StatusCommand,
};

/// Message shown by `list` when there is nothing to show.
pub const EMPTY_LIST_MESSAGE: &str = "No saved cards yet. Create a card to get started!";

/// cardkeeper - Keep your birthday cards
///
/// Write birthday card messages, attach a picture, and keep them around for
/// later. Cards are saved locally.
#[derive(Debug, Parser)]
#[command(name = "cardkeeper")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a card
    Add(AddCommand),

    /// List saved cards
    #[command(alias = "ls")]
    List(ListCommand),

    /// Show one card
    Show(ShowCommand),

    /// Change a card's text
    Edit(EditCommand),

    /// Delete a card
    #[command(alias = "rm")]
    Remove(RemoveCommand),

    /// Show where cards are stored and whether storage is up to date
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }
}

/// Ask a yes/no question, defaulting to no.
///
/// Only an answer starting with `y` or `Y` counts as yes. End of input is no.
///
/// # Errors
///
/// Returns an error if writing the prompt or reading the answer fails.
pub fn confirm<R: BufRead, W: Write>(prompt: &str, input: &mut R, output: &mut W) -> std::io::Result<bool> {
    write!(output, "{prompt} [y/N] ")?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim_start().chars().next(), Some('y' | 'Y')))
}
