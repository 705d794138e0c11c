//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Create a card.
#[derive(Debug, Args)]
pub struct AddCommand {
    /// The card's message (words are joined with spaces)
    #[arg(required = true, num_args = 1..)]
    pub text: Vec<String>,

    /// Image to attach: a file path or a locator such as `file://...`
    #[arg(short, long, value_name = "PATH")]
    pub image: Option<String>,
}

impl AddCommand {
    /// The message as one string.
    #[must_use]
    pub fn message(&self) -> String {
        self.text.join(" ")
    }
}

/// List saved cards.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Show one card.
#[derive(Debug, Args)]
pub struct ShowCommand {
    /// Card number from `list`, or an id prefix
    pub card: String,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Change a card's text.
#[derive(Debug, Args)]
pub struct EditCommand {
    /// Card number from `list`, or an id prefix
    pub card: String,

    /// The new message (words are joined with spaces)
    #[arg(required = true, num_args = 1..)]
    pub text: Vec<String>,
}

impl EditCommand {
    /// The new message as one string.
    #[must_use]
    pub fn message(&self) -> String {
        self.text.join(" ")
    }
}

/// Delete a card.
#[derive(Debug, Args)]
pub struct RemoveCommand {
    /// Card number from `list`, or an id prefix
    pub card: String,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
