//! `cardkeeper` - CLI for the cardkeeper card store
//!
//! This binary creates, lists, edits and deletes birthday cards kept in the
//! configured storage backend.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

use cardkeeper::cli::{
    self, AddCommand, Cli, Command, ConfigCommand, EditCommand, RemoveCommand, ShowCommand,
    EMPTY_LIST_MESSAGE,
};
use cardkeeper::compose::{self, CardDraft};
use cardkeeper::storage::{self, KvStore};
use cardkeeper::{init_logging, Card, CardSelector, CardStore, Config, ImageRef, ValidationError};

type Store = CardStore<dyn KvStore>;

/// Width of the message preview in `list` and `remove` prompts.
const PREVIEW_CHARS: usize = 60;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    let Cli {
        config: config_path,
        command,
        ..
    } = cli;

    // Config commands must work even when the config is broken
    match command {
        Command::Config(cmd) => handle_config(config_path, cmd),
        command => run(config_path, command).await,
    }
}

async fn run(config_path: Option<PathBuf>, command: Command) -> Result<ExitCode> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    let mut store = open_store(&config).await?;

    let outcome = match command {
        Command::Add(cmd) => handle_add(&config, &mut store, &cmd).await,
        Command::List(cmd) => handle_list(&store, cmd.json),
        Command::Show(cmd) => handle_show(&store, &cmd),
        Command::Edit(cmd) => handle_edit(&config, &mut store, &cmd).await,
        Command::Remove(cmd) => handle_remove(&mut store, &cmd).await,
        Command::Status(cmd) => handle_status(&store, cmd.json).await,
        // dispatched before the store is opened
        Command::Config(_) => Ok(()),
    };

    // Drain anything still queued before the runtime goes away
    store.flush().await.context("failed to finish pending writes")?;

    match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => match e.downcast_ref::<ValidationError>() {
            Some(validation) => {
                eprintln!("{}: {validation}", validation.title());
                Ok(ExitCode::FAILURE)
            }
            None => Err(e),
        },
    }
}

async fn open_store(config: &Config) -> Result<Store> {
    let backend = storage::open_backend(config).context("failed to open storage")?;
    info!(backend = backend.backend(), location = %backend.location(), "Storage opened");

    let mut store: Store = CardStore::new(backend, config.storage.key.clone());
    // A failed load must not be followed by writes, or the stored list would be overwritten
    store
        .try_load()
        .await
        .context("failed to load saved cards")?;
    Ok(store)
}

fn select(store: &Store, input: &str) -> Result<usize> {
    let selector = CardSelector::parse(input)?;
    let index = selector.resolve(store.cards())?;
    debug!(%selector, index, "Selected card");
    Ok(index)
}

async fn handle_add(config: &Config, store: &mut Store, cmd: &AddCommand) -> Result<()> {
    let image = cmd
        .image
        .as_deref()
        .map(ImageRef::resolve)
        .transpose()
        .context("cannot use image")?;
    let mut draft = CardDraft::new(cmd.message()).with_image(image);

    let ticket = compose::submit(store, &mut draft, &config.validation_policy())?;
    ticket.wait().await.context("card was not saved")?;

    println!("Card saved");
    Ok(())
}

fn handle_list(store: &Store, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(store.cards())?);
        return Ok(());
    }

    if store.is_empty() {
        println!("{EMPTY_LIST_MESSAGE}");
        return Ok(());
    }

    for (i, card) in store.cards().iter().enumerate() {
        println!("{:>3}. {}  [{}]", i + 1, card.preview(PREVIEW_CHARS), card.id.short());
        if let Some(image) = &card.image {
            println!("     image: {image}");
        }
    }
    Ok(())
}

fn handle_show(store: &Store, cmd: &ShowCommand) -> Result<()> {
    let index = select(store, &cmd.card)?;
    let card = &store.cards()[index];

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(card)?);
        return Ok(());
    }

    print_card(index, card);
    Ok(())
}

fn print_card(index: usize, card: &Card) {
    println!("Card {}", index + 1);
    println!("  Id:       {}", card.id);
    if let Some(created_at) = card.created_at {
        println!("  Created:  {}", created_at.format("%Y-%m-%d %H:%M"));
    }
    match &card.image {
        Some(image) => println!("  Image:    {image}"),
        None => println!("  Image:    (none)"),
    }
    println!();
    for line in card.text.lines() {
        println!("  {line}");
    }
}

async fn handle_edit(config: &Config, store: &mut Store, cmd: &EditCommand) -> Result<()> {
    let index = select(store, &cmd.card)?;
    let text = cmd.message();
    config.validation_policy().check_text(&text)?;

    let ticket = store.edit_text(index, text)?;
    ticket.wait().await.context("card was not saved")?;

    println!("Card {} updated", index + 1);
    Ok(())
}

async fn handle_remove(store: &mut Store, cmd: &RemoveCommand) -> Result<()> {
    let index = select(store, &cmd.card)?;

    if !cmd.yes {
        let preview = store.cards()[index].preview(PREVIEW_CHARS);
        let prompt = format!("Delete card {} (\"{preview}\")?", index + 1);
        let confirmed = cli::confirm(&prompt, &mut io::stdin().lock(), &mut io::stdout())?;
        if !confirmed {
            println!("Cancelled");
            return Ok(());
        }
    }

    let (removed, ticket) = store.remove(index)?;
    ticket.wait().await.context("deletion was not saved")?;

    info!(id = %removed.id, "Card deleted");
    println!("Card deleted");
    Ok(())
}

async fn handle_status(store: &Store, json: bool) -> Result<()> {
    let status = store.sync_status().await?;
    let backend = store.storage();
    let stats = backend.database_stats().await?;

    if json {
        let report = serde_json::json!({
            "backend": backend.backend(),
            "location": backend.location(),
            "key": store.key(),
            "cards": status.cards,
            "in_sync": status.in_sync(),
            "memory_fingerprint": status.memory_fingerprint,
            "persisted_fingerprint": status.persisted_fingerprint,
            "database": stats,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let mut out = io::stdout().lock();
    writeln!(out, "cardkeeper status")?;
    writeln!(out, "-----------------")?;
    writeln!(out, "Backend:    {}", backend.backend())?;
    writeln!(out, "Location:   {}", backend.location())?;
    writeln!(out, "Key:        {}", store.key())?;
    writeln!(out, "Cards:      {}", status.cards)?;
    writeln!(
        out,
        "Storage:    {}",
        if status.in_sync() { "up to date" } else { "out of date" }
    )?;
    writeln!(out, "Memory:     {}", short_fingerprint(&status.memory_fingerprint))?;
    writeln!(
        out,
        "Persisted:  {}",
        status
            .persisted_fingerprint
            .as_deref()
            .map_or("(nothing stored yet)", short_fingerprint)
    )?;
    if let Some(stats) = stats {
        writeln!(out, "Entries:    {}", stats.entries)?;
        writeln!(out, "Data size:  {} bytes", stats.total_value_bytes)?;
        writeln!(out, "File size:  {} bytes", stats.db_size_bytes)?;
        if let Some(last_write) = stats.last_write {
            writeln!(out, "Last write: {}", last_write.format("%Y-%m-%d %H:%M:%S"))?;
        }
    }
    Ok(())
}

fn short_fingerprint(fingerprint: &str) -> &str {
    fingerprint.get(..16).unwrap_or(fingerprint)
}

fn handle_config(path: Option<PathBuf>, cmd: ConfigCommand) -> Result<ExitCode> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::load_from(path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Backend:            {}", config.storage.backend);
                println!("  Path:               {}", config.storage_path().display());
                println!("  Key:                {}", config.storage.key);
                println!();
                println!("[Cards]");
                println!("  Require image:      {}", config.cards.require_image);
                println!("  Max text length:    {}", config.cards.max_text_length);
            }
        }
        ConfigCommand::Path => {
            println!("{}", path.unwrap_or_else(Config::default_config_path).display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.or(path).unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            if let Err(e) = Config::load_from(Some(path)) {
                println!("Configuration error: {e}");
                return Ok(ExitCode::FAILURE);
            }
            println!("Configuration is valid.");
        }
    }
    Ok(ExitCode::SUCCESS)
}
