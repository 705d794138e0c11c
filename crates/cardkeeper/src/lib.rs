//! `cardkeeper` - A small store for birthday cards
//!
//! This library keeps an ordered list of cards (a message plus an optional
//! image locator) in memory and mirrors every change to a key/value store.
//! The in-memory list is authoritative; writes happen in the background, in
//! order, and report their outcome through a [`PersistTicket`].

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod card;
pub mod cli;
pub mod codec;
pub mod compose;
pub mod config;
pub mod error;
pub mod logging;
pub mod selector;
pub mod storage;
pub mod store;

pub use card::{Card, CardId, ImageRef};
pub use compose::{CardDraft, ValidationError, ValidationPolicy};
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use selector::CardSelector;
pub use storage::{KvStore, StorageStats};
pub use store::{CardStore, LoadOutcome, PersistTicket, SyncStatus};
