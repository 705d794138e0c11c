//! Core card types for cardkeeper.
//!
//! A card is a text message with an optional reference to an image. The image
//! itself is never read or copied; only its locator is kept.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// Stable identifier of a card.
///
/// Assigned once when the card is created and kept across edits, so a card
/// can be addressed even after earlier cards are removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(Uuid);

impl CardId {
    /// Generate a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Derive a deterministic id for a record stored without one.
    ///
    /// The same position and content always produce the same id.
    #[must_use]
    pub fn derive(position: usize, text: &str, image: Option<&ImageRef>) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(position as u64).to_le_bytes());
        hasher.update(text.as_bytes());
        hasher.update(&[0]);
        if let Some(image) = image {
            hasher.update(image.as_str().as_bytes());
        }
        let digest = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest.as_bytes()[..16]);
        Self(Uuid::from_bytes(bytes))
    }

    /// The first eight hex digits, enough to tell cards apart in a listing.
    #[must_use]
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }

    /// The id as 32 lowercase hex digits without hyphens.
    #[must_use]
    pub fn simple(&self) -> String {
        self.0.simple().to_string()
    }
}

impl Default for CardId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CardId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Opaque locator of an image picked for a card (e.g. `file:///…`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    /// Wrap a locator as-is.
    #[must_use]
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    /// Build a `file://` locator for an existing file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the path does not exist or cannot be resolved.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let canonical = std::fs::canonicalize(path.as_ref())?;
        Ok(Self(format!("file://{}", canonical.display())))
    }

    /// Turn user input into a locator.
    ///
    /// Input that already carries a scheme (`scheme://…`) is kept verbatim;
    /// anything else is treated as a local file path.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a file path is given that does not exist.
    pub fn resolve(input: &str) -> Result<Self> {
        if input.contains("://") {
            Ok(Self::new(input))
        } else {
            Self::from_path(input)
        }
    }

    /// The locator string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A birthday card record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    /// Stable identifier.
    pub id: CardId,

    /// The card's message.
    pub text: String,

    /// Picked image, if any.
    pub image: Option<ImageRef>,

    /// When the card was created. Absent for records carried over from
    /// storage written before timestamps were kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Card {
    /// Create a new card with a fresh id, stamped with the current time.
    #[must_use]
    pub fn new(text: impl Into<String>, image: Option<ImageRef>) -> Self {
        Self {
            id: CardId::new(),
            text: text.into(),
            image,
            created_at: Some(Utc::now()),
        }
    }

    /// Check if the card has an image attached.
    #[must_use]
    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    /// First line of the message, cut to `max_chars` characters.
    #[must_use]
    pub fn preview(&self, max_chars: usize) -> String {
        let first_line = self.text.lines().next().unwrap_or_default();
        if first_line.chars().count() > max_chars {
            let cut: String = first_line.chars().take(max_chars.saturating_sub(1)).collect();
            format!("{cut}…")
        } else {
            first_line.to_string()
        }
    }
}
