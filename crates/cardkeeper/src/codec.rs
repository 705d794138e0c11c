//! Blob encoding for the card list.
//!
//! The whole list is stored as one JSON array. Reading also accepts the older
//! layout where records carried only `text` and `image`, and tolerates `null`
//! holes left behind by out-of-range writes in that layout.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::card::{Card, CardId, ImageRef};
use crate::error::Result;

/// A record as found in storage, before ids are filled in.
#[derive(Debug, Deserialize)]
struct StoredCard {
    #[serde(default)]
    id: Option<CardId>,
    text: String,
    #[serde(default)]
    image: Option<ImageRef>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

/// Serialize a card list into a blob.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn encode(cards: &[Card]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(cards)?)
}

/// Deserialize a blob into a card list.
///
/// An empty blob decodes to an empty list. Records without an id receive one
/// derived from their position and content, so decoding is repeatable.
///
/// # Errors
///
/// Returns an error if the blob is not a JSON array of card records.
pub fn decode(bytes: &[u8]) -> Result<Vec<Card>> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    let stored: Vec<Option<StoredCard>> = serde_json::from_slice(bytes)?;
    let mut cards = Vec::with_capacity(stored.len());
    let mut derived = 0usize;

    for (position, record) in stored.into_iter().enumerate() {
        let Some(record) = record else {
            warn!(position, "Skipping empty slot in stored card list");
            continue;
        };
        let id = record.id.unwrap_or_else(|| {
            derived += 1;
            CardId::derive(position, &record.text, record.image.as_ref())
        });
        cards.push(Card {
            id,
            text: record.text,
            image: record.image,
            created_at: record.created_at,
        });
    }

    if derived > 0 {
        debug!(count = derived, "Assigned ids to cards stored without one");
    }
    Ok(cards)
}

/// BLAKE3 fingerprint of a blob, as lowercase hex.
#[must_use]
pub fn fingerprint(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}
