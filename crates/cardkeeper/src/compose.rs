//! Card creation flow.
//!
//! A [`CardDraft`] collects a message and an optional picked image. It is only
//! handed to the card store once it passes the [`ValidationPolicy`]; a rejected
//! draft never reaches the store.

use thiserror::Error;
use tracing::debug;

use crate::card::{Card, ImageRef};
use crate::storage::KvStore;
use crate::store::{CardStore, PersistTicket};

/// Why a draft was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The message is empty or whitespace only.
    #[error("Please add some text to your card.")]
    EmptyText,

    /// An image is required but none was picked.
    #[error("Please pick an image for your card.")]
    MissingImage,

    /// The message exceeds the configured maximum.
    #[error("Your message is {len} characters long; the limit is {max}.")]
    TextTooLong {
        /// Message length in characters.
        len: usize,
        /// Allowed maximum.
        max: usize,
    },
}

impl ValidationError {
    /// Short heading for the prompt shown to the user.
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::EmptyText => "Text Required",
            Self::MissingImage => "Image Required",
            Self::TextTooLong { .. } => "Text Too Long",
        }
    }
}

/// Rules a draft must satisfy before it is saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// Refuse drafts without an image.
    pub require_image: bool,
    /// Maximum message length in characters.
    pub max_text_length: usize,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            require_image: false,
            max_text_length: 10_000,
        }
    }
}

impl ValidationPolicy {
    /// Check a message on its own, as the edit flow does.
    ///
    /// # Errors
    ///
    /// Returns the first rule the text breaks.
    pub fn check_text(&self, text: &str) -> Result<(), ValidationError> {
        if text.trim().is_empty() {
            return Err(ValidationError::EmptyText);
        }
        let len = text.chars().count();
        if len > self.max_text_length {
            return Err(ValidationError::TextTooLong {
                len,
                max: self.max_text_length,
            });
        }
        Ok(())
    }
}

/// A card being composed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardDraft {
    /// Message as typed.
    pub text: String,
    /// Picked image, if any.
    pub image: Option<ImageRef>,
}

impl CardDraft {
    /// Start a draft with the given message.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
        }
    }

    /// Attach an image picked for the card.
    #[must_use]
    pub fn with_image(mut self, image: Option<ImageRef>) -> Self {
        self.image = image;
        self
    }

    /// Check the draft against the policy.
    ///
    /// # Errors
    ///
    /// Returns the first rule the draft breaks.
    pub fn validate(&self, policy: &ValidationPolicy) -> Result<(), ValidationError> {
        policy.check_text(&self.text)?;
        if policy.require_image && self.image.is_none() {
            return Err(ValidationError::MissingImage);
        }
        Ok(())
    }

    /// Empty the draft, ready for the next card.
    pub fn clear(&mut self) {
        self.text.clear();
        self.image = None;
    }
}

/// Validate a draft and, if it passes, add it to the store.
///
/// On success the draft is cleared and the store's persistence ticket is
/// returned. On failure the store is not touched and the draft is kept so the
/// user can fix it.
///
/// # Errors
///
/// Returns the validation failure if the draft is rejected.
pub fn submit<S>(
    store: &mut CardStore<S>,
    draft: &mut CardDraft,
    policy: &ValidationPolicy,
) -> Result<PersistTicket, ValidationError>
where
    S: KvStore + ?Sized + 'static,
{
    if let Err(err) = draft.validate(policy) {
        debug!(reason = %err, "Draft rejected");
        return Err(err);
    }

    let card = Card::new(std::mem::take(&mut draft.text), draft.image.take());
    let ticket = store.add(card);
    draft.clear();
    Ok(ticket)
}
