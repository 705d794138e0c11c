//! Addressing cards from the command line.
//!
//! A selector is either the 1-based number shown by `list`, or a prefix of a
//! card's id. Numbers are convenient but shift when earlier cards are removed;
//! id prefixes keep pointing at the same card.
//!
//! Input made only of digits is always read as a number, so an id prefix that
//! happens to be all digits must include at least one more hex letter to be
//! used.

use std::fmt;
use std::str::FromStr;

use crate::card::Card;
use crate::error::{Error, Result};

/// Shortest id prefix accepted.
pub const MIN_PREFIX_LEN: usize = 4;

/// A user-supplied reference to one card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardSelector {
    /// Display number, starting at 1.
    Number(usize),
    /// Lowercase hex prefix of the card id, hyphens removed.
    IdPrefix(String),
}

impl fmt::Display for CardSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::IdPrefix(prefix) => write!(f, "{prefix}"),
        }
    }
}

impl FromStr for CardSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let input = s.trim();
        if input.is_empty() {
            return Err(Error::selector(s, "empty selector"));
        }

        if input.chars().all(|c| c.is_ascii_digit()) {
            return match input.parse::<usize>() {
                Ok(0) => Err(Error::selector(s, "card numbers start at 1")),
                Ok(n) => Ok(Self::Number(n)),
                Err(_) => Err(Error::selector(s, "number is too large")),
            };
        }

        let prefix: String = input
            .chars()
            .filter(|c| *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        if !prefix.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::selector(s, "expected a card number or an id prefix"));
        }
        if prefix.len() < MIN_PREFIX_LEN {
            return Err(Error::selector(
                s,
                format!("id prefix must be at least {MIN_PREFIX_LEN} characters"),
            ));
        }
        Ok(Self::IdPrefix(prefix))
    }
}

impl CardSelector {
    /// Parse a selector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Selector`] if the input is neither a positive number
    /// nor a hex id prefix of sufficient length.
    pub fn parse(input: &str) -> Result<Self> {
        input.parse()
    }

    /// Find the 0-based position of the selected card in `cards`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Selector`] for a number past the end of the list, or a
    /// prefix matching no card or more than one.
    pub fn resolve(&self, cards: &[Card]) -> Result<usize> {
        match self {
            Self::Number(n) => match n.checked_sub(1) {
                Some(index) if index < cards.len() => Ok(index),
                Some(_) => Err(Error::selector(
                    n.to_string(),
                    format!("there is no card {n} (list has {} cards)", cards.len()),
                )),
                None => Err(Error::selector("0", "card numbers start at 1")),
            },
            Self::IdPrefix(prefix) => {
                let mut matches = cards
                    .iter()
                    .enumerate()
                    .filter(|(_, card)| card.id.simple().starts_with(prefix.as_str()))
                    .map(|(index, _)| index);

                match (matches.next(), matches.next()) {
                    (Some(index), None) => Ok(index),
                    (None, _) => Err(Error::selector(prefix.as_str(), "no card has this id")),
                    (Some(_), Some(_)) => {
                        let count = 2 + matches.count();
                        Err(Error::selector(
                            prefix.as_str(),
                            format!("matches {count} cards, use a longer prefix"),
                        ))
                    }
                }
            }
        }
    }
}
