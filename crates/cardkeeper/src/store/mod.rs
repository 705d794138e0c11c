//! The card store.
//!
//! [`CardStore`] owns the authoritative, ordered list of cards and mirrors it
//! to a [`KvStore`] under one key as a single blob. Every mutation:
//!
//! 1. applies to the in-memory list immediately,
//! 2. serializes the whole list,
//! 3. queues the blob on the [`PersistQueue`] and returns a [`PersistTicket`].
//!
//! Writes are performed in order by one background task. A failed write is
//! logged and reported through its ticket; memory is not rolled back, so
//! storage lags behind until the next successful write.
//!
//! Cards can be addressed by list position or by their stable [`CardId`].
//! Positions shift when earlier cards are removed; ids never change.

pub mod writer;

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::card::{Card, CardId};
use crate::codec;
use crate::error::{Error, Result};
use crate::storage::KvStore;

pub use writer::{PersistQueue, PersistTicket};

/// Outcome of [`CardStore::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Nothing was stored under the key; the list was left as it was.
    Missing,
    /// The stored list replaced the in-memory list.
    Loaded(usize),
    /// Reading or decoding failed; the list was left as it was.
    Failed,
}

/// Comparison of the in-memory list with what storage holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    /// Number of cards in memory.
    pub cards: usize,
    /// Fingerprint of the in-memory list's serialization.
    pub memory_fingerprint: String,
    /// Fingerprint of the stored blob, if one exists.
    pub persisted_fingerprint: Option<String>,
}

impl SyncStatus {
    /// Check if storage holds exactly the in-memory list.
    ///
    /// Nothing stored loads as an empty list, so it matches an empty list.
    #[must_use]
    pub fn in_sync(&self) -> bool {
        match self.persisted_fingerprint.as_deref() {
            Some(persisted) => persisted == self.memory_fingerprint,
            None => self.cards == 0,
        }
    }
}

/// In-memory card list mirrored to key/value storage.
#[derive(Debug)]
pub struct CardStore<S: KvStore + ?Sized> {
    cards: Vec<Card>,
    key: String,
    storage: Arc<S>,
    writer: PersistQueue,
    loaded: bool,
}

impl<S: KvStore + ?Sized + 'static> CardStore<S> {
    /// Create an empty store writing to `key`.
    ///
    /// Starts the background writer, so this must run inside a tokio runtime.
    /// The list stays empty until [`load`](Self::load) is called.
    #[must_use]
    pub fn new(storage: Arc<S>, key: impl Into<String>) -> Self {
        let key = key.into();
        let writer = PersistQueue::spawn(Arc::clone(&storage), key.clone());
        Self {
            cards: Vec::new(),
            key,
            storage,
            writer,
            loaded: false,
        }
    }

    /// Create a store and load whatever is stored under `key`.
    pub async fn open(storage: Arc<S>, key: impl Into<String>) -> Self {
        let mut store = Self::new(storage, key);
        store.load().await;
        store
    }

    /// Read the stored list into memory.
    ///
    /// Failures are logged and leave the in-memory list untouched; they are
    /// never returned. Use [`try_load`](Self::try_load) to get the error.
    pub async fn load(&mut self) -> LoadOutcome {
        match self.try_load().await {
            Ok(Some(count)) => LoadOutcome::Loaded(count),
            Ok(None) => LoadOutcome::Missing,
            Err(e) => {
                error!(key = %self.key, error = %e, "Error loading saved cards");
                LoadOutcome::Failed
            }
        }
    }

    /// Read the stored list into memory, returning how many cards were loaded.
    ///
    /// Pending writes are drained first, so the read reflects every mutation
    /// made through this store. If the last write failed, storage is behind
    /// memory: the current list is written again before reading, and the load
    /// is refused if that write fails too. Returns `Ok(None)` if nothing is
    /// stored.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be written back, cannot be read, or
    /// the blob cannot be decoded. The in-memory list is unchanged in that case.
    pub async fn try_load(&mut self) -> Result<Option<usize>> {
        if let Err(e) = self.writer.flush().await {
            warn!(error = %e, "Could not drain pending writes before loading");
        }

        if self.writer.last_write_failed() {
            warn!(key = %self.key, "Storage is behind memory, saving before loading");
            self.persist().wait().await?;
        }

        let Some(blob) = self.storage.get(&self.key).await? else {
            debug!(key = %self.key, "No saved cards");
            self.loaded = true;
            return Ok(None);
        };

        let cards = codec::decode(&blob)?;
        let count = cards.len();
        self.cards = cards;
        self.loaded = true;
        info!(key = %self.key, count, "Loaded saved cards");
        Ok(Some(count))
    }

    /// Append a card.
    pub fn add(&mut self, card: Card) -> PersistTicket {
        debug!(id = %card.id, "Adding card");
        self.cards.push(card);
        self.persist()
    }

    /// Remove the card at `index`; later cards move up by one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] without touching memory or storage
    /// if `index` is not a valid position.
    pub fn remove(&mut self, index: usize) -> Result<(Card, PersistTicket)> {
        self.check_index(index)?;
        let removed = self.cards.remove(index);
        debug!(index, id = %removed.id, "Removed card");
        Ok((removed, self.persist()))
    }

    /// Replace the text and image of the card at `index`.
    ///
    /// The replacement is complete: an absent image in `card` clears the
    /// stored one. The slot keeps its id and creation time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] without touching memory or storage
    /// if `index` is not a valid position.
    pub fn update(&mut self, index: usize, card: Card) -> Result<PersistTicket> {
        self.check_index(index)?;
        let slot = &mut self.cards[index];
        slot.text = card.text;
        slot.image = card.image;
        debug!(index, id = %slot.id, "Updated card");
        Ok(self.persist())
    }

    /// Replace only the text of the card at `index`, keeping its image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] if `index` is not a valid position.
    pub fn edit_text(&mut self, index: usize, text: impl Into<String>) -> Result<PersistTicket> {
        self.check_index(index)?;
        let image = self.cards[index].image.clone();
        self.update(index, Card::new(text, image))
    }

    /// Remove the card with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CardNotFound`] if no card has that id.
    pub fn remove_by_id(&mut self, id: CardId) -> Result<(Card, PersistTicket)> {
        let index = self.position(id).ok_or(Error::CardNotFound(id))?;
        self.remove(index)
    }

    /// Replace the text and image of the card with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CardNotFound`] if no card has that id.
    pub fn update_by_id(&mut self, id: CardId, card: Card) -> Result<PersistTicket> {
        let index = self.position(id).ok_or(Error::CardNotFound(id))?;
        self.update(index, card)
    }

    /// Current position of the card with the given id.
    #[must_use]
    pub fn position(&self, id: CardId) -> Option<usize> {
        self.cards.iter().position(|card| card.id == id)
    }

    /// All cards in insertion order.
    #[must_use]
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// The card at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Card> {
        self.cards.get(index)
    }

    /// Number of cards.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Check if there are no cards.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Check if a load has completed (successfully or with nothing stored).
    ///
    /// Before that, an empty list may simply mean "not read yet".
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Key the list is stored under.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The storage backend.
    #[must_use]
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Wait until every write queued so far has completed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WriterClosed`] if the writer task is gone.
    pub async fn flush(&self) -> Result<()> {
        self.writer.flush().await
    }

    /// Compare the in-memory list with the stored blob.
    ///
    /// # Errors
    ///
    /// Returns an error if the list cannot be serialized or storage cannot be read.
    pub async fn sync_status(&self) -> Result<SyncStatus> {
        self.flush().await?;
        let memory = codec::encode(&self.cards)?;
        let persisted = self.storage.get(&self.key).await?;
        Ok(SyncStatus {
            cards: self.cards.len(),
            memory_fingerprint: codec::fingerprint(&memory),
            persisted_fingerprint: persisted.as_deref().map(codec::fingerprint),
        })
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.cards.len() {
            Ok(())
        } else {
            Err(Error::IndexOutOfRange {
                index,
                len: self.cards.len(),
            })
        }
    }

    fn persist(&mut self) -> PersistTicket {
        match codec::encode(&self.cards) {
            Ok(blob) => self.writer.submit(blob),
            Err(e) => {
                // Card only holds strings and ids, so this is a bug rather than bad input
                error!(error = %e, "Failed to serialize card list");
                self.writer.submit_failed()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::ImageRef;
    use crate::storage::MemoryKvStore;

    const KEY: &str = "savedCards";

    fn new_store() -> (Arc<MemoryKvStore>, CardStore<MemoryKvStore>) {
        let storage = Arc::new(MemoryKvStore::new());
        let store = CardStore::new(Arc::clone(&storage), KEY);
        (storage, store)
    }

    fn persisted(storage: &MemoryKvStore) -> Vec<Card> {
        codec::decode(&storage.peek(KEY).expect("nothing persisted")).unwrap()
    }

    fn texts(cards: &[Card]) -> Vec<&str> {
        cards.iter().map(|c| c.text.as_str()).collect()
    }

    #[tokio::test]
    async fn test_load_empty_storage() {
        let (_storage, mut store) = new_store();
        assert!(!store.is_loaded());

        assert_eq!(store.load().await, LoadOutcome::Missing);
        assert!(store.cards().is_empty());
        assert!(store.is_loaded());
    }

    #[tokio::test]
    async fn test_add_appends_and_persists() {
        let (storage, mut store) = new_store();
        store.load().await;

        let card = Card::new("Happy Birthday!", None);
        store.add(card.clone()).wait().await.unwrap();

        assert_eq!(store.cards(), [card]);
        assert_eq!(persisted(&storage), store.cards());
    }

    #[tokio::test]
    async fn test_add_is_visible_before_write_completes() {
        let (_storage, mut store) = new_store();
        for i in 0..5 {
            let before = store.len();
            let _ = store.add(Card::new(format!("card {i}"), None));
            assert_eq!(store.len(), before + 1);
            assert_eq!(store.cards().last().unwrap().text, format!("card {i}"));
        }
    }

    #[tokio::test]
    async fn test_rapid_adds_persist_final_list() {
        let (storage, mut store) = new_store();
        for i in 0..25 {
            drop(store.add(Card::new(format!("card {i}"), None)));
        }
        store.flush().await.unwrap();

        assert_eq!(persisted(&storage), store.cards());
        assert_eq!(storage.write_count(), 25);
    }

    #[tokio::test]
    async fn test_remove_first_of_two() {
        let (storage, mut store) = new_store();
        let _ = store.add(Card::new("A", None));
        let _ = store.add(Card::new("B", None));

        let (removed, ticket) = store.remove(0).unwrap();
        ticket.wait().await.unwrap();

        assert_eq!(removed.text, "A");
        assert_eq!(texts(store.cards()), ["B"]);
        assert_eq!(persisted(&storage), store.cards());
    }

    #[tokio::test]
    async fn test_remove_preserves_order() {
        let (_storage, mut store) = new_store();
        for text in ["A", "B", "C", "D"] {
            let _ = store.add(Card::new(text, None));
        }
        let _ = store.remove(2).unwrap();
        assert_eq!(texts(store.cards()), ["A", "B", "D"]);
    }

    #[tokio::test]
    async fn test_remove_out_of_range() {
        let (storage, mut store) = new_store();
        store.add(Card::new("A", None)).wait().await.unwrap();
        let writes = storage.write_count();

        let err = store.remove(1).unwrap_err();
        assert!(matches!(err, Error::IndexOutOfRange { index: 1, len: 1 }));

        store.flush().await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(storage.write_count(), writes);
    }

    #[tokio::test]
    async fn test_update_replaces_text_and_image() {
        let (storage, mut store) = new_store();
        let _ = store.add(Card::new("A", None));
        let id = store.cards()[0].id;

        let edited = Card::new("A-edited", Some(ImageRef::new("file://x.png")));
        store.update(0, edited).unwrap().wait().await.unwrap();

        let card = &store.cards()[0];
        assert_eq!(store.len(), 1);
        assert_eq!(card.text, "A-edited");
        assert_eq!(card.image, Some(ImageRef::new("file://x.png")));
        assert_eq!(card.id, id);
        assert_eq!(persisted(&storage), store.cards());
    }

    #[tokio::test]
    async fn test_update_clears_image() {
        let (_storage, mut store) = new_store();
        let _ = store.add(Card::new("A", Some(ImageRef::new("file://x.png"))));

        let _ = store.update(0, Card::new("A", None)).unwrap();
        assert!(store.cards()[0].image.is_none());
    }

    #[tokio::test]
    async fn test_update_out_of_range() {
        let (storage, mut store) = new_store();
        let err = store.update(0, Card::new("ghost", None)).unwrap_err();
        assert!(matches!(err, Error::IndexOutOfRange { index: 0, len: 0 }));

        store.flush().await.unwrap();
        assert!(store.is_empty());
        assert!(storage.peek(KEY).is_none());
    }

    #[tokio::test]
    async fn test_edit_text_keeps_image() {
        let (_storage, mut store) = new_store();
        let image = ImageRef::new("file://cake.png");
        let _ = store.add(Card::new("Old", Some(image.clone())));

        store.edit_text(0, "New").unwrap().wait().await.unwrap();
        assert_eq!(store.cards()[0].text, "New");
        assert_eq!(store.cards()[0].image, Some(image));
    }

    #[tokio::test]
    async fn test_id_addressing_survives_shifts() {
        let (_storage, mut store) = new_store();
        for text in ["A", "B", "C"] {
            let _ = store.add(Card::new(text, None));
        }
        let id_c = store.cards()[2].id;

        let _ = store.remove(0).unwrap();
        assert_eq!(store.position(id_c), Some(1));

        let _ = store.update_by_id(id_c, Card::new("C2", None)).unwrap();
        let (removed, _) = store.remove_by_id(id_c).unwrap();
        assert_eq!(removed.text, "C2");
        assert_eq!(texts(store.cards()), ["B"]);

        let err = store.remove_by_id(id_c).unwrap_err();
        assert!(matches!(err, Error::CardNotFound(id) if id == id_c));
    }

    #[tokio::test]
    async fn test_load_replaces_list_from_storage() {
        let cards = vec![Card::new("A", None), Card::new("B", None)];
        let storage = Arc::new(MemoryKvStore::with_entry(KEY, codec::encode(&cards).unwrap()));

        let store = CardStore::open(storage, KEY).await;
        assert_eq!(store.cards(), cards);
    }

    #[tokio::test]
    async fn test_load_twice_is_idempotent() {
        let blob = br#"[{"text":"A","image":null},{"text":"B","image":"file://b.png"}]"#;
        let storage = Arc::new(MemoryKvStore::with_entry(KEY, blob.to_vec()));
        let mut store = CardStore::new(storage, KEY);

        assert_eq!(store.load().await, LoadOutcome::Loaded(2));
        let first = store.cards().to_vec();
        assert_eq!(store.load().await, LoadOutcome::Loaded(2));
        assert_eq!(store.cards(), first);
    }

    #[tokio::test]
    async fn test_load_sees_own_pending_writes() {
        let (_storage, mut store) = new_store();
        for text in ["A", "B"] {
            drop(store.add(Card::new(text, None)));
        }
        let before = store.cards().to_vec();

        assert_eq!(store.load().await, LoadOutcome::Loaded(2));
        assert_eq!(store.cards(), before);
    }

    #[tokio::test]
    async fn test_load_corrupt_blob_keeps_list() {
        let storage = Arc::new(MemoryKvStore::with_entry(KEY, "{corrupt"));
        let mut store = CardStore::new(storage, KEY);

        assert_eq!(store.load().await, LoadOutcome::Failed);
        assert!(store.is_empty());
        assert!(!store.is_loaded());
        assert!(store.try_load().await.is_err());
    }

    #[tokio::test]
    async fn test_load_read_failure_keeps_list() {
        let (storage, mut store) = new_store();
        store.add(Card::new("A", None)).wait().await.unwrap();

        storage.set_fail_reads(true);
        assert_eq!(store.load().await, LoadOutcome::Failed);
        assert_eq!(texts(store.cards()), ["A"]);
    }

    #[tokio::test]
    async fn test_persist_failure_does_not_roll_back() {
        let (storage, mut store) = new_store();
        store.add(Card::new("A", None)).wait().await.unwrap();

        storage.set_fail_writes(true);
        let result = store.add(Card::new("B", None)).wait().await;
        assert!(result.is_err());
        assert_eq!(texts(store.cards()), ["A", "B"]);
        assert_eq!(texts(&persisted(&storage)), ["A"]);

        let status = store.sync_status().await.unwrap();
        assert!(!status.in_sync());

        storage.set_fail_writes(false);
        store.add(Card::new("C", None)).wait().await.unwrap();
        assert_eq!(texts(&persisted(&storage)), ["A", "B", "C"]);
        assert!(store.sync_status().await.unwrap().in_sync());
    }

    #[tokio::test]
    async fn test_load_after_failed_write_keeps_unsaved_changes() {
        let (storage, mut store) = new_store();
        store.add(Card::new("A", None)).wait().await.unwrap();

        storage.set_fail_writes(true);
        assert!(store.add(Card::new("B", None)).wait().await.is_err());

        // storage still failing: the load is refused rather than reading the stale blob
        assert!(store.try_load().await.is_err());
        assert_eq!(store.load().await, LoadOutcome::Failed);
        assert_eq!(texts(store.cards()), ["A", "B"]);
        assert_eq!(texts(&persisted(&storage)), ["A"]);

        // once storage recovers, the unsaved list is written back before reading
        storage.set_fail_writes(false);
        assert_eq!(store.load().await, LoadOutcome::Loaded(2));
        assert_eq!(texts(store.cards()), ["A", "B"]);
        assert_eq!(texts(&persisted(&storage)), ["A", "B"]);
        assert!(store.sync_status().await.unwrap().in_sync());
    }

    #[tokio::test]
    async fn test_sync_status_before_any_write() {
        let (_storage, store) = new_store();
        let status = store.sync_status().await.unwrap();
        assert_eq!(status.cards, 0);
        assert!(status.persisted_fingerprint.is_none());
        assert!(status.in_sync());
    }

    #[tokio::test]
    async fn test_sync_status_first_write_failed() {
        let (storage, mut store) = new_store();
        storage.set_fail_writes(true);
        assert!(store.add(Card::new("A", None)).wait().await.is_err());

        let status = store.sync_status().await.unwrap();
        assert!(status.persisted_fingerprint.is_none());
        assert!(!status.in_sync());
    }

    #[tokio::test]
    async fn test_store_over_sqlite() {
        use crate::storage::SqliteKvStore;

        let storage: Arc<dyn KvStore> = Arc::new(SqliteKvStore::open_in_memory().unwrap());
        let mut store = CardStore::new(Arc::clone(&storage), KEY);
        store.add(Card::new("Happy Birthday!", None)).wait().await.unwrap();

        let mut reopened = CardStore::new(storage, KEY);
        assert_eq!(reopened.load().await, LoadOutcome::Loaded(1));
        assert_eq!(reopened.cards(), store.cards());
    }
}
