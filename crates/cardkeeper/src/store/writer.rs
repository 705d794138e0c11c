//! Single-writer persist queue.
//!
//! Snapshots of the card list are written by one background task in the order
//! they were submitted, so an older snapshot can never land after a newer one.
//! Each submission hands back a [`PersistTicket`]; awaiting it yields the
//! outcome of that particular write, dropping it leaves the write running.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, trace};

use crate::error::{Error, Result};
use crate::storage::KvStore;

enum WriteRequest {
    Write {
        seq: u64,
        blob: Vec<u8>,
        done: oneshot::Sender<Result<()>>,
    },
    Flush(oneshot::Sender<()>),
}

/// Handle to the background writer task.
///
/// The task exits once the handle is dropped and every queued write is done.
#[derive(Debug)]
pub struct PersistQueue {
    tx: mpsc::UnboundedSender<WriteRequest>,
    next_seq: u64,
    last_failed: Arc<AtomicBool>,
}

impl PersistQueue {
    /// Spawn the writer task for `key` on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn spawn<S>(storage: Arc<S>, key: String) -> Self
    where
        S: KvStore + ?Sized + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let last_failed = Arc::new(AtomicBool::new(false));
        tokio::spawn(run_writer(storage, key, rx, Arc::clone(&last_failed)));
        Self {
            tx,
            next_seq: 1,
            last_failed,
        }
    }

    /// Queue a blob for writing.
    pub fn submit(&mut self, blob: Vec<u8>) -> PersistTicket {
        let seq = self.next_seq;
        self.next_seq += 1;

        let (done, rx) = oneshot::channel();
        if self.tx.send(WriteRequest::Write { seq, blob, done }).is_err() {
            // the request, and with it `done`, was dropped: the ticket reports WriterClosed
            error!(seq, "Persist queue is closed, write dropped");
        }
        PersistTicket { seq, rx }
    }

    /// Hand out a ticket for a write that could not be built.
    ///
    /// Nothing is sent to storage; the ticket resolves to an internal error and
    /// the queue counts as having failed its last write.
    pub fn submit_failed(&mut self) -> PersistTicket {
        let seq = self.next_seq;
        self.next_seq += 1;

        self.last_failed.store(true, Ordering::SeqCst);
        let (done, rx) = oneshot::channel();
        let _ = done.send(Err(Error::internal("card list could not be serialized")));
        PersistTicket { seq, rx }
    }

    /// Wait until every write submitted so far has completed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WriterClosed`] if the writer task is gone.
    pub async fn flush(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(WriteRequest::Flush(tx))
            .map_err(|_| Error::WriterClosed)?;
        rx.await.map_err(|_| Error::WriterClosed)
    }

    /// Check if the most recently completed write failed.
    ///
    /// Storage then holds an older list than the one last submitted. Cleared
    /// by the next successful write.
    #[must_use]
    pub fn last_write_failed(&self) -> bool {
        self.last_failed.load(Ordering::SeqCst)
    }

    /// Number of writes submitted so far.
    #[must_use]
    pub fn submitted(&self) -> u64 {
        self.next_seq - 1
    }
}

/// Completion signal for one queued write.
#[derive(Debug)]
#[must_use = "dropping a ticket is fire-and-forget; call `wait` to learn whether the write succeeded"]
pub struct PersistTicket {
    seq: u64,
    rx: oneshot::Receiver<Result<()>>,
}

impl PersistTicket {
    /// Position of this write in submission order (starting at 1).
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Wait for the write to finish.
    ///
    /// # Errors
    ///
    /// Returns the storage error if the write failed, or
    /// [`Error::WriterClosed`] if it was never performed.
    pub async fn wait(self) -> Result<()> {
        self.rx.await.map_err(|_| Error::WriterClosed)?
    }
}

async fn run_writer<S>(
    storage: Arc<S>,
    key: String,
    mut rx: mpsc::UnboundedReceiver<WriteRequest>,
    last_failed: Arc<AtomicBool>,
) where
    S: KvStore + ?Sized,
{
    debug!(key = %key, backend = storage.backend(), "Persist queue started");
    while let Some(request) = rx.recv().await {
        match request {
            WriteRequest::Write { seq, blob, done } => {
                let bytes = blob.len();
                let result = storage.set(&key, blob).await;
                // set before replying so a waiter or flush observes it
                last_failed.store(result.is_err(), Ordering::SeqCst);
                match &result {
                    Ok(()) => trace!(seq, bytes, "Card list persisted"),
                    Err(e) => error!(seq, key = %key, error = %e, "Failed to persist card list"),
                }
                // nobody waiting is fine
                let _ = done.send(result);
            }
            WriteRequest::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!(key = %key, "Persist queue stopped");
}
