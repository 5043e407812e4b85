//! Durable storage of formula sequences and the background queue that feeds it.
//!
//! Edits are applied in memory first; saving happens afterwards, off the
//! editing path, through a [`SaveQueue`]. A failed save never rolls back the
//! in-memory tree.

#[cfg(feature = "file-store")]
mod file;
mod queue;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::types::{FormulaId, Sequence};
use crate::wire::DecodeError;

#[cfg(feature = "file-store")]
pub use file::{FileStore, FrameError};
pub use queue::{SaveEvent, SaveQueue};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode formula: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("stored formula is invalid: {0}")]
    Decode(#[from] DecodeError),

    #[cfg(feature = "file-store")]
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("store rejected save of '{formula_id}': {reason}")]
    Rejected { formula_id: FormulaId, reason: String },

    #[error("save queue is full")]
    QueueFull,

    #[error("save worker has stopped")]
    WorkerStopped,
}

/// Where formula sequences are persisted.
pub trait FormulaStore: Send + 'static {
    fn save(&mut self, formula_id: &FormulaId, sequence: &Sequence) -> Result<(), PersistenceError>;

    /// The last saved sequence, if any.
    fn load(&self, formula_id: &FormulaId) -> Result<Option<Sequence>, PersistenceError>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    saved: HashMap<FormulaId, Sequence>,
    save_count: usize,
    fail_next: usize,
}

/// In-memory store. Clones share the same contents, so a test can keep a
/// handle while the queue owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` saves fail with [`PersistenceError::Rejected`].
    pub fn fail_next(&self, n: usize) {
        self.lock().fail_next = n;
    }

    #[must_use]
    pub fn get(&self, formula_id: &FormulaId) -> Option<Sequence> {
        self.lock().saved.get(formula_id).cloned()
    }

    /// Successful saves so far.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.lock().save_count
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().saved.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().saved.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FormulaStore for MemoryStore {
    fn save(&mut self, formula_id: &FormulaId, sequence: &Sequence) -> Result<(), PersistenceError> {
        let mut inner = self.lock();
        if inner.fail_next > 0 {
            inner.fail_next -= 1;
            return Err(PersistenceError::Rejected {
                formula_id: formula_id.clone(),
                reason: "injected failure".into(),
            });
        }
        inner.saved.insert(formula_id.clone(), sequence.clone());
        inner.save_count += 1;
        Ok(())
    }

    fn load(&self, formula_id: &FormulaId) -> Result<Option<Sequence>, PersistenceError> {
        Ok(self.get(formula_id))
    }
}
