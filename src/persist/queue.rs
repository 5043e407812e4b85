use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::sync::mpsc::{
    Receiver, RecvTimeoutError, Sender, SyncSender, TryRecvError, TrySendError, channel,
    sync_channel,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use super::{FormulaStore, PersistenceError};
use crate::config::SaveQueueConfig;
use crate::types::{FormulaId, Sequence};

/// Outcome of one write attempt, reported from the worker.
#[derive(Debug)]
pub enum SaveEvent {
    Saved {
        formula_id: FormulaId,
        generation: u64,
    },
    Failed {
        formula_id: FormulaId,
        generation: u64,
        error: PersistenceError,
    },
}

impl SaveEvent {
    #[must_use]
    pub fn formula_id(&self) -> &FormulaId {
        match self {
            Self::Saved { formula_id, .. } | Self::Failed { formula_id, .. } => formula_id,
        }
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

enum Command {
    Save {
        formula_id: FormulaId,
        sequence: Sequence,
        generation: u64,
    },
    RetryFailed,
    Flush(Sender<()>),
}

struct PendingSave {
    sequence: Sequence,
    generation: u64,
    queued_at: Instant,
}

/// Background writer for formula sequences.
///
/// Submissions are coalesced per formula: only the latest sequence of a
/// formula is written once submissions go quiet for the debounce window, or
/// once the oldest pending save has waited `max_delay`.
///
/// Outcomes are buffered for [`try_events`](Self::try_events) up to
/// `events_capacity`. When the buffer is full, `Saved` events are dropped and
/// the latest failure of each formula is held back until there is room.
pub struct SaveQueue {
    tx: Option<SyncSender<Command>>,
    events: Mutex<Receiver<SaveEvent>>,
    handle: Option<JoinHandle<()>>,
    generation: AtomicU64,
}

impl SaveQueue {
    /// Start the worker thread, which takes ownership of `store`.
    pub fn new<S: FormulaStore>(store: S, config: &SaveQueueConfig) -> Result<Self, PersistenceError> {
        let (tx, rx) = sync_channel(config.capacity.max(1));
        let (events_tx, events) = sync_channel(config.events_capacity.max(1));
        let worker = Worker {
            store,
            debounce: config.debounce,
            max_delay: config.max_delay,
            pending: HashMap::new(),
            failed: HashMap::new(),
            last_submit: None,
            events: events_tx,
            held_failures: Vec::new(),
            dropped_saved: 0,
        };
        let handle = thread::Builder::new()
            .name("formulary-save-queue".to_string())
            .spawn(move || worker.run(rx))?;
        Ok(Self {
            tx: Some(tx),
            events: Mutex::new(events),
            handle: Some(handle),
            generation: AtomicU64::new(0),
        })
    }

    /// Queue the current state of a formula. Blocks only while the channel is
    /// at capacity. Returns the generation assigned to this submission.
    pub fn submit(&self, formula_id: FormulaId, sequence: Sequence) -> Result<u64, PersistenceError> {
        let (command, generation) = self.save_command(formula_id, sequence);
        self.sender()?
            .send(command)
            .map_err(|_| PersistenceError::WorkerStopped)?;
        Ok(generation)
    }

    /// Like [`submit`](Self::submit) but never blocks.
    pub fn try_submit(&self, formula_id: FormulaId, sequence: Sequence) -> Result<u64, PersistenceError> {
        let (command, generation) = self.save_command(formula_id, sequence);
        match self.sender()?.try_send(command) {
            Ok(()) => Ok(generation),
            Err(TrySendError::Full(_)) => {
                warn!(target: "formulary::persist", "save queue full, submission dropped");
                Err(PersistenceError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => Err(PersistenceError::WorkerStopped),
        }
    }

    /// Requeue every save whose last attempt failed and was not superseded.
    pub fn retry_failed(&self) -> Result<(), PersistenceError> {
        self.sender()?
            .send(Command::RetryFailed)
            .map_err(|_| PersistenceError::WorkerStopped)
    }

    /// Write everything pending now and wait until the worker has tried.
    pub fn flush(&self) -> Result<(), PersistenceError> {
        let (ack_tx, ack_rx) = channel();
        self.sender()?
            .send(Command::Flush(ack_tx))
            .map_err(|_| PersistenceError::WorkerStopped)?;
        ack_rx.recv().map_err(|_| PersistenceError::WorkerStopped)
    }

    /// Drain the events reported so far without blocking.
    pub fn try_events(&self) -> Vec<SaveEvent> {
        let events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out = Vec::new();
        loop {
            match events.try_recv() {
                Ok(event) => out.push(event),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return out,
            }
        }
    }

    fn sender(&self) -> Result<&SyncSender<Command>, PersistenceError> {
        self.tx.as_ref().ok_or(PersistenceError::WorkerStopped)
    }

    fn save_command(&self, formula_id: FormulaId, sequence: Sequence) -> (Command, u64) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let command = Command::Save {
            formula_id,
            sequence,
            generation,
        };
        (command, generation)
    }
}

impl Drop for SaveQueue {
    fn drop(&mut self) {
        // Closing the channel tells the worker to write what is left and exit.
        self.tx.take();

        if let Some(handle) = self.handle.take() {
            debug!(target: "formulary::persist", "waiting for save worker to finish");
            if let Err(e) = handle.join() {
                error!(target: "formulary::persist", "save worker panicked: {:?}", e);
            } else {
                debug!(target: "formulary::persist", "save worker joined");
            }
        }
    }
}

struct Worker<S> {
    store: S,
    debounce: Duration,
    max_delay: Duration,
    pending: HashMap<FormulaId, PendingSave>,
    failed: HashMap<FormulaId, PendingSave>,
    last_submit: Option<Instant>,
    events: SyncSender<SaveEvent>,
    held_failures: Vec<SaveEvent>,
    dropped_saved: u64,
}

impl<S: FormulaStore> Worker<S> {
    fn run(mut self, rx: Receiver<Command>) {
        info!(target: "formulary::persist", "save worker started");

        loop {
            let command = match self.deadline() {
                None => match rx.recv() {
                    Ok(command) => command,
                    Err(_) => break,
                },
                Some(deadline) => {
                    let timeout = deadline.saturating_duration_since(Instant::now());
                    match rx.recv_timeout(timeout) {
                        Ok(command) => command,
                        Err(RecvTimeoutError::Timeout) => {
                            self.write_pending();
                            continue;
                        }
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            };
            self.handle(command);
        }

        self.write_pending();
        if !self.failed.is_empty() {
            warn!(
                target: "formulary::persist",
                unsaved = self.failed.len(),
                "save worker stopping with failed saves"
            );
        }
        info!(target: "formulary::persist", "save worker shutting down");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Save {
                formula_id,
                sequence,
                generation,
            } => {
                let now = Instant::now();
                self.failed.remove(&formula_id);
                match self.pending.entry(formula_id) {
                    Entry::Occupied(mut slot) => {
                        let slot = slot.get_mut();
                        slot.sequence = sequence;
                        slot.generation = generation;
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(PendingSave {
                            sequence,
                            generation,
                            queued_at: now,
                        });
                    }
                }
                self.last_submit = Some(now);
            }
            Command::RetryFailed => {
                let now = Instant::now();
                for (formula_id, mut save) in self.failed.drain() {
                    save.queued_at = now;
                    self.pending.entry(formula_id).or_insert(save);
                }
                if !self.pending.is_empty() {
                    self.last_submit = Some(now);
                }
            }
            Command::Flush(ack) => {
                self.write_pending();
                self.deliver_held();
                let _ = ack.send(());
            }
        }
    }

    /// When the pending batch is due, or `None` with nothing pending.
    fn deadline(&self) -> Option<Instant> {
        let oldest = self.pending.values().map(|p| p.queued_at).min()?;
        let quiet = self.last_submit.unwrap_or(oldest) + self.debounce;
        Some(quiet.min(oldest + self.max_delay))
    }

    fn write_pending(&mut self) {
        let mut batch: Vec<_> = self.pending.drain().collect();
        batch.sort_by_key(|(_, save)| save.generation);

        for (formula_id, save) in batch {
            let event = match self.store.save(&formula_id, &save.sequence) {
                Ok(()) => {
                    debug!(
                        target: "formulary::persist",
                        formula_id = %formula_id,
                        generation = save.generation,
                        tokens = save.sequence.len(),
                        "formula saved"
                    );
                    SaveEvent::Saved {
                        formula_id,
                        generation: save.generation,
                    }
                }
                Err(e) => {
                    error!(
                        target: "formulary::persist",
                        formula_id = %formula_id,
                        generation = save.generation,
                        error = %e,
                        "failed to save formula"
                    );
                    let generation = save.generation;
                    self.failed.insert(formula_id.clone(), save);
                    SaveEvent::Failed {
                        formula_id,
                        generation,
                        error: e,
                    }
                }
            };
            self.report(event);
        }
    }

    fn report(&mut self, event: SaveEvent) {
        self.deliver_held();
        if event.is_failure() && !self.held_failures.is_empty() {
            self.hold(event);
            return;
        }
        match self.events.try_send(event) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(event)) if event.is_failure() => self.hold(event),
            Err(TrySendError::Full(_)) => {
                self.dropped_saved += 1;
                debug!(
                    target: "formulary::persist",
                    dropped = self.dropped_saved,
                    "event buffer full, saved event dropped"
                );
            }
        }
    }

    /// Keep at most one undelivered failure per formula, the latest.
    fn hold(&mut self, event: SaveEvent) {
        match self
            .held_failures
            .iter_mut()
            .find(|held| held.formula_id() == event.formula_id())
        {
            Some(slot) => *slot = event,
            None => self.held_failures.push(event),
        }
    }

    fn deliver_held(&mut self) {
        while !self.held_failures.is_empty() {
            let event = self.held_failures.remove(0);
            match self.events.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(event)) => {
                    self.held_failures.insert(0, event);
                    return;
                }
                Err(TrySendError::Disconnected(_)) => {
                    self.held_failures.clear();
                    return;
                }
            }
        }
    }
}
