//! # liftgate-journal
//!
//! Append-only execution journal for the gateway.
//!
//! The core consumes the [`Journal`] trait only; it never depends on how
//! events are formatted or persisted. Two implementations ship here:
//! [`NoopJournal`] (counters only) and [`markdown::MarkdownJournal`]
//! (markdown table file, summary appended at finish).

pub mod markdown;

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

pub use markdown::MarkdownJournal;

/// Error types for journal operations.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    /// The journal sink could not be created or written.
    #[error("journal I/O error: {0}")]
    Io(String),
}

/// Event vocabulary of the execution journal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum JournalKind {
    /// Frame emitted on the local bus.
    BusTx,
    /// Frame received from the local bus.
    BusRx,
    /// Request sent to the dispatcher.
    DispatchTx,
    /// Reply received from the dispatcher.
    DispatchRx,
    /// A dispatcher verdict was applied to the fleet.
    TaskAssigned,
    /// Pipeline error.
    Error,
}

/// A single journal entry.
#[derive(Clone, Debug, Serialize)]
pub struct JournalEvent {
    pub kind: JournalKind,
    pub description: String,
    /// Structured context (frame bytes, token, verdict fields).
    pub details: Option<serde_json::Value>,
}

impl JournalEvent {
    /// Build an event without structured details.
    pub fn new(kind: JournalKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            details: None,
        }
    }

    /// Attach structured details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Counter totals surfaced when the journal is finished.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct JournalSummary {
    pub bus_rx: u64,
    pub bus_tx: u64,
    pub dispatch_tx: u64,
    pub dispatch_rx: u64,
    pub tasks_assigned: u64,
    pub errors: u64,
}

/// Write-only event sink consumed by the core.
///
/// `record` must be callable from any task; implementations guard their
/// sink internally. `finish` flushes the sink and surfaces the counters;
/// it is called exactly once, on shutdown.
pub trait Journal: Send + Sync {
    /// Append one event.
    fn record(&self, event: JournalEvent);

    /// Flush and close the sink, returning the counter totals.
    fn finish(&self) -> JournalSummary;

    /// Frame emitted on the local bus.
    fn bus_tx(&self, description: &str, details: serde_json::Value) {
        self.record(JournalEvent::new(JournalKind::BusTx, description).with_details(details));
    }

    /// Frame received from the local bus.
    fn bus_rx(&self, description: &str, details: serde_json::Value) {
        self.record(JournalEvent::new(JournalKind::BusRx, description).with_details(details));
    }

    /// Request sent to the dispatcher.
    fn dispatch_tx(&self, description: &str, details: serde_json::Value) {
        self.record(JournalEvent::new(JournalKind::DispatchTx, description).with_details(details));
    }

    /// Reply received from the dispatcher.
    fn dispatch_rx(&self, description: &str, details: serde_json::Value) {
        self.record(JournalEvent::new(JournalKind::DispatchRx, description).with_details(details));
    }

    /// A dispatcher verdict was applied to the fleet.
    fn task_assigned(&self, description: &str, details: serde_json::Value) {
        self.record(
            JournalEvent::new(JournalKind::TaskAssigned, description).with_details(details),
        );
    }

    /// Pipeline error.
    fn error(&self, description: &str) {
        self.record(JournalEvent::new(JournalKind::Error, description));
    }
}

/// Shared atomic counters for journal implementations.
#[derive(Debug, Default)]
pub struct Counters {
    bus_rx: AtomicU64,
    bus_tx: AtomicU64,
    dispatch_tx: AtomicU64,
    dispatch_rx: AtomicU64,
    tasks_assigned: AtomicU64,
    errors: AtomicU64,
}

impl Counters {
    /// Count one event of the given kind.
    pub fn tally(&self, kind: JournalKind) {
        let counter = match kind {
            JournalKind::BusRx => &self.bus_rx,
            JournalKind::BusTx => &self.bus_tx,
            JournalKind::DispatchTx => &self.dispatch_tx,
            JournalKind::DispatchRx => &self.dispatch_rx,
            JournalKind::TaskAssigned => &self.tasks_assigned,
            JournalKind::Error => &self.errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot the totals.
    pub fn summary(&self) -> JournalSummary {
        JournalSummary {
            bus_rx: self.bus_rx.load(Ordering::Relaxed),
            bus_tx: self.bus_tx.load(Ordering::Relaxed),
            dispatch_tx: self.dispatch_tx.load(Ordering::Relaxed),
            dispatch_rx: self.dispatch_rx.load(Ordering::Relaxed),
            tasks_assigned: self.tasks_assigned.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Journal that keeps counters but writes nothing.
#[derive(Debug, Default)]
pub struct NoopJournal {
    counters: Counters,
}

impl NoopJournal {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Journal for NoopJournal {
    fn record(&self, event: JournalEvent) {
        self.counters.tally(event.kind);
    }

    fn finish(&self) -> JournalSummary {
        self.counters.summary()
    }
}
