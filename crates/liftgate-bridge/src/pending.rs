//! Correlation engine: the pending-request table.
//!
//! Outstanding dispatcher requests are keyed by their CoAP token. The
//! table is a bounded dense vector: registration appends, matching removes
//! and shifts, sweeping drains expired records in order. All operations
//! are O(N) linear scans with byte-exact token comparison; N is small
//! (default 32) and the single-owner bridge task makes every operation
//! atomic from the caller's perspective.

use std::time::Instant;

use liftgate_codec::{Assignment, ErrorFrameCode, RequestClass};
use tokio::sync::oneshot;

/// Outcome delivered to a direct-origin caller.
#[derive(Debug)]
pub enum DirectOutcome {
    /// The dispatcher assigned a cabin and the fleet was updated.
    Assigned(Assignment),
    /// The request failed with the given typed code.
    Failed(ErrorFrameCode),
}

/// Where the reply to a request must go.
#[derive(Debug)]
pub enum RequestOrigin {
    /// The request came in on the local bus; the answer is a bus frame.
    Bus {
        /// Identifier of the causing frame (its low byte travels on error
        /// frames).
        frame_id: u16,
    },
    /// The request was submitted in-process; the answer goes down a
    /// oneshot channel.
    Direct {
        reply: oneshot::Sender<DirectOutcome>,
    },
}

impl RequestOrigin {
    /// The causing frame id, if the request originated on the bus.
    pub fn frame_id(&self) -> Option<u16> {
        match self {
            Self::Bus { frame_id } => Some(*frame_id),
            Self::Direct { .. } => None,
        }
    }
}

/// One outstanding dispatcher request.
#[derive(Debug)]
pub struct PendingRequest {
    /// Correlation token (1-8 strong-random bytes). Owned, so insertion
    /// deep-copies by construction.
    pub token: Vec<u8>,
    /// Which dispatcher resource the request was posted to.
    pub class: RequestClass,
    /// Where the reply must go.
    pub origin: RequestOrigin,
    /// The floor the reply correlates state updates against (hall-call
    /// origin, cabin target, or emergency floor).
    pub reference_floor: i32,
    /// Dispatcher resource path segment.
    pub path: &'static str,
    /// Exact payload bytes; retries resend them verbatim.
    pub payload: Vec<u8>,
    /// When the request was first registered.
    pub created_at: Instant,
    /// Instant after which the request counts as lost.
    pub deadline: Instant,
    /// Re-sends left before the request fails for good.
    pub retries_remaining: u32,
}

/// Bounded table of outstanding requests.
#[derive(Debug)]
pub struct PendingTable {
    entries: Vec<PendingRequest>,
    capacity: usize,
}

impl PendingTable {
    /// Create a table admitting at most `capacity` records.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Number of outstanding records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no records are outstanding.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the table is at capacity.
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Whether a live record carries this exact token.
    pub fn contains_token(&self, token: &[u8]) -> bool {
        self.entries.iter().any(|r| r.token == token)
    }

    /// Register an outstanding request.
    ///
    /// # Errors
    ///
    /// When the table is full the record is handed back so the caller can
    /// surface the failure to the request's origin.
    pub fn register(&mut self, record: PendingRequest) -> Result<(), PendingRequest> {
        if self.is_full() {
            return Err(record);
        }
        self.entries.push(record);
        Ok(())
    }

    /// Remove and return the record matching a token byte-for-byte.
    ///
    /// `None` is a legitimate outcome: late replies whose record already
    /// timed out, and replies to gateway-originated notifications, have no
    /// table entry.
    pub fn match_and_remove(&mut self, token: &[u8]) -> Option<PendingRequest> {
        let idx = self.entries.iter().position(|r| r.token == token)?;
        Some(self.entries.remove(idx))
    }

    /// Remove and return every record whose deadline has passed,
    /// preserving registration order.
    pub fn sweep(&mut self, now: Instant) -> Vec<PendingRequest> {
        let (expired, live): (Vec<_>, Vec<_>) = self
            .entries
            .drain(..)
            .partition(|r| r.deadline < now);
        self.entries = live;
        expired
    }

    /// Remove and return every record. Used at shutdown.
    pub fn drain_all(&mut self) -> Vec<PendingRequest> {
        self.entries.drain(..).collect()
    }
}
