//! Pending-request table: the request/response multiplexer state.
//!
//! Every in-flight command owns one slot, keyed by its correlation id.
//! A slot resolves exactly once: with the matching reply, with the
//! controller's reported error, or with `Disconnected` at teardown,
//! whichever happens first. The table is owned by the connection task
//! alone; callers reach it only through messages.

use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::error::{BotwireError, Result};
use crate::protocol::EVENT_CORRELATION_ID;

/// Completion slot for one in-flight command.
pub type ReplySlot = oneshot::Sender<Result<Bytes>>;

/// Table of commands awaiting their reply.
pub struct PendingTable {
    slots: HashMap<u32, ReplySlot>,
    next_id: u32,
}

impl PendingTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
            next_id: 1,
        }
    }

    /// Register a new in-flight command.
    ///
    /// Allocates a correlation id unused by any pending entry (monotonic
    /// counter; wraparound skips id 0 and ids still in flight) and files
    /// the completion slot under it.
    pub fn register(&mut self, slot: ReplySlot) -> u32 {
        loop {
            let id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1);
            if id == EVENT_CORRELATION_ID || self.slots.contains_key(&id) {
                continue;
            }

            self.slots.insert(id, slot);
            return id;
        }
    }

    /// Resolve the command with this correlation id.
    ///
    /// Returns `false` when no such command is pending, a protocol
    /// anomaly the caller should record rather than a failure.
    pub fn resolve(&mut self, id: u32, result: Result<Bytes>) -> bool {
        match self.slots.remove(&id) {
            // the caller may have given up (dropped the receiver); that
            // is not an anomaly, the reply id did match
            Some(slot) => {
                let _ = slot.send(result);
                true
            }
            None => false,
        }
    }

    /// Fail every outstanding command with `Disconnected`.
    pub fn fail_all(&mut self) {
        for (_, slot) in self.slots.drain() {
            let _ = slot.send(Err(BotwireError::Disconnected));
        }
    }

    /// Number of commands currently awaiting a reply.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if no commands are in flight.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Default for PendingTable {
    fn default() -> Self {
        Self::new()
    }
}
