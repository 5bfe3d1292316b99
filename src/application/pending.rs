use crate::domain::hash_lock::{Condition, Fulfillment};
use crate::domain::ports::PolicyArc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Secret and authorization policy of a payment waiting for its loopback.
#[derive(Clone)]
pub struct PendingEntry {
    pub fulfillment: Fulfillment,
    pub policy: PolicyArc,
}

/// Outstanding payments keyed by execution condition.
///
/// Entries are single-use: whoever resolves an entry takes it out of the table.
#[derive(Default, Clone)]
pub struct PendingTable {
    entries: Arc<Mutex<HashMap<Condition, PendingEntry>>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `fulfillment` under its condition. The entry is removed when
    /// the returned guard drops, unless it was taken earlier.
    pub fn register(&self, fulfillment: Fulfillment, policy: PolicyArc) -> PendingGuard {
        let condition = fulfillment.condition();
        self.entries.lock().insert(
            condition,
            PendingEntry {
                fulfillment,
                policy,
            },
        );
        PendingGuard {
            table: self.clone(),
            condition,
        }
    }

    pub fn take(&self, condition: &Condition) -> Option<PendingEntry> {
        self.entries.lock().remove(condition)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Removes its pending entry on every exit path of a payment.
pub struct PendingGuard {
    table: PendingTable,
    condition: Condition,
}

impl PendingGuard {
    pub fn condition(&self) -> Condition {
        self.condition
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.table.take(&self.condition);
    }
}
