//! Bounded log of recent command usage

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::entities::UsageEntry;

/// Only the most recent invocations are kept.
pub const USAGE_LOG_CAPACITY: usize = 100;

/// FIFO ring of usage entries, oldest first
pub struct UsageLog {
    entries: Mutex<VecDeque<UsageEntry>>,
    capacity: usize,
}

impl UsageLog {
    pub fn new() -> Self {
        Self::with_capacity(USAGE_LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    fn entries(&self) -> MutexGuard<'_, VecDeque<UsageEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(&self, entry: UsageEntry) {
        let mut entries = self.entries();
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Copy of the log, oldest entry first
    pub fn snapshot(&self) -> Vec<UsageEntry> {
        self.entries().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for UsageLog {
    fn default() -> Self {
        Self::new()
    }
}
