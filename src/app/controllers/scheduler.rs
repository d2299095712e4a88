//! Timing helpers for the composer: the debounced save and the window in
//! which storage notifications caused by our own writes are ignored.
//!
//! Both take `now` from the caller instead of reading the clock, which keeps
//! them free of I/O and deterministic under test.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::app::domain::document::DocumentId;

/// A single cancellable deadline. Scheduling again replaces the previous
/// deadline, so a burst of edits collapses into one save.
#[derive(Debug)]
pub struct SaveScheduler {
    quiet: Duration,
    deadline: Option<Instant>,
}

impl SaveScheduler {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            deadline: None,
        }
    }

    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.quiet);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Returns true exactly once when the deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Documents we wrote recently. Storage notifications for them are ignored
/// until the entry expires.
#[derive(Debug)]
pub struct WriteSuppression {
    ttl: Duration,
    entries: HashMap<DocumentId, Instant>,
}

impl WriteSuppression {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn suppress(&mut self, id: DocumentId, now: Instant) {
        self.entries.insert(id, now + self.ttl);
    }

    /// Whether a notification for `id` arriving at `now` was caused by us.
    /// Expired entries are dropped along the way.
    pub fn is_suppressed(&mut self, id: &DocumentId, now: Instant) -> bool {
        self.entries.retain(|_, expiry| now < *expiry);
        self.entries.contains_key(id)
    }

    pub fn active_count(&self) -> usize {
        self.entries.len()
    }
}
