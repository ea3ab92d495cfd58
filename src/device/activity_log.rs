//! Bounded activity log shared with API clients.
//!
//! Every entry is also mirrored to the process logger.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Fixed-capacity FIFO of [`LogEntry`]; the oldest entry is evicted first.
pub struct ActivityLog {
    capacity: usize,
    entries: Mutex<VecDeque<LogEntry>>,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn push(&self, timestamp: DateTime<Utc>, message: impl Into<String>) {
        let message = message.into();
        log::info!("[Activity] {}", message);

        let mut entries = self.entries.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(LogEntry { timestamp, message });
    }

    /// Snapshot of the buffered history, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest_first() {
        let log = ActivityLog::new(3);
        let now = Utc::now();
        for i in 0..5 {
            log.push(now, format!("entry {}", i));
        }

        let messages: Vec<_> = log.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["entry 2", "entry 3", "entry 4"]);
    }

    #[test]
    fn test_zero_capacity_keeps_latest_entry() {
        let log = ActivityLog::new(0);
        assert!(log.entries().is_empty());
        log.push(Utc::now(), "a");
        log.push(Utc::now(), "b");
        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "b");
    }
}
