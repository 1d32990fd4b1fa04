use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishCounters {
    pub published: u64,
    pub errors: u64,
}

/// In-process publish counters labeled by routing key.
#[derive(Debug, Default)]
pub struct PublishMetrics {
    counters: Mutex<HashMap<&'static str, PublishCounters>>,
}

impl PublishMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_published(&self, routing_key: &'static str) {
        self.counters.lock().entry(routing_key).or_default().published += 1;
    }

    pub fn record_error(&self, routing_key: &'static str) {
        self.counters.lock().entry(routing_key).or_default().errors += 1;
    }

    pub fn published(&self, routing_key: &str) -> u64 {
        self.counters
            .lock()
            .get(routing_key)
            .map_or(0, |counters| counters.published)
    }

    pub fn errors(&self, routing_key: &str) -> u64 {
        self.counters
            .lock()
            .get(routing_key)
            .map_or(0, |counters| counters.errors)
    }

    /// Sorted copy of every counter recorded so far.
    pub fn snapshot(&self) -> BTreeMap<&'static str, PublishCounters> {
        self.counters
            .lock()
            .iter()
            .map(|(key, counters)| (*key, *counters))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_kept_per_key() {
        let metrics = PublishMetrics::new();
        metrics.record_published("agreement.created");
        metrics.record_published("agreement.created");
        metrics.record_error("agreement.accepted");

        assert_eq!(metrics.published("agreement.created"), 2);
        assert_eq!(metrics.errors("agreement.created"), 0);
        assert_eq!(metrics.errors("agreement.accepted"), 1);
        assert_eq!(metrics.published("notification.overdue_alert"), 0);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(
            snapshot["agreement.accepted"],
            PublishCounters { published: 0, errors: 1 }
        );
    }
}
