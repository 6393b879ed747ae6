use std::sync::atomic::{AtomicU64, Ordering};

/// Counters bumped by the service loop, readable without blocking it.
#[derive(Debug, Default)]
pub struct StackStats {
    invalid_destination: AtomicU64,
    parsing_outer_error: AtomicU64,
    parsing_inner_error: AtomicU64,
    oversize: AtomicU64,
    transaction_timeout: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StackStatsSnapshot {
    pub invalid_destination: u64,
    pub parsing_outer_error: u64,
    pub parsing_inner_error: u64,
    pub oversize: u64,
    pub transaction_timeout: u64,
}

impl StackStats {
    pub fn bump(&self, stat: &'static str) {
        let counter = match stat {
            "invalid_destination" => &self.invalid_destination,
            "parsing_outer_error" => &self.parsing_outer_error,
            "parsing_inner_error" => &self.parsing_inner_error,
            "oversize" => &self.oversize,
            "transaction_timeout" => &self.transaction_timeout,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StackStatsSnapshot {
        StackStatsSnapshot {
            invalid_destination: self.invalid_destination.load(Ordering::Relaxed),
            parsing_outer_error: self.parsing_outer_error.load(Ordering::Relaxed),
            parsing_inner_error: self.parsing_inner_error.load(Ordering::Relaxed),
            oversize: self.oversize.load(Ordering::Relaxed),
            transaction_timeout: self.transaction_timeout.load(Ordering::Relaxed),
        }
    }
}
