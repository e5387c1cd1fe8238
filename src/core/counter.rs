//! core::counter
//!
//! Race-free visit counter shared by request handlers.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counts page visits.
///
/// Handlers must use the value returned by [`VisitCounter::record_visit`]
/// rather than reading [`VisitCounter::current`] afterwards, which may
/// already include visits from other handlers.
#[derive(Debug, Default)]
pub struct VisitCounter {
    visits: AtomicU64,
}

impl VisitCounter {
    /// Create a counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment and return the new total in one atomic step.
    pub fn record_visit(&self) -> u64 {
        self.visits.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Current total.
    pub fn current(&self) -> u64 {
        self.visits.load(Ordering::Acquire)
    }
}
