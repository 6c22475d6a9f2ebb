//! Process-wide pseudo clock.
//! Stands in for wall-clock time so auction windows are reproducible.
// region:    --- Imports
use crate::auction::model::Tick;
use crate::error::Violation;
use std::sync::atomic::{AtomicI64, Ordering};
// endregion: --- Imports

// region:    --- Pseudo Clock
/// Forward-only check shared by every clock backend.
pub fn check_forward(current: Tick, requested: Tick) -> Result<(), Violation> {
    if requested <= current {
        return Err(Violation::NonMonotonicTime { current, requested });
    }
    Ok(())
}

#[derive(Debug)]
pub struct PseudoClock {
    now: AtomicI64,
}

impl PseudoClock {
    pub fn new(initial: Tick) -> Self {
        Self {
            now: AtomicI64::new(initial),
        }
    }

    pub fn read(&self) -> Tick {
        self.now.load(Ordering::Acquire)
    }

    /// Moves the clock to `requested` and returns the prior reading.
    /// A non-forward value leaves the clock untouched.
    pub fn advance(&self, requested: Tick) -> Result<Tick, Violation> {
        let mut current = self.read();
        loop {
            check_forward(current, requested)?;
            match self.now.compare_exchange_weak(
                current,
                requested,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(previous) => return Ok(previous),
                Err(observed) => current = observed,
            }
        }
    }

    /// Single compare-and-set attempt. Returns false when `expected` is stale.
    pub fn compare_and_set(&self, expected: Tick, requested: Tick) -> bool {
        self.now
            .compare_exchange(expected, requested, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for PseudoClock {
    fn default() -> Self {
        Self::new(0)
    }
}
// endregion: --- Pseudo Clock
