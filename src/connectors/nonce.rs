//! Nonce generation for signed requests
//!
//! Exchanges reject nonces that do not increase, so every value handed out
//! is strictly greater than the previous one, even if the wall clock steps
//! backwards or two requests are signed within the same clock tick.

use std::sync::atomic::{AtomicU64, Ordering};

/// Clock resolution a backend expects its nonce in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceUnit {
    Seconds,
    Millis,
    Micros,
}

impl NonceUnit {
    fn now(&self) -> u64 {
        let now = chrono::Utc::now();
        let value = match self {
            NonceUnit::Seconds => now.timestamp(),
            NonceUnit::Millis => now.timestamp_millis(),
            NonceUnit::Micros => now.timestamp_micros(),
        };
        u64::try_from(value).unwrap_or(0)
    }
}

/// Monotonic nonce source, one per backend client.
///
/// Safe to share between concurrent signers: generation is a single
/// compare-and-swap loop, so no two callers ever observe the same value.
#[derive(Debug)]
pub struct NonceSource {
    unit: NonceUnit,
    last: AtomicU64,
}

impl NonceSource {
    pub fn new(unit: NonceUnit) -> Self {
        Self {
            unit,
            last: AtomicU64::new(0),
        }
    }

    pub fn unit(&self) -> NonceUnit {
        self.unit
    }

    /// Next nonce: the current clock reading, or `last + 1` when the clock
    /// has not advanced past the previous value.
    pub fn next(&self) -> u64 {
        let now = self.unit.now();
        let mut last = self.last.load(Ordering::Acquire);
        loop {
            let candidate = now.max(last.saturating_add(1));
            match self
                .last
                .compare_exchange_weak(last, candidate, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return candidate,
                Err(observed) => last = observed,
            }
        }
    }

    /// Seed the source so the next value is strictly above `value`.
    pub fn advance_past(&self, value: u64) {
        self.last.fetch_max(value, Ordering::AcqRel);
    }
}
