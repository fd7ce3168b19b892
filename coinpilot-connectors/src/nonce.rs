//! Nonce source for authenticated requests.
//!
//! The exchange rejects any nonce that is not greater than the last one it
//! saw for the same key. `MonotonicNonce` tracks wall-clock milliseconds and
//! bumps by one whenever the clock has not moved (or moved backwards), so
//! every value it hands out is strictly greater than the previous one, also
//! across threads sharing the instance.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

/// Trait for obtaining current time, enabling testability.
pub trait Clock: Send + Sync {
    /// Returns current time in milliseconds since Unix epoch.
    fn now_ms(&self) -> u64;
}

/// System clock implementation using real time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
    }
}

/// Source of strictly increasing nonces, injected into the REST client.
pub trait NonceSource: Send + Sync {
    /// Next nonce; strictly greater than every value returned before.
    fn next_nonce(&self) -> u64;
}

/// Clock-tracking monotonic nonce generator.
///
/// Returns `max(last + 1, clock.now_ms())`. Thread-safe via CAS loop.
pub struct MonotonicNonce<C: Clock> {
    /// Last issued nonce.
    last: AtomicU64,
    /// Clock source for current time.
    clock: C,
}

impl<C: Clock> MonotonicNonce<C> {
    /// Creates a generator with the given clock.
    pub fn new(clock: C) -> Self {
        Self {
            last: AtomicU64::new(0),
            clock,
        }
    }

    /// Last value handed out (0 before the first call).
    pub fn last(&self) -> u64 {
        self.last.load(Ordering::Acquire)
    }
}

impl MonotonicNonce<SystemClock> {
    /// Creates a generator backed by the system clock.
    pub fn with_system_clock() -> Self {
        Self::new(SystemClock)
    }
}

impl Default for MonotonicNonce<SystemClock> {
    fn default() -> Self {
        Self::with_system_clock()
    }
}

impl<C: Clock> NonceSource for MonotonicNonce<C> {
    fn next_nonce(&self) -> u64 {
        let target = self.clock.now_ms();

        loop {
            let current = self.last.load(Ordering::Acquire);
            let next_val = current.saturating_add(1).max(target);

            match self.last.compare_exchange_weak(
                current,
                next_val,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return next_val,
                Err(_) => continue,
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
