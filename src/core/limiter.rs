//! Counting limiter for concurrently running git processes.
//!
//! One limiter is created per bootstrap and injected into every runner that
//! should share the cap. Acquisition blocks until a slot frees or the caller's
//! deadline passes; the returned [`SlotGuard`] gives the slot back on drop, so
//! release happens on every exit path including timeouts and panics.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

#[derive(Debug, Default)]
struct Slots {
    in_use: usize,
    peak: usize,
}

#[derive(Debug)]
pub struct ConcurrencyLimiter {
    capacity: usize,
    slots: Mutex<Slots>,
    freed: Condvar,
}

impl ConcurrencyLimiter {
    pub const DEFAULT_CAPACITY: usize = 4;

    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            slots: Mutex::new(Slots::default()),
            freed: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_use(&self) -> usize {
        self.lock().in_use
    }

    /// Highest number of slots ever held at once.
    pub fn peak(&self) -> usize {
        self.lock().peak
    }

    /// Wait for a slot until `deadline`. Returns `None` if the deadline passes first.
    pub fn acquire_until(&self, deadline: Instant) -> Option<SlotGuard<'_>> {
        let mut slots = self.lock();
        while slots.in_use >= self.capacity {
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, _) = self
                .freed
                .wait_timeout(slots, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            slots = guard;
        }
        slots.in_use += 1;
        slots.peak = slots.peak.max(slots.in_use);
        Some(SlotGuard { limiter: self })
    }

    /// Take a slot only if one is free right now.
    pub fn try_acquire(&self) -> Option<SlotGuard<'_>> {
        let mut slots = self.lock();
        if slots.in_use >= self.capacity {
            return None;
        }
        slots.in_use += 1;
        slots.peak = slots.peak.max(slots.in_use);
        Some(SlotGuard { limiter: self })
    }

    fn release(&self) {
        let mut slots = self.lock();
        slots.in_use = slots.in_use.saturating_sub(1);
        drop(slots);
        self.freed.notify_one();
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ConcurrencyLimiter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

/// A held slot. Dropping it releases the slot.
#[must_use = "the slot is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct SlotGuard<'a> {
    limiter: &'a ConcurrencyLimiter,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.limiter.release();
    }
}
