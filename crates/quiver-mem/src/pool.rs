//! A fixed-capacity byte pool and the reservations drawn from it.
//!
//! A `Reservation` gives its bytes back when dropped, so an operator that fails
//! halfway through accumulating state never leaks accounting.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use quiver_core::budget::{BudgetGuard, MemoryBudget};

use crate::error::{Error, Result};

#[derive(Debug)]
struct Counters {
    capacity: usize,
    used: AtomicUsize,
    peak: AtomicUsize,
}

impl Counters {
    /// Add `bytes` to `used` unless that crosses `capacity`.
    fn grow(&self, bytes: usize) -> bool {
        let grown = self
            .used
            .fetch_update(Ordering::AcqRel, Ordering::Relaxed, |used| {
                used.checked_add(bytes).filter(|next| *next <= self.capacity)
            });
        match grown {
            Ok(prev) => {
                let now = prev + bytes;
                let peak = self.peak.fetch_max(now, Ordering::Relaxed).max(now);
                tracing::trace!(used_bytes = now, peak_bytes = peak, "memory reserved");
                true
            }
            Err(_) => false,
        }
    }

    fn shrink(&self, bytes: usize) {
        self.used.fetch_sub(bytes, Ordering::AcqRel);
    }

    fn used(&self) -> usize {
        self.used.load(Ordering::Relaxed)
    }

    fn exceeded(&self, tag: &'static str, requested: usize) -> Error {
        Error::BudgetExceeded {
            tag,
            requested,
            capacity: self.capacity,
            used: self.used(),
        }
    }
}

/// Memory cap shared by every blocking operator of a plan.
///
/// Cloning is cheap and all clones draw from the same pool.
#[derive(Clone, Debug)]
pub struct MemoryPool {
    counters: Arc<Counters>,
}

impl MemoryPool {
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            counters: Arc::new(Counters {
                capacity: capacity_bytes,
                used: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
        }
    }

    pub fn capacity_bytes(&self) -> usize {
        self.counters.capacity
    }

    pub fn used_bytes(&self) -> usize {
        self.counters.used()
    }

    /// High-water mark of `used_bytes` since the pool was created.
    pub fn peak_bytes(&self) -> usize {
        self.counters.peak.load(Ordering::Relaxed)
    }

    /// Reserve `bytes` for `tag`, failing with `BudgetExceeded` past the cap.
    pub fn acquire(&self, bytes: usize, tag: &'static str) -> Result<Reservation> {
        MemoryBudget::try_acquire(self, bytes, tag)
            .ok_or_else(|| self.counters.exceeded(tag, bytes))
    }
}

impl MemoryBudget for MemoryPool {
    type Guard = Reservation;

    fn try_acquire(&self, bytes: usize, tag: &'static str) -> Option<Reservation> {
        if bytes > 0 && !self.counters.grow(bytes) {
            return None;
        }
        Some(Reservation {
            counters: Arc::clone(&self.counters),
            bytes,
            tag,
        })
    }

    fn capacity_bytes(&self) -> usize {
        self.counters.capacity
    }

    fn used_bytes(&self) -> usize {
        self.counters.used()
    }
}

/// Bytes held against a `MemoryPool`.
#[derive(Debug)]
pub struct Reservation {
    counters: Arc<Counters>,
    bytes: usize,
    tag: &'static str,
}

impl Reservation {
    /// Move the reservation to `new_bytes`. Returns false, leaving it
    /// unchanged, if growing would cross the cap.
    pub fn try_resize(&mut self, new_bytes: usize) -> bool {
        if new_bytes > self.bytes {
            if !self.counters.grow(new_bytes - self.bytes) {
                return false;
            }
        } else {
            self.counters.shrink(self.bytes - new_bytes);
        }
        self.bytes = new_bytes;
        true
    }

    /// `try_resize` that reports the shortfall.
    pub fn resize(&mut self, new_bytes: usize) -> Result<()> {
        if self.try_resize(new_bytes) {
            Ok(())
        } else {
            Err(self.counters.exceeded(self.tag, new_bytes - self.bytes))
        }
    }
}

impl BudgetGuard for Reservation {
    fn bytes(&self) -> usize {
        self.bytes
    }

    fn tag(&self) -> &'static str {
        self.tag
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.bytes > 0 {
            self.counters.shrink(self.bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reservations_return_bytes_on_drop() {
        let pool = MemoryPool::new(100);
        let a = pool.acquire(60, "a").unwrap();
        assert_eq!(pool.used_bytes(), 60);
        assert!(pool.acquire(50, "b").is_err());
        drop(a);
        assert_eq!(pool.used_bytes(), 0);
        assert_eq!(pool.peak_bytes(), 60);
        assert_eq!(pool.remaining_bytes(), 100);
    }

    #[test]
    fn resize_grows_within_capacity() {
        let pool = MemoryPool::new(100);
        let mut r = pool.acquire(10, "agg").unwrap();
        r.resize(90).unwrap();
        assert_eq!(pool.used_bytes(), 90);
        let err = r.resize(120).unwrap_err();
        assert!(matches!(err, Error::BudgetExceeded { requested: 30, tag: "agg", .. }));
        assert_eq!(r.bytes(), 90);
        assert!(r.try_resize(5));
        assert_eq!(pool.used_bytes(), 5);
        assert_eq!(pool.peak_bytes(), 90);
    }

    #[test]
    fn zero_byte_reservation_always_succeeds() {
        let pool = MemoryPool::new(0);
        let r = pool.acquire(0, "empty").unwrap();
        assert_eq!(r.bytes(), 0);
        assert_eq!(r.tag(), "empty");
    }
}
