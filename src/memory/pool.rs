// In: src/memory/pool.rs

use std::fmt;
use std::panic::RefUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::PostmanError;

//==================================================================================
// 1. The MemoryPool Contract
//==================================================================================

/// An allocator handle that accounts for buffer memory before it is allocated.
///
/// Implementations must be cheap to call and thread-safe: a single pool may be
/// shared by every builder of a table, and reservations are released from
/// whichever thread drops the last reference to a finished buffer.
pub trait MemoryPool: fmt::Debug + Send + Sync + RefUnwindSafe {
    /// Claims `additional` bytes, or fails with `AllocationFailure`.
    fn try_grow(&self, additional: usize) -> Result<(), PostmanError>;

    /// Returns `amount` previously claimed bytes to the pool.
    fn shrink(&self, amount: usize);

    /// Bytes currently claimed from this pool.
    fn reserved(&self) -> usize;

    /// The hard cap of this pool, if any.
    fn limit(&self) -> Option<usize> {
        None
    }
}

/// Returns a fresh unbounded pool, the equivalent of Arrow's default memory pool.
pub fn default_pool() -> Arc<dyn MemoryPool> {
    Arc::new(UnboundedPool::default())
}

//==================================================================================
// 2. Concrete Pools
//==================================================================================

/// A pool that never refuses growth but still tracks usage.
#[derive(Debug, Default)]
pub struct UnboundedPool {
    reserved: AtomicUsize,
}

impl MemoryPool for UnboundedPool {
    fn try_grow(&self, additional: usize) -> Result<(), PostmanError> {
        self.reserved.fetch_add(additional, Ordering::Relaxed);
        Ok(())
    }

    fn shrink(&self, amount: usize) {
        self.reserved.fetch_sub(amount, Ordering::Relaxed);
    }

    fn reserved(&self) -> usize {
        self.reserved.load(Ordering::Relaxed)
    }
}

/// A pool with a fixed byte budget. Growth beyond the budget is refused.
#[derive(Debug)]
pub struct BoundedPool {
    limit: usize,
    reserved: AtomicUsize,
}

impl BoundedPool {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            reserved: AtomicUsize::new(0),
        }
    }
}

impl MemoryPool for BoundedPool {
    fn try_grow(&self, additional: usize) -> Result<(), PostmanError> {
        self.reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current
                    .checked_add(additional)
                    .filter(|&next| next <= self.limit)
            })
            .map(|_| ())
            .map_err(|current| {
                PostmanError::AllocationFailure(format!(
                    "cannot grow by {} bytes: {} of {} bytes already reserved",
                    additional, current, self.limit
                ))
            })
    }

    fn shrink(&self, amount: usize) {
        self.reserved.fetch_sub(amount, Ordering::AcqRel);
    }

    fn reserved(&self) -> usize {
        self.reserved.load(Ordering::Acquire)
    }

    fn limit(&self) -> Option<usize> {
        Some(self.limit)
    }
}

//==================================================================================
// 3. Reservation (RAII accounting handle)
//==================================================================================

/// A claim of `size` bytes against a pool, returned to the pool on drop.
#[derive(Debug)]
pub struct Reservation {
    pool: Arc<dyn MemoryPool>,
    size: usize,
}

impl Reservation {
    pub fn new(pool: Arc<dyn MemoryPool>) -> Self {
        Self { pool, size: 0 }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Grows or shrinks the claim to exactly `new_size` bytes.
    /// On failure the claim is left unchanged.
    pub fn try_resize(&mut self, new_size: usize) -> Result<(), PostmanError> {
        if new_size > self.size {
            self.pool.try_grow(new_size - self.size)?;
        } else if new_size < self.size {
            self.pool.shrink(self.size - new_size);
        }
        self.size = new_size;
        Ok(())
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.size > 0 {
            self.pool.shrink(self.size);
        }
    }
}

//==================================================================================
// 4. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_pool_refuses_past_limit() {
        let pool = BoundedPool::new(100);
        pool.try_grow(64).unwrap();
        let err = pool.try_grow(64).unwrap_err();
        assert!(matches!(err, PostmanError::AllocationFailure(_)));
        // A refused request must not leak into the accounting.
        assert_eq!(pool.reserved(), 64);
        pool.try_grow(36).unwrap();
        assert_eq!(pool.reserved(), 100);
    }

    #[test]
    fn test_reservation_releases_on_drop() {
        let pool: Arc<dyn MemoryPool> = Arc::new(BoundedPool::new(1024));
        {
            let mut reservation = Reservation::new(pool.clone());
            reservation.try_resize(512).unwrap();
            assert_eq!(pool.reserved(), 512);
            reservation.try_resize(128).unwrap();
            assert_eq!(pool.reserved(), 128);
        }
        assert_eq!(pool.reserved(), 0);
    }

    #[test]
    fn test_failed_resize_keeps_previous_claim() {
        let pool: Arc<dyn MemoryPool> = Arc::new(BoundedPool::new(100));
        let mut reservation = Reservation::new(pool.clone());
        reservation.try_resize(80).unwrap();
        assert!(reservation.try_resize(200).is_err());
        assert_eq!(reservation.size(), 80);
        assert_eq!(pool.reserved(), 80);
    }

    #[test]
    fn test_unbounded_pool_tracks_usage() {
        let pool = default_pool();
        pool.try_grow(10).unwrap();
        pool.shrink(4);
        assert_eq!(pool.reserved(), 6);
        assert_eq!(pool.limit(), None);
    }
}
