//! This module provides the explicit allocator handle threaded through every
//! `ColumnBuilder`.
//!
//! Instead of one process-wide default pool, callers pass an `Arc<dyn MemoryPool>`
//! into each builder. The pool accounts every buffer growth before it happens, so
//! a `BoundedPool` can refuse growth deterministically and surface an
//! `AllocationFailure` to the builder. Finished buffers carry their `Reservation`
//! into the Arrow `Buffer` they become, so the pool is credited back exactly when
//! the last reference to that memory is dropped.

//==================================================================================
// 1. Module Declarations
//==================================================================================
pub mod buffer;
pub mod pool;

//==================================================================================
// 2. Public API Re-exports
//==================================================================================
pub use self::buffer::{PoolBuffer, MIN_BUFFER_BYTES};
pub use self::pool::{default_pool, BoundedPool, MemoryPool, Reservation, UnboundedPool};
