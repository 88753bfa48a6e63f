// In: src/memory/buffer.rs

//! A growable, pool-accounted buffer that finishes into an Arrow `Buffer`
//! without copying.

use arrow::buffer::Buffer;
use bytemuck::Pod;
use std::mem::size_of;
use std::panic::RefUnwindSafe;
use std::ptr::NonNull;
use std::sync::Arc;

use super::pool::{MemoryPool, Reservation};
use crate::error::PostmanError;

/// Smallest capacity, in bytes, a buffer grows to. Also the padding unit used
/// when a buffer is sealed (Arrow recommends 64-byte padded buffers).
pub const MIN_BUFFER_BYTES: usize = 64;

/// An append-only typed buffer whose capacity is claimed from a `MemoryPool`.
///
/// Capacity grows in powers of two. Every growth is claimed from the pool before
/// the allocation happens, so a refusal leaves the buffer contents untouched.
#[derive(Debug)]
pub struct PoolBuffer<T: Pod> {
    data: Vec<T>,
    reservation: Reservation,
}

/// Keeps the backing `Vec` and its pool claim alive for as long as Arrow
/// references the memory.
struct PooledAllocation<T: Pod> {
    _data: Vec<T>,
    _reservation: Reservation,
}

impl<T: Pod + Send + Sync + RefUnwindSafe> PoolBuffer<T> {
    pub fn new(pool: Arc<dyn MemoryPool>) -> Self {
        Self {
            data: Vec::new(),
            reservation: Reservation::new(pool),
        }
    }

    /// Creates a buffer with exactly `capacity` elements claimed up front.
    pub fn with_capacity(capacity: usize, pool: Arc<dyn MemoryPool>) -> Result<Self, PostmanError> {
        let mut buffer = Self::new(pool);
        if capacity > 0 {
            buffer.reserve_exact(capacity)?;
        }
        Ok(buffer)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn last(&self) -> Option<&T> {
        self.data.last()
    }

    pub fn last_mut(&mut self) -> Option<&mut T> {
        self.data.last_mut()
    }

    /// Bytes currently claimed from the pool for this buffer.
    #[cfg(test)]
    pub(crate) fn reserved_bytes(&self) -> usize {
        self.reservation.size()
    }

    /// Ensures room for `additional` more elements, growing to the next power of two.
    pub fn grow_for(&mut self, additional: usize) -> Result<(), PostmanError> {
        let needed = self.data.len().checked_add(additional).ok_or_else(|| {
            PostmanError::AllocationFailure("element count overflows usize".to_string())
        })?;
        if needed <= self.claimed_capacity() {
            return Ok(());
        }
        let min_elems = (MIN_BUFFER_BYTES / size_of::<T>()).max(1);
        let target = needed
            .checked_next_power_of_two()
            .ok_or_else(|| {
                PostmanError::AllocationFailure(format!(
                    "cannot round {} elements up to a power of two",
                    needed
                ))
            })?
            .max(min_elems);
        self.reserve_exact(target)
    }

    pub fn push(&mut self, value: T) -> Result<(), PostmanError> {
        self.grow_for(1)?;
        self.data.push(value);
        Ok(())
    }

    pub fn extend_from_slice(&mut self, values: &[T]) -> Result<(), PostmanError> {
        self.grow_for(values.len())?;
        self.data.extend_from_slice(values);
        Ok(())
    }

    /// Pads the claimed capacity up to a multiple of `MIN_BUFFER_BYTES`.
    ///
    /// This is the last growth a buffer sees before it is frozen, and it can fail
    /// like any other growth. A capacity that is already padded is left alone.
    pub fn seal(&mut self) -> Result<(), PostmanError> {
        let len_bytes = self.data.len() * size_of::<T>();
        let claimed = self.reservation.size().max(len_bytes);
        let padded_bytes = claimed
            .checked_next_multiple_of(MIN_BUFFER_BYTES)
            .ok_or_else(|| {
                PostmanError::AllocationFailure(format!(
                    "cannot pad {} bytes to a multiple of {}",
                    claimed, MIN_BUFFER_BYTES
                ))
            })?;
        if self.reservation.size() == padded_bytes {
            return Ok(());
        }
        self.reserve_exact(padded_bytes.div_ceil(size_of::<T>()))
    }

    /// Freezes the buffer into an Arrow `Buffer` without copying the elements.
    pub fn into_buffer(self) -> Buffer {
        let len_bytes = self.data.len() * size_of::<T>();
        // `Vec::as_ptr` is never null; an empty Vec yields an aligned dangling pointer.
        let ptr = NonNull::new(self.data.as_ptr() as *mut u8).unwrap_or(NonNull::dangling());
        let owner = Arc::new(PooledAllocation {
            _data: self.data,
            _reservation: self.reservation,
        });
        // SAFETY: `ptr` points at `len_bytes` initialised bytes owned by the Vec that
        // now lives inside `owner`. Moving a Vec does not move its heap allocation,
        // and the allocation is never mutated again.
        unsafe { Buffer::from_custom_allocation(ptr, len_bytes, owner) }
    }

    fn claimed_capacity(&self) -> usize {
        self.reservation.size() / size_of::<T>()
    }

    fn reserve_exact(&mut self, capacity: usize) -> Result<(), PostmanError> {
        let bytes = capacity.checked_mul(size_of::<T>()).ok_or_else(|| {
            PostmanError::AllocationFailure(format!(
                "{} elements of {} bytes overflow usize",
                capacity,
                size_of::<T>()
            ))
        })?;
        let previous = self.reservation.size();
        self.reservation.try_resize(bytes)?;
        let additional = capacity.saturating_sub(self.data.len());
        if let Err(e) = self.data.try_reserve_exact(additional) {
            // Give the claim back; the Vec did not grow.
            self.reservation.try_resize(previous)?;
            return Err(PostmanError::AllocationFailure(format!(
                "system allocator refused {} bytes: {}",
                bytes, e
            )));
        }
        log::trace!(
            "pool buffer grew to {} elements ({} bytes claimed)",
            capacity,
            bytes
        );
        Ok(())
    }
}

//==================================================================================
// Unit Tests
//==================================================================================
