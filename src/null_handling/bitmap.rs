// --- IN: src/null_handling/bitmap.rs ---

//! Pure, stateless helpers for reading packed validity bitmaps, plus the
//! pool-accounted `ValidityBuilder` used by every column builder.

use arrow::buffer::{BooleanBuffer, NullBuffer};
use std::sync::Arc;

use crate::error::PostmanError;
use crate::memory::{MemoryPool, PoolBuffer};
use crate::utils::bitmap_len;

//==================================================================================
// 1. Read Helpers
//==================================================================================

/// Returns `true` if bit `index` is set (LSB-first). Bits past the end read as unset.
pub fn is_valid(bitmap: &[u8], index: usize) -> bool {
    bitmap
        .get(index / 8)
        .map(|byte| byte & (1u8 << (index % 8)) != 0)
        .unwrap_or(false)
}

/// Counts clear bits among the first `len` bits of `bitmap`.
pub fn count_nulls(bitmap: &[u8], len: usize) -> usize {
    (0..len).filter(|&i| !is_valid(bitmap, i)).count()
}

//==================================================================================
// 2. ValidityBuilder
//==================================================================================

/// Accumulates one validity bit per appended element.
///
/// The packed bytes always match the Arrow layout, so `as_bytes()` can be handed
/// across the runtime boundary as-is.
#[derive(Debug)]
pub struct ValidityBuilder {
    bytes: PoolBuffer<u8>,
    len: usize,
    null_count: usize,
}

impl ValidityBuilder {
    pub fn new(pool: Arc<dyn MemoryPool>) -> Self {
        Self {
            bytes: PoolBuffer::new(pool),
            len: 0,
            null_count: 0,
        }
    }

    /// Creates a builder with room for `bits` bits claimed up front.
    pub fn with_capacity(bits: usize, pool: Arc<dyn MemoryPool>) -> Result<Self, PostmanError> {
        Ok(Self {
            bytes: PoolBuffer::with_capacity(bitmap_len(bits), pool)?,
            len: 0,
            null_count: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn null_count(&self) -> usize {
        self.null_count
    }

    /// The packed bitmap, `ceil(len / 8)` bytes long.
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_slice()
    }

    /// Makes sure `additional` more bits can be appended without further growth.
    pub fn reserve(&mut self, additional: usize) -> Result<(), PostmanError> {
        let needed = bitmap_len(self.len + additional);
        self.bytes.grow_for(needed.saturating_sub(self.bytes.len()))
    }

    /// Appends one bit: `true` for a present value, `false` for a null.
    pub fn append(&mut self, valid: bool) -> Result<(), PostmanError> {
        let bit = self.len % 8;
        if bit == 0 {
            self.bytes.push(0)?;
        }
        if valid {
            if let Some(byte) = self.bytes.last_mut() {
                *byte |= 1u8 << bit;
            }
        } else {
            self.null_count += 1;
        }
        self.len += 1;
        Ok(())
    }

    pub fn seal(&mut self) -> Result<(), PostmanError> {
        self.bytes.seal()
    }

    /// Freezes the bitmap into a `NullBuffer`, or `None` if every bit is set.
    ///
    /// An all-valid bitmap is dropped here (and its pool claim released): the
    /// receiving side treats a missing bitmap as "every element present".
    pub fn finish(self) -> Option<NullBuffer> {
        if self.null_count == 0 {
            return None;
        }
        let booleans = BooleanBuffer::new(self.bytes.into_buffer(), 0, self.len);
        Some(NullBuffer::new(booleans))
    }
}
