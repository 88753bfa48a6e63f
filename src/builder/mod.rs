// In: src/builder/mod.rs

//! The Column Builder: accumulates one typed, nullable column incrementally and
//! finishes it into an immutable [`Column`].
//!
//! A builder moves through three states:
//!
//! ```text
//!   Open --finish()--> Finished      (appends fail with UseAfterFinish)
//!     \
//!      `--AllocationFailure--> Poisoned   (every call fails with BuilderPoisoned)
//! ```
//!
//! All buffers are claimed from the `MemoryPool` handed in at construction.

use arrow::array::{Array, ArrayRef, Float64Array, Int32Array, Int64Array, StringArray};
use arrow::buffer::{OffsetBuffer, ScalarBuffer};
use std::sync::Arc;

use crate::error::PostmanError;
use crate::memory::{MemoryPool, PoolBuffer};
use crate::null_handling::ValidityBuilder;
use crate::table::Column;
use crate::types::{ColumnType, Value};

//==================================================================================
// 1. Typed Value Storage
//==================================================================================

#[derive(Debug)]
enum ValueStore {
    Int32(PoolBuffer<i32>),
    Int64(PoolBuffer<i64>),
    Float64(PoolBuffer<f64>),
    Utf8 {
        offsets: PoolBuffer<i32>,
        data: PoolBuffer<u8>,
    },
}

impl ValueStore {
    fn new(
        column_type: ColumnType,
        capacity: usize,
        pool: &Arc<dyn MemoryPool>,
    ) -> Result<Self, PostmanError> {
        Ok(match column_type {
            ColumnType::Int32 => Self::Int32(PoolBuffer::with_capacity(capacity, pool.clone())?),
            ColumnType::Int64 => Self::Int64(PoolBuffer::with_capacity(capacity, pool.clone())?),
            ColumnType::Float64 => {
                Self::Float64(PoolBuffer::with_capacity(capacity, pool.clone())?)
            }
            ColumnType::Utf8 => {
                let mut offsets = PoolBuffer::with_capacity(capacity + 1, pool.clone())?;
                offsets.push(0)?;
                Self::Utf8 {
                    offsets,
                    data: PoolBuffer::new(pool.clone()),
                }
            }
        })
    }

    /// Claims room for one more element so the write that follows cannot fail halfway.
    fn reserve_one(&mut self, value_bytes: usize) -> Result<(), PostmanError> {
        match self {
            Self::Int32(values) => values.grow_for(1),
            Self::Int64(values) => values.grow_for(1),
            Self::Float64(values) => values.grow_for(1),
            Self::Utf8 { offsets, data } => {
                offsets.grow_for(1)?;
                data.grow_for(value_bytes)
            }
        }
    }

    fn push_value(&mut self, value: &Value) -> Result<(), PostmanError> {
        match (self, value) {
            (Self::Int32(values), Value::Int32(v)) => values.push(*v),
            (Self::Int64(values), Value::Int64(v)) => values.push(*v),
            (Self::Float64(values), Value::Float64(v)) => values.push(*v),
            (Self::Utf8 { offsets, data }, Value::Utf8(s)) => {
                let end = data
                    .len()
                    .checked_add(s.len())
                    .and_then(|end| i32::try_from(end).ok())
                    .ok_or_else(|| {
                        PostmanError::AllocationFailure(
                            "text data exceeds the i32 offset range".to_string(),
                        )
                    })?;
                data.extend_from_slice(s.as_bytes())?;
                offsets.push(end)
            }
            (store, value) => Err(PostmanError::type_mismatch(
                store.column_type(),
                value.type_name(),
            )),
        }
    }

    fn push_null(&mut self) -> Result<(), PostmanError> {
        match self {
            Self::Int32(values) => values.push(0),
            Self::Int64(values) => values.push(0),
            Self::Float64(values) => values.push(0.0),
            Self::Utf8 { offsets, .. } => {
                let last = offsets.last().copied().unwrap_or(0);
                offsets.push(last)
            }
        }
    }

    fn seal(&mut self) -> Result<(), PostmanError> {
        match self {
            Self::Int32(values) => values.seal(),
            Self::Int64(values) => values.seal(),
            Self::Float64(values) => values.seal(),
            Self::Utf8 { offsets, data } => {
                offsets.seal()?;
                data.seal()
            }
        }
    }

    fn column_type(&self) -> ColumnType {
        match self {
            Self::Int32(_) => ColumnType::Int32,
            Self::Int64(_) => ColumnType::Int64,
            Self::Float64(_) => ColumnType::Float64,
            Self::Utf8 { .. } => ColumnType::Utf8,
        }
    }
}

//==================================================================================
// 2. ColumnBuilder
//==================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuilderState {
    Open,
    Finished,
    Poisoned,
}

/// Accumulates one typed column. See the module docs for the state machine.
#[derive(Debug)]
pub struct ColumnBuilder {
    column_type: ColumnType,
    // `None` once the buffers have been handed to a finished `Column`.
    values: Option<ValueStore>,
    validity: Option<ValidityBuilder>,
    len: usize,
    state: BuilderState,
}

impl ColumnBuilder {
    /// Creates an empty builder whose buffers grow on demand.
    pub fn new(column_type: ColumnType, pool: Arc<dyn MemoryPool>) -> Result<Self, PostmanError> {
        Self::with_capacity(column_type, 0, pool)
    }

    /// Creates a builder with exactly `capacity` rows claimed up front.
    pub fn with_capacity(
        column_type: ColumnType,
        capacity: usize,
        pool: Arc<dyn MemoryPool>,
    ) -> Result<Self, PostmanError> {
        Ok(Self {
            column_type,
            values: Some(ValueStore::new(column_type, capacity, &pool)?),
            validity: Some(ValidityBuilder::with_capacity(capacity, pool)?),
            len: 0,
            state: BuilderState::Open,
        })
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn null_count(&self) -> usize {
        self.validity.as_ref().map_or(0, |v| v.null_count())
    }

    pub fn is_finished(&self) -> bool {
        self.state == BuilderState::Finished
    }

    pub fn is_poisoned(&self) -> bool {
        self.state == BuilderState::Poisoned
    }

    /// The packed validity bitmap accumulated so far (LSB-first).
    pub fn validity_bytes(&self) -> &[u8] {
        self.validity.as_ref().map_or(&[], |v| v.as_bytes())
    }

    /// Appends one value. A `Value::Null` is treated as `append_null()`.
    pub fn append(&mut self, value: &Value) -> Result<(), PostmanError> {
        self.check_open()?;
        match value.column_type() {
            None => return self.append_null(),
            Some(ty) if ty != self.column_type => {
                return Err(PostmanError::type_mismatch(self.column_type, ty))
            }
            Some(_) => {}
        }
        let value_bytes = match value {
            Value::Utf8(s) => s.len(),
            _ => 0,
        };
        let result = self.write(|values, validity| {
            values.reserve_one(value_bytes)?;
            validity.reserve(1)?;
            values.push_value(value)?;
            validity.append(true)
        });
        self.settle(result)
    }

    /// Appends a null at the next position.
    pub fn append_null(&mut self) -> Result<(), PostmanError> {
        self.check_open()?;
        let result = self.write(|values, validity| {
            values.reserve_one(0)?;
            validity.reserve(1)?;
            values.push_null()?;
            validity.append(false)
        });
        self.settle(result)
    }

    /// Finishes the column. The builder is consumed and rejects further use.
    pub fn finish(&mut self) -> Result<Column, PostmanError> {
        self.check_open()?;
        let sealed = self.write(|values, validity| {
            values.seal()?;
            validity.seal()
        });
        if let Err(e) = sealed {
            self.poison();
            return Err(e);
        }

        let (values, validity) = match (self.values.take(), self.validity.take()) {
            (Some(values), Some(validity)) => (values, validity),
            _ => {
                return Err(PostmanError::InternalError(
                    "open builder without buffers".to_string(),
                ))
            }
        };
        self.state = BuilderState::Finished;

        let len = self.len;
        let nulls = validity.finish();
        let array: ArrayRef = match values {
            ValueStore::Int32(values) => Arc::new(Int32Array::try_new(
                ScalarBuffer::new(values.into_buffer(), 0, len),
                nulls,
            )?),
            ValueStore::Int64(values) => Arc::new(Int64Array::try_new(
                ScalarBuffer::new(values.into_buffer(), 0, len),
                nulls,
            )?),
            ValueStore::Float64(values) => Arc::new(Float64Array::try_new(
                ScalarBuffer::new(values.into_buffer(), 0, len),
                nulls,
            )?),
            ValueStore::Utf8 { offsets, data } => {
                let offsets = ScalarBuffer::new(offsets.into_buffer(), 0, len + 1);
                // Offsets start at 0 and never decrease: each push is `data.len()` after the append.
                let offsets = OffsetBuffer::new(offsets);
                Arc::new(StringArray::try_new(offsets, data.into_buffer(), nulls)?)
            }
        };

        log_metric!(
            "event" = "column_finished",
            "type" = self.column_type,
            "len" = len,
            "nulls" = array.null_count()
        );
        Ok(Column::from_array(array))
    }

    fn check_open(&self) -> Result<(), PostmanError> {
        match self.state {
            BuilderState::Open => Ok(()),
            BuilderState::Finished => Err(PostmanError::UseAfterFinish(self.column_type.to_string())),
            BuilderState::Poisoned => Err(PostmanError::BuilderPoisoned(self.column_type.to_string())),
        }
    }

    fn write<F>(&mut self, f: F) -> Result<(), PostmanError>
    where
        F: FnOnce(&mut ValueStore, &mut ValidityBuilder) -> Result<(), PostmanError>,
    {
        match (self.values.as_mut(), self.validity.as_mut()) {
            (Some(values), Some(validity)) => f(values, validity),
            _ => Err(PostmanError::InternalError(
                "open builder without buffers".to_string(),
            )),
        }
    }

    /// Counts a successful append, or poisons the builder on allocation failure.
    fn settle(&mut self, result: Result<(), PostmanError>) -> Result<(), PostmanError> {
        match result {
            Ok(()) => {
                self.len += 1;
                Ok(())
            }
            Err(e) => {
                if matches!(e, PostmanError::AllocationFailure(_)) {
                    self.poison();
                }
                Err(e)
            }
        }
    }

    fn poison(&mut self) {
        log::warn!(
            "{} builder poisoned after {} rows; releasing its buffers",
            self.column_type,
            self.len
        );
        self.state = BuilderState::Poisoned;
        self.values = None;
        self.validity = None;
    }
}
