// In: src/bridge/export.rs

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{ArrowPrimitiveType, Float64Type, Int32Type, Int64Type};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use super::descriptor::{AdoptedArray, ArrayDescriptor, BorrowedArray, ForeignOwner, Lease, RawDescriptor};
use crate::error::PostmanError;
use crate::table::{Column, Table};
use crate::types::ColumnType;
use crate::utils::bitmap_len;

//==================================================================================
// 1. Public API
//==================================================================================

/// Publishes a column's memory as a borrowed descriptor.
///
/// Only pointers and lengths are computed; no element is copied. The descriptor
/// borrows `column`, so the column cannot be dropped while it is in use.
pub fn export_column(column: &Column) -> Result<ArrayDescriptor<'_>, PostmanError> {
    let raw = describe(column.array())?;
    Ok(ArrayDescriptor::Borrowed(BorrowedArray {
        raw,
        lease: Lease::scoped(column),
    }))
}

/// Publishes a column's memory and hands its ownership to the importer.
///
/// The returned descriptor keeps the column's buffers alive until the importer
/// drops the array it builds from it.
pub fn export_column_owned(column: Column) -> Result<ArrayDescriptor<'static>, PostmanError> {
    let raw = describe(column.array())?;
    let owner: ForeignOwner = Arc::new(AssertUnwindSafe(column.into_array()));
    Ok(ArrayDescriptor::Adopted(AdoptedArray { raw, owner }))
}

/// The `(table, column_index)` form of [`export_column`].
pub fn export_table_column(
    table: &Table,
    column_index: usize,
) -> Result<ArrayDescriptor<'_>, PostmanError> {
    let column = table.column(column_index).ok_or_else(|| {
        PostmanError::SchemaMismatch(format!(
            "column index {} out of range for a table with {} columns",
            column_index,
            table.num_columns()
        ))
    })?;
    export_column(column)
}

//==================================================================================
// 2. Descriptor Computation
//==================================================================================

/// Computes the raw descriptor of an Arrow array without copying it.
///
/// Fails with `UnsupportedType` for types outside the bridge's tag set, and with
/// `InvalidLength` for a sliced array whose validity bits do not start on a byte
/// boundary (describing it would require shifting every bit).
pub fn describe(array: &ArrayRef) -> Result<RawDescriptor, PostmanError> {
    let column_type = ColumnType::from_arrow_type(array.data_type())?;
    let length = to_i64(array.len())?;

    let ((data_ptr, data_len), (secondary_ptr, secondary_len)) = match column_type {
        ColumnType::Int32 => (primitive_parts::<Int32Type>(array)?, (0, 0)),
        ColumnType::Int64 => (primitive_parts::<Int64Type>(array)?, (0, 0)),
        ColumnType::Float64 => (primitive_parts::<Float64Type>(array)?, (0, 0)),
        ColumnType::Utf8 => {
            let strings = array.as_string::<i32>();
            let offsets = strings.offsets().inner().inner();
            let values = strings.values();
            (
                (address(offsets.as_ptr()), to_i64(offsets.len())?),
                (address(values.as_ptr()), to_i64(values.len())?),
            )
        }
    };

    let (validity_ptr, validity_len) = match array.nulls().filter(|n| n.null_count() > 0) {
        None => (0, 0),
        Some(nulls) => {
            let bits = nulls.inner();
            if bits.offset() % 8 != 0 {
                return Err(PostmanError::InvalidLength(format!(
                    "validity bitmap starts at bit offset {}, which is not byte aligned",
                    bits.offset()
                )));
            }
            let start = bits.inner().as_ptr() as usize + bits.offset() / 8;
            (start as u64, to_i64(bitmap_len(array.len()))?)
        }
    };

    let raw = RawDescriptor {
        type_tag: column_type.tag(),
        length,
        data_ptr,
        data_len,
        secondary_ptr,
        secondary_len,
        validity_ptr,
        validity_len,
    };
    log::debug!(
        "describe: {} x {} (data {} bytes, secondary {} bytes, validity {} bytes)",
        column_type,
        length,
        data_len,
        secondary_len,
        validity_len
    );
    Ok(raw)
}

fn primitive_parts<T: ArrowPrimitiveType>(array: &ArrayRef) -> Result<(u64, i64), PostmanError> {
    let values = array.as_primitive::<T>().values().inner();
    Ok((address(values.as_ptr()), to_i64(values.len())?))
}

fn address(ptr: *const u8) -> u64 {
    ptr as usize as u64
}

fn to_i64(n: usize) -> Result<i64, PostmanError> {
    i64::try_from(n).map_err(|_| PostmanError::InvalidLength(format!("{} does not fit in i64", n)))
}
