// In: src/bridge/import.rs

use arrow::array::{make_array, Array, ArrayData, ArrayRef};
use arrow::buffer::{Buffer, MutableBuffer};
use serde::{Deserialize, Serialize};
use std::ptr::NonNull;
use std::sync::Arc;

use super::descriptor::{ArrayDescriptor, ForeignOwner, Lease, RawDescriptor};
use crate::error::PostmanError;
use crate::table::Column;
use crate::types::{ColumnType, Value};
use crate::utils::{bitmap_len, safe_bytes_to_typed_slice};

//==================================================================================
// 1. Import Policy
//==================================================================================

/// What to do with a foreign buffer that is not aligned for its element type.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentPolicy {
    /// Copy the buffer into aligned memory (once) and log a warning.
    #[default]
    Copy,
    /// Fail the import with `MisalignedBuffer`.
    Reject,
}

/// Owner handle for borrowed imports. The memory belongs to someone else, so
/// dropping the last reference frees nothing.
#[derive(Debug)]
struct BorrowedMemory;

//==================================================================================
// 2. Imported Arrays
//==================================================================================

/// The result of importing a descriptor.
///
/// Adopted memory becomes an ordinary `Column`. Borrowed memory is only reachable
/// through a `ColumnView`, which cannot outlive the exporter's lease.
#[derive(Debug, Clone)]
pub enum ImportedArray<'a> {
    Borrowed(ColumnView<'a>),
    Adopted(Column),
}

impl<'a> ImportedArray<'a> {
    pub fn len(&self) -> usize {
        match self {
            ImportedArray::Borrowed(view) => view.len(),
            ImportedArray::Adopted(column) => column.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_borrowed(&self) -> bool {
        matches!(self, ImportedArray::Borrowed(_))
    }

    /// Converts into an owned column. Adopted imports are returned as is;
    /// borrowed imports are deep-copied.
    pub fn into_column(self) -> Result<Column, PostmanError> {
        match self {
            ImportedArray::Borrowed(view) => view.to_column(),
            ImportedArray::Adopted(column) => Ok(column),
        }
    }
}

/// A read-only view over memory that the exporter still owns.
///
/// Every read checks the lease first and fails with `OwnershipViolation` once
/// the owner has released the memory.
#[derive(Debug, Clone)]
pub struct ColumnView<'a> {
    column_type: ColumnType,
    column: Column,
    lease: Lease<'a>,
}

impl<'a> ColumnView<'a> {
    pub fn len(&self) -> usize {
        self.column.len()
    }

    pub fn is_empty(&self) -> bool {
        self.column.is_empty()
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn null_count(&self) -> Result<usize, PostmanError> {
        self.lease.check()?;
        Ok(self.column.null_count())
    }

    pub fn is_null(&self, index: usize) -> Result<bool, PostmanError> {
        self.lease.check()?;
        Ok(self.column.is_null(index))
    }

    pub fn value(&self, index: usize) -> Result<Option<Value>, PostmanError> {
        self.lease.check()?;
        Ok(self.column.value(index))
    }

    pub fn values(&self) -> Result<Vec<Value>, PostmanError> {
        self.lease.check()?;
        self.column.values()
    }

    /// Copies the borrowed memory into an owned column.
    pub fn to_column(&self) -> Result<Column, PostmanError> {
        self.lease.check()?;
        Ok(self.column.deep_copy())
    }

    /// Re-describes the viewed memory, e.g. to confirm it was not copied.
    pub fn describe(&self) -> Result<RawDescriptor, PostmanError> {
        self.lease.check()?;
        super::export::describe(self.column.array())
    }

    /// Logical equality with an owned column.
    pub fn same_as(&self, other: &Column) -> Result<bool, PostmanError> {
        self.lease.check()?;
        Ok(&self.column == other)
    }
}

//==================================================================================
// 3. Public API
//==================================================================================

/// Wraps the memory behind a descriptor as an Arrow array without copying,
/// copying misaligned buffers once.
pub fn import_array(descriptor: ArrayDescriptor<'_>) -> Result<ImportedArray<'_>, PostmanError> {
    import_array_with(descriptor, AlignmentPolicy::default())
}

/// [`import_array`] with an explicit alignment policy.
pub fn import_array_with(
    descriptor: ArrayDescriptor<'_>,
    policy: AlignmentPolicy,
) -> Result<ImportedArray<'_>, PostmanError> {
    match descriptor {
        ArrayDescriptor::Borrowed(borrowed) => {
            borrowed.lease.check()?;
            let owner: ForeignOwner = Arc::new(BorrowedMemory);
            let column = wrap(&borrowed.raw, &owner, policy)?;
            Ok(ImportedArray::Borrowed(ColumnView {
                column_type: ColumnType::from_tag(borrowed.raw.type_tag)?,
                column,
                lease: borrowed.lease,
            }))
        }
        ArrayDescriptor::Adopted(adopted) => {
            let column = wrap(&adopted.raw, &adopted.owner, policy)?;
            Ok(ImportedArray::Adopted(column))
        }
    }
}

//==================================================================================
// 4. Validation and Wrapping
//==================================================================================

fn wrap(
    raw: &RawDescriptor,
    owner: &ForeignOwner,
    policy: AlignmentPolicy,
) -> Result<Column, PostmanError> {
    let column_type = ColumnType::from_tag(raw.type_tag)?;
    let len = usize::try_from(raw.length).map_err(|_| {
        PostmanError::InvalidLength(format!("negative array length {}", raw.length))
    })?;

    let expected_data_len = match column_type {
        ColumnType::Utf8 => len.checked_add(1).and_then(|n| n.checked_mul(4)),
        fixed => len.checked_mul(fixed.primary_width()),
    }
    .ok_or_else(|| {
        PostmanError::InvalidLength(format!(
            "{} array of length {} does not fit in memory",
            column_type, len
        ))
    })?;
    let data_len = checked_len("data", raw.data_len)?;
    if data_len != expected_data_len {
        return Err(PostmanError::InvalidLength(format!(
            "{} array of length {} needs a {}-byte data buffer, descriptor says {}",
            column_type, len, expected_data_len, data_len
        )));
    }

    let secondary_len = checked_len("secondary", raw.secondary_len)?;
    if !column_type.is_variable_width() && (raw.secondary_ptr != 0 || secondary_len != 0) {
        return Err(PostmanError::InvalidLength(format!(
            "{} arrays have no secondary buffer",
            column_type
        )));
    }

    let validity_len = checked_len("validity", raw.validity_len)?;
    let expected_validity_len = if raw.has_validity() { bitmap_len(len) } else { 0 };
    if validity_len != expected_validity_len {
        return Err(PostmanError::InvalidLength(format!(
            "validity buffer of an array of length {} must be {} bytes, descriptor says {}",
            len, expected_validity_len, validity_len
        )));
    }

    let data = wrap_buffer(
        "data",
        raw.data_ptr,
        data_len,
        column_type.primary_width(),
        owner,
        policy,
    )?;
    let mut builder = ArrayData::builder(column_type.to_arrow_type())
        .len(len)
        .add_buffer(data.clone());

    if column_type.is_variable_width() {
        let offsets = safe_bytes_to_typed_slice::<i32>(data.as_slice())?;
        let last = offsets.last().copied().unwrap_or(0);
        if last < 0 || last as usize > secondary_len {
            return Err(PostmanError::InvalidLength(format!(
                "last string offset {} exceeds the {}-byte character buffer",
                last, secondary_len
            )));
        }
        let chars = wrap_buffer("secondary", raw.secondary_ptr, secondary_len, 1, owner, policy)?;
        builder = builder.add_buffer(chars);
    }

    if raw.has_validity() {
        let validity = wrap_buffer("validity", raw.validity_ptr, validity_len, 1, owner, policy)?;
        builder = builder.null_bit_buffer(Some(validity));
    }

    let array: ArrayRef = make_array(builder.build()?);
    log::debug!(
        "import: {} x {} ({} nulls)",
        column_type,
        len,
        array.null_count()
    );
    Ok(Column::from_array(array))
}

fn checked_len(buffer: &str, len: i64) -> Result<usize, PostmanError> {
    usize::try_from(len)
        .map_err(|_| PostmanError::InvalidLength(format!("negative {} buffer length {}", buffer, len)))
}

/// Wraps one foreign region as an Arrow `Buffer` that keeps `owner` alive.
fn wrap_buffer(
    name: &'static str,
    address: u64,
    len: usize,
    align: usize,
    owner: &ForeignOwner,
    policy: AlignmentPolicy,
) -> Result<Buffer, PostmanError> {
    if len == 0 {
        // An empty MutableBuffer has a dangling pointer that is still SIMD-aligned.
        return Ok(MutableBuffer::new(0).into());
    }
    let ptr = NonNull::new(address as usize as *mut u8).ok_or_else(|| {
        PostmanError::InvalidLength(format!("{} buffer of {} bytes has a null pointer", name, len))
    })?;

    if (address as usize) % align != 0 {
        return match policy {
            AlignmentPolicy::Reject => Err(PostmanError::MisalignedBuffer {
                buffer: name,
                address,
                align,
            }),
            AlignmentPolicy::Copy => {
                log::warn!(
                    "{} buffer at {:#x} is not {}-byte aligned; copying {} bytes",
                    name,
                    address,
                    align,
                    len
                );
                // SAFETY: the descriptor's constructor vouched that `ptr` is readable for `len` bytes.
                let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr() as *const u8, len) };
                Ok(Buffer::from_slice_ref(bytes))
            }
        };
    }

    // SAFETY: `ptr` is valid for `len` bytes for as long as `owner` is alive,
    // and the buffer holds a clone of `owner`.
    Ok(unsafe { Buffer::from_custom_allocation(ptr, len, owner.clone()) })
}
