// In: src/bridge/descriptor.rs

//! Defines the Array Memory Descriptor: the runtime-neutral description of one
//! column's memory, and the ownership variants that travel with it.

use arrow::alloc::Allocation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::PostmanError;

//==================================================================================
// I. Wire Form
//==================================================================================

/// The tuple shape exchanged with the foreign runtime:
/// `(type_tag, length, data_ptr, data_len, secondary_ptr, secondary_len, validity_ptr, validity_len)`.
pub type DescriptorTuple = (i32, i64, u64, i64, u64, i64, u64, i64);

/// The raw, non-owning description of one array's memory.
///
/// * Fixed-width types: `data` is the value buffer, `secondary` is `(0, 0)`.
/// * `Utf8`: `data` is the `i32` offsets buffer (`length + 1` entries) and
///   `secondary` is the UTF-8 character data.
/// * `validity_ptr == 0` means every element is present.
///
/// All pointers are raw addresses in this process's address space.
#[repr(C)]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RawDescriptor {
    pub type_tag: i32,
    pub length: i64,
    pub data_ptr: u64,
    pub data_len: i64,
    pub secondary_ptr: u64,
    pub secondary_len: i64,
    pub validity_ptr: u64,
    pub validity_len: i64,
}

impl RawDescriptor {
    pub fn has_validity(&self) -> bool {
        self.validity_ptr != 0
    }
}

impl From<DescriptorTuple> for RawDescriptor {
    fn from(t: DescriptorTuple) -> Self {
        Self {
            type_tag: t.0,
            length: t.1,
            data_ptr: t.2,
            data_len: t.3,
            secondary_ptr: t.4,
            secondary_len: t.5,
            validity_ptr: t.6,
            validity_len: t.7,
        }
    }
}

impl From<RawDescriptor> for DescriptorTuple {
    fn from(d: RawDescriptor) -> Self {
        (
            d.type_tag,
            d.length,
            d.data_ptr,
            d.data_len,
            d.secondary_ptr,
            d.secondary_len,
            d.validity_ptr,
            d.validity_len,
        )
    }
}

//==================================================================================
// II. Leases and Release Signals
//==================================================================================

/// A flag the memory's owner raises when it reclaims borrowed memory.
///
/// Used where lifetimes cannot follow the memory, i.e. when the owner lives in
/// the foreign runtime. Views check it before every read.
#[derive(Debug, Clone, Default)]
pub struct ReleaseSignal(Arc<AtomicBool>);

impl ReleaseSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn release(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_released(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// The lifetime token of a borrowed descriptor.
///
/// `'a` is the lifetime of whatever owns the memory on this side of the boundary.
/// A lease may additionally carry a `ReleaseSignal` for owners the compiler
/// cannot see.
#[derive(Debug, Clone)]
pub struct Lease<'a> {
    signal: Option<ReleaseSignal>,
    _scope: PhantomData<&'a ()>,
}

impl<'a> Lease<'a> {
    /// A lease that lives exactly as long as the borrow of `owner`.
    pub fn scoped<T: ?Sized>(_owner: &'a T) -> Self {
        Self {
            signal: None,
            _scope: PhantomData,
        }
    }

    /// Attaches a release signal to this lease.
    pub fn with_signal(mut self, signal: ReleaseSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Fails with `OwnershipViolation` once the owner has released the memory.
    pub fn check(&self) -> Result<(), PostmanError> {
        match &self.signal {
            Some(signal) if signal.is_released() => Err(PostmanError::OwnershipViolation(
                "borrowed array used after its owner released the memory".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

impl Lease<'static> {
    /// A lease bounded only by a release signal, for memory owned by the foreign runtime.
    pub fn revocable(signal: ReleaseSignal) -> Self {
        Self {
            signal: Some(signal),
            _scope: PhantomData,
        }
    }
}

//==================================================================================
// III. Ownership Variants
//==================================================================================

/// The handle that frees adopted memory when the last importer drops it.
pub type ForeignOwner = Arc<dyn Allocation>;

/// Memory that remains owned by the exporter.
#[derive(Debug, Clone)]
pub struct BorrowedArray<'a> {
    pub(crate) raw: RawDescriptor,
    pub(crate) lease: Lease<'a>,
}

impl<'a> BorrowedArray<'a> {
    pub fn raw(&self) -> &RawDescriptor {
        &self.raw
    }

    pub fn lease(&self) -> &Lease<'a> {
        &self.lease
    }
}

/// Memory whose ownership passes to the importer through `owner`.
#[derive(Clone)]
pub struct AdoptedArray {
    pub(crate) raw: RawDescriptor,
    pub(crate) owner: ForeignOwner,
}

impl AdoptedArray {
    pub fn raw(&self) -> &RawDescriptor {
        &self.raw
    }
}

impl fmt::Debug for AdoptedArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdoptedArray")
            .field("raw", &self.raw)
            .finish_non_exhaustive()
    }
}

/// A descriptor together with the ownership strategy of its transfer.
///
/// Safe code obtains descriptors from `export_column`/`export_column_owned`.
/// Descriptors for memory received from the foreign runtime are built with the
/// `unsafe` constructors, where the caller vouches for the raw addresses.
#[derive(Debug, Clone)]
pub enum ArrayDescriptor<'a> {
    Borrowed(BorrowedArray<'a>),
    Adopted(AdoptedArray),
}

impl<'a> ArrayDescriptor<'a> {
    pub fn raw(&self) -> &RawDescriptor {
        match self {
            ArrayDescriptor::Borrowed(b) => &b.raw,
            ArrayDescriptor::Adopted(a) => &a.raw,
        }
    }

    pub fn is_borrowed(&self) -> bool {
        matches!(self, ArrayDescriptor::Borrowed(_))
    }

    /// Describes foreign memory that stays owned by the foreign runtime.
    ///
    /// # Safety
    /// Every non-zero pointer in `raw` must be valid for reads of its stated
    /// length, and the memory must stay alive and unmutated for `'a` and until
    /// the lease's release signal (if any) is raised.
    pub unsafe fn borrowed_from_raw(raw: RawDescriptor, lease: Lease<'a>) -> Self {
        ArrayDescriptor::Borrowed(BorrowedArray { raw, lease })
    }
}

impl ArrayDescriptor<'static> {
    /// Describes foreign memory whose ownership is handed to the importer.
    ///
    /// # Safety
    /// Every non-zero pointer in `raw` must be valid for reads of its stated
    /// length and stay alive and unmutated until `owner` is dropped. The
    /// originating runtime must have relinquished its own claim on the memory.
    pub unsafe fn adopted_from_raw(raw: RawDescriptor, owner: ForeignOwner) -> Self {
        ArrayDescriptor::Adopted(AdoptedArray { raw, owner })
    }
}
