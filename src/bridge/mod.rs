// In: src/bridge/mod.rs

// ====================================================================================
// ARCHITECTURAL OVERVIEW: The Bridge Layer
// ====================================================================================
//
// The `bridge` is the boundary between this library's columns and a foreign
// runtime that speaks the same columnar layout. Nothing crosses it but a plain
// descriptor of pointers and lengths; element data is never copied.
//
// Export:
//
//   1. [Column / Table]                 -> finished, immutable Arrow array
//         |
//         `-> describe(): pointers + lengths of data, secondary, validity
//         |
//   2. [ArrayDescriptor]
//         |-- Borrowed(lease)  : exporter keeps ownership, `'a` ties it to the column
//         `-- Adopted(owner)   : ownership moves with an `Arc` that frees on drop
//
// Import:
//
//   1. [ArrayDescriptor]                -> validated (tag, lengths, pointers, alignment)
//         |
//         `-> wrap_buffer(): `Buffer::from_custom_allocation` around each region
//         |
//   2. [ImportedArray]
//         |-- Borrowed(ColumnView) : lease-checked reads, `to_column()` copies
//         `-- Adopted(Column)      : an ordinary column, frees via the owner
//
// ====================================================================================

pub mod descriptor;
pub mod export;
pub mod import;

pub use descriptor::{
    AdoptedArray, ArrayDescriptor, BorrowedArray, DescriptorTuple, ForeignOwner, Lease,
    RawDescriptor, ReleaseSignal,
};
pub use export::{describe, export_column, export_column_owned, export_table_column};
pub use import::{import_array, import_array_with, AlignmentPolicy, ColumnView, ImportedArray};

#[cfg(test)]
mod tests;
