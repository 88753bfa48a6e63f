// In: src/table/mod.rs

//! The Table Assembler and the immutable column/table types it produces.
//!
//! Data Flow (Build Request):
//!
//!   rows --> [TableBuilder]        one ColumnBuilder per FieldSpec, rows appended positionally
//!              |
//!              `-> finish() -> [assemble]   equal-length check, schema in input order
//!                                  |
//!                                  `-> Table (owns every column buffer)
//!
//! The Assembler never injects rows. Appending a trailing all-null row is a caller
//! policy, expressed through `BuildOptions::trailing_null_row`.

//==================================================================================
// 1. Module Declarations
//==================================================================================
pub mod assembler;
pub mod column;
pub mod row_builder;

//==================================================================================
// 2. Public API Re-exports
//==================================================================================
pub use self::assembler::{assemble, Table};
pub use self::column::Column;
pub use self::row_builder::{build_table, BuildOptions, FieldSpec, TableBuilder};
