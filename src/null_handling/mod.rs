//! This module serves as the public API for all null-handling logic within the
//! postman Rust core.
//!
//! Validity is tracked as an Arrow-compatible bitmap: one bit per element, bit set
//! means the value is present, least-significant bit first within each byte. Using
//! the foreign runtime's own packing means a bitmap can be exported by pointer with
//! no bit shuffling.
//!
//! This module is PURE RUST and is completely decoupled from the FFI layer.

//==================================================================================
// 1. Module Declarations
//==================================================================================

/// The validity bitmap builder and read helpers.
pub mod bitmap;

//==================================================================================
// 2. Public API Re-exports
//==================================================================================
pub use self::bitmap::{count_nulls, is_valid, ValidityBuilder};

//==================================================================================
// 3. Unit Tests (Module-level integration tests)
//==================================================================================
