//! This file is the root of the `arrow_postman` Rust crate.
//!
//! Its responsibilities are strictly limited to:
//! 1.  Declaring all the top-level modules of our library (`builder`, `table`,
//!     `bridge`, etc.) so the Rust compiler knows they exist.
//! 2.  Re-exporting the types most callers need.
//! 3.  Defining the `#[pymodule]` which acts as the main entry point when the
//!     compiled library is imported into Python (feature `python`).

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
//==================================================================================
// 1. Module Declarations
//==================================================================================
#[macro_use]
mod observability; // Make macros available throughout the crate

pub mod bridge;
pub mod builder;
pub mod config;
pub mod error;
pub mod memory;
pub mod null_handling;
pub mod table;
pub mod types;
pub mod utils;

#[cfg(feature = "python")]
mod ffi;

pub use bridge::{
    export_column, export_column_owned, export_table_column, import_array, ArrayDescriptor,
    ImportedArray, RawDescriptor,
};
pub use builder::ColumnBuilder;
pub use config::PostmanConfig;
pub use error::PostmanError;
pub use observability::init_logging;
pub use table::{assemble, build_table, BuildOptions, Column, FieldSpec, Table};
pub use types::{ColumnType, Value};

//==================================================================================
// 2. Python Module Definition
//==================================================================================
#[cfg(feature = "python")]
use pyo3::prelude::*;

/// The `arrow_postman` Python module.
#[cfg(feature = "python")]
#[pymodule]
fn arrow_postman(m: &Bound<'_, PyModule>) -> PyResult<()> {
    use ffi::python::*;

    m.add_class::<PyTable>()?;
    m.add_function(wrap_pyfunction!(build_table_py, m)?)?;
    m.add_function(wrap_pyfunction!(export_array_py, m)?)?;
    m.add_function(wrap_pyfunction!(import_array_py, m)?)?;
    m.add_function(wrap_pyfunction!(enable_verbose_logging_py, m)?)?;

    // --- Expose the error type and version string ---
    m.add(
        "PostmanError",
        m.py().get_type_bound::<pyo3::exceptions::PyValueError>(),
    )?;
    m.add("__version__", VERSION)?;

    Ok(())
}
