// In: src/error.rs

//! This module defines the single, unified error type for the entire postman library.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.
//!
//! Every builder, assembler, and bridge operation returns `Result<_, PostmanError>`.
//! Nothing in the crate logs an error and carries on: a failure always aborts the
//! build/export/import in progress and is handed back to the caller.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PostmanError {
    // =========================================================================
    // === Builder & Assembler Errors
    // =========================================================================
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Builder for {0} has already been finished")]
    UseAfterFinish(String),

    /// A previous allocation failure left the builder's buffers in an unknown state.
    #[error("Builder for {0} is poisoned by an earlier allocation failure")]
    BuilderPoisoned(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Allocation failure: {0}")]
    AllocationFailure(String),

    // =========================================================================
    // === Bridge Errors
    // =========================================================================
    #[error("Unsupported data type for this operation: {0}")]
    UnsupportedType(String),

    #[error("Invalid length: {0}")]
    InvalidLength(String),

    #[error("Ownership violation: {0}")]
    OwnershipViolation(String),

    #[error("Buffer '{buffer}' at {address:#x} is not aligned to {align} bytes")]
    MisalignedBuffer {
        buffer: &'static str,
        address: u64,
        align: usize,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal logic error (this is a bug): {0}")]
    InternalError(String),

    // =========================================================================
    // === External Error Wrappers (Using #[from] for automatic conversion)
    // =========================================================================
    /// An error originating from the Arrow library.
    #[error("Arrow operation failed: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// An error from the Serde JSON library, typically while reading a config or schema.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// An error originating from the underlying I/O subsystem (e.g. opening a log file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from a safe byte-casting operation failing.
    #[error("Byte slice casting error: {0}")]
    PodCast(String), // Manual `From` impl is needed as bytemuck::PodCastError doesn't impl Error

    /// An error for Python FFI (Foreign Function Interface) operations.
    #[error("FFI operation failed: {0}")]
    FfiError(String), // PyErr doesn't impl Error, so we can't use #[from] here.
}

impl PostmanError {
    pub(crate) fn type_mismatch(expected: impl ToString, actual: impl ToString) -> Self {
        PostmanError::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

// =============================================================================
// === Manual `From` Implementations ===
// =============================================================================

impl From<bytemuck::PodCastError> for PostmanError {
    fn from(err: bytemuck::PodCastError) -> Self {
        PostmanError::PodCast(err.to_string())
    }
}

#[cfg(feature = "python")]
impl From<pyo3::PyErr> for PostmanError {
    fn from(err: pyo3::PyErr) -> Self {
        PostmanError::FfiError(err.to_string())
    }
}

#[cfg(feature = "python")]
impl From<PostmanError> for pyo3::PyErr {
    fn from(err: PostmanError) -> pyo3::PyErr {
        pyo3::exceptions::PyValueError::new_err(err.to_string())
    }
}
