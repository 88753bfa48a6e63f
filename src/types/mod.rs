//! This module defines the core, strongly-typed data representations used
//! throughout the postman builder and bridge.
//!
//! It includes the canonical `ColumnType` enum, whose numeric tags are the stable
//! wire contract shared with the foreign runtime, and the dynamic `Value` enum
//! that row-oriented producers hand to the builders.

pub mod column_type;
pub mod value;

// Re-export the main type(s) for easier access.
pub use column_type::ColumnType;
pub use value::Value;
