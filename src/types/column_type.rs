//! This module defines the canonical, type-safe representation of the column
//! types the postman bridge can build, export, and import.

use crate::error::PostmanError;
use arrow::datatypes::DataType as ArrowDataType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The column types understood on both sides of the runtime boundary.
///
/// The discriminants are the wire-level type tags. They are part of the public
/// contract: new types may only be appended, existing tags are never renumbered.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum ColumnType {
    Int32 = 0,
    Int64 = 1,
    Float64 = 2,
    Utf8 = 3,
}

impl ColumnType {
    /// All supported types, in tag order.
    pub const ALL: [ColumnType; 4] = [Self::Int32, Self::Int64, Self::Float64, Self::Utf8];

    /// The stable wire tag for this type.
    pub fn tag(self) -> i32 {
        self as i32
    }

    /// Resolves a wire tag received from the foreign runtime.
    pub fn from_tag(tag: i32) -> Result<Self, PostmanError> {
        match tag {
            0 => Ok(Self::Int32),
            1 => Ok(Self::Int64),
            2 => Ok(Self::Float64),
            3 => Ok(Self::Utf8),
            other => Err(PostmanError::UnsupportedType(format!(
                "Unknown type tag {}",
                other
            ))),
        }
    }

    /// Converts an Arrow `DataType` into a `ColumnType`.
    pub fn from_arrow_type(arrow_type: &ArrowDataType) -> Result<Self, PostmanError> {
        match arrow_type {
            ArrowDataType::Int32 => Ok(Self::Int32),
            ArrowDataType::Int64 => Ok(Self::Int64),
            ArrowDataType::Float64 => Ok(Self::Float64),
            ArrowDataType::Utf8 => Ok(Self::Utf8),
            dt => Err(PostmanError::UnsupportedType(format!(
                "Cannot convert Arrow type {:?} to ColumnType",
                dt
            ))),
        }
    }

    /// Converts a `ColumnType` back into an Arrow `DataType`.
    pub fn to_arrow_type(&self) -> ArrowDataType {
        match self {
            Self::Int32 => ArrowDataType::Int32,
            Self::Int64 => ArrowDataType::Int64,
            Self::Float64 => ArrowDataType::Float64,
            Self::Utf8 => ArrowDataType::Utf8,
        }
    }

    /// Width in bytes of one element of the primary buffer.
    ///
    /// For `Utf8` the primary buffer holds `i32` offsets, so this is the offset width.
    pub fn primary_width(&self) -> usize {
        match self {
            Self::Int32 => 4,
            Self::Int64 => 8,
            Self::Float64 => 8,
            Self::Utf8 => 4,
        }
    }

    /// Returns `true` if values live in an offsets + data pair of buffers.
    pub fn is_variable_width(&self) -> bool {
        matches!(self, Self::Utf8)
    }

    /// Parses the lowercase names used by the Python surface and config files.
    pub fn from_name(name: &str) -> Result<Self, PostmanError> {
        match name.to_ascii_lowercase().as_str() {
            "int32" => Ok(Self::Int32),
            "int64" => Ok(Self::Int64),
            "float64" | "double" => Ok(Self::Float64),
            "utf8" | "string" => Ok(Self::Utf8),
            other => Err(PostmanError::UnsupportedType(format!(
                "Unknown column type name '{}'. Must be 'int32', 'int64', 'float64', or 'utf8'.",
                other
            ))),
        }
    }

    /// The lowercase name accepted by [`ColumnType::from_name`].
    pub fn name(&self) -> &'static str {
        match self {
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::Utf8 => "utf8",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_stable() {
        assert_eq!(ColumnType::Int32.tag(), 0);
        assert_eq!(ColumnType::Int64.tag(), 1);
        assert_eq!(ColumnType::Float64.tag(), 2);
        assert_eq!(ColumnType::Utf8.tag(), 3);
        for ty in ColumnType::ALL {
            assert_eq!(ColumnType::from_tag(ty.tag()).unwrap(), ty);
        }
    }

    #[test]
    fn test_unknown_tag_is_unsupported() {
        assert!(matches!(
            ColumnType::from_tag(4),
            Err(PostmanError::UnsupportedType(_))
        ));
        assert!(matches!(
            ColumnType::from_tag(-1),
            Err(PostmanError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_arrow_mapping() {
        for ty in ColumnType::ALL {
            assert_eq!(ColumnType::from_arrow_type(&ty.to_arrow_type()).unwrap(), ty);
        }
        assert!(ColumnType::from_arrow_type(&ArrowDataType::Boolean).is_err());
    }

    #[test]
    fn test_from_name() {
        assert_eq!(ColumnType::from_name("INT64").unwrap(), ColumnType::Int64);
        assert_eq!(ColumnType::from_name("string").unwrap(), ColumnType::Utf8);
        assert!(ColumnType::from_name("decimal").is_err());
    }
}
