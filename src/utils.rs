//! This module provides a set of shared, low-level utility functions used
//! throughout the postman core.
//!
//! Its primary responsibilities include:
//! 1.  Providing safe, validated conversions between raw byte slices and typed slices.
//! 2.  Sizing validity bitmaps the way the Arrow columnar format does.

use crate::error::PostmanError;

//==================================================================================
// 1. Core Utility Functions
//==================================================================================

/// Safely reinterprets a byte slice as a slice of a plain-old-data type.
///
/// # Errors
/// Returns a `PostmanError::PodCast` if the byte slice length is not a multiple
/// of the size of `T`, or if the slice is not aligned for `T`.
pub fn safe_bytes_to_typed_slice<T>(bytes: &[u8]) -> Result<&[T], PostmanError>
where
    T: bytemuck::Pod, // Use bytemuck's trait for "Plain Old Data"
{
    bytemuck::try_cast_slice(bytes).map_err(PostmanError::from)
}

/// Converts a slice of plain-old-data values into an owned, native-endian `Vec<u8>`.
///
/// This function performs a memory copy.
#[cfg(test)]
pub(crate) fn typed_slice_to_bytes<T: bytemuck::Pod>(data: &[T]) -> Vec<u8> {
    bytemuck::cast_slice(data).to_vec()
}

/// Number of bytes needed to hold `bits` validity bits: `ceil(bits / 8)`.
pub fn bitmap_len(bits: usize) -> usize {
    bits.div_ceil(8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitmap_len() {
        assert_eq!(bitmap_len(0), 0);
        assert_eq!(bitmap_len(1), 1);
        assert_eq!(bitmap_len(8), 1);
        assert_eq!(bitmap_len(9), 2);
    }

    #[test]
    fn test_typed_roundtrip_through_bytes() {
        let values: Vec<i64> = vec![-1, 0, i64::MAX];
        let bytes = typed_slice_to_bytes(&values);
        assert_eq!(bytes.len(), 24);
        // `bytes` comes from a fresh Vec<u8>, so only check the length contract here.
        let odd = &bytes[..23];
        assert!(safe_bytes_to_typed_slice::<i64>(odd).is_err());
    }
}
