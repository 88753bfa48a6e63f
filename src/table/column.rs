// In: src/table/column.rs

use arrow::array::{make_array, Array, ArrayRef, AsArray, MutableArrayData};
use arrow::datatypes::{DataType, Float64Type, Int32Type, Int64Type};

use crate::error::PostmanError;
use crate::types::{ColumnType, Value};

/// An immutable, finished column: a thin wrapper around an Arrow array.
///
/// Columns produced by a `ColumnBuilder` are always one of the four supported
/// types. A column may also wrap an array obtained elsewhere (for example from
/// pyarrow); such arrays keep their Arrow type and the bridge rejects them with
/// `UnsupportedType` if it cannot describe them.
///
/// Cloning a `Column` is cheap and shares the underlying buffers.
#[derive(Debug, Clone)]
pub struct Column {
    array: ArrayRef,
}

impl Column {
    pub fn from_array(array: ArrayRef) -> Self {
        Self { array }
    }

    pub fn array(&self) -> &ArrayRef {
        &self.array
    }

    pub fn into_array(self) -> ArrayRef {
        self.array
    }

    pub fn data_type(&self) -> &DataType {
        self.array.data_type()
    }

    /// The bridge type of this column, or `UnsupportedType`.
    pub fn column_type(&self) -> Result<ColumnType, PostmanError> {
        ColumnType::from_arrow_type(self.array.data_type())
    }

    pub fn len(&self) -> usize {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    pub fn null_count(&self) -> usize {
        self.array.null_count()
    }

    /// Returns `true` if `index` is in bounds and null.
    pub fn is_null(&self, index: usize) -> bool {
        index < self.len() && self.array.is_null(index)
    }

    /// The value at `index`, `Value::Null` for a null slot, `None` when out of bounds
    /// or when the column's type is not a bridge type.
    pub fn value(&self, index: usize) -> Option<Value> {
        if index >= self.len() {
            return None;
        }
        if self.array.is_null(index) {
            return Some(Value::Null);
        }
        let value = match self.array.data_type() {
            DataType::Int32 => Value::Int32(self.array.as_primitive::<Int32Type>().value(index)),
            DataType::Int64 => Value::Int64(self.array.as_primitive::<Int64Type>().value(index)),
            DataType::Float64 => {
                Value::Float64(self.array.as_primitive::<Float64Type>().value(index))
            }
            DataType::Utf8 => Value::Utf8(self.array.as_string::<i32>().value(index).to_string()),
            _ => return None,
        };
        Some(value)
    }

    /// All values in order, with `Value::Null` marking null slots.
    pub fn values(&self) -> Result<Vec<Value>, PostmanError> {
        self.column_type()?;
        Ok((0..self.len()).filter_map(|i| self.value(i)).collect())
    }

    /// Copies every buffer into freshly allocated memory.
    ///
    /// This is the explicit one-time copy used when memory cannot be shared, for
    /// example when a borrowed import has to outlive the foreign buffer.
    pub fn deep_copy(&self) -> Column {
        let data = self.array.to_data();
        let mut mutable = MutableArrayData::new(vec![&data], false, data.len());
        mutable.extend(0, 0, data.len());
        Column::from_array(make_array(mutable.freeze()))
    }
}

/// Logical equality: same type, length, values, and null positions.
impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        self.array.to_data() == other.array.to_data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{BooleanArray, Int32Array, StringArray};
    use std::sync::Arc;

    #[test]
    fn test_value_access() {
        let column = Column::from_array(Arc::new(StringArray::from(vec![Some("a"), None])));
        assert_eq!(column.column_type().unwrap(), ColumnType::Utf8);
        assert_eq!(column.value(0), Some(Value::Utf8("a".to_string())));
        assert_eq!(column.value(1), Some(Value::Null));
        assert_eq!(column.value(2), None);
        assert!(column.is_null(1));
        assert!(!column.is_null(5));
    }

    #[test]
    fn test_foreign_type_is_unsupported() {
        let column = Column::from_array(Arc::new(BooleanArray::from(vec![true, false])));
        assert!(matches!(
            column.column_type(),
            Err(PostmanError::UnsupportedType(_))
        ));
        assert!(column.values().is_err());
    }

    #[test]
    fn test_deep_copy_is_equal_but_not_shared() {
        let column = Column::from_array(Arc::new(Int32Array::from(vec![Some(1), None, Some(3)])));
        let copy = column.deep_copy();
        assert_eq!(copy, column);
        let original_ptr = column.array().to_data().buffers()[0].as_ptr();
        let copy_ptr = copy.array().to_data().buffers()[0].as_ptr();
        assert_ne!(original_ptr, copy_ptr);
    }

    #[test]
    fn test_sliced_columns_compare_logically() {
        let full = Column::from_array(Arc::new(Int32Array::from(vec![0, 1, 2, 3])));
        let sliced = Column::from_array(full.array().slice(1, 2));
        let expected = Column::from_array(Arc::new(Int32Array::from(vec![1, 2])));
        assert_eq!(sliced, expected);
    }
}
