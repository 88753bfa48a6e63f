// In: src/ffi/python.rs

use arrow::array::{make_array, ArrayData};
use arrow::pyarrow::PyArrowType;
use arrow::record_batch::RecordBatch;
use pyo3::prelude::*;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::bridge::{self, ArrayDescriptor, DescriptorTuple, ForeignOwner, RawDescriptor};
use crate::config::PostmanConfig;
use crate::error::PostmanError;
use crate::observability;
use crate::table::{self, FieldSpec, Table};
use crate::types::{ColumnType, Value};

//==================================================================================
// I. Table Class
//==================================================================================

/// A finished table. Descriptors returned by `export_column` borrow its memory,
/// so the Python caller must keep the `Table` alive while using them.
#[pyclass(name = "Table", module = "arrow_postman", frozen)]
pub struct PyTable {
    inner: Table,
}

#[pymethods]
impl PyTable {
    fn num_rows(&self) -> usize {
        self.inner.num_rows()
    }

    fn num_columns(&self) -> usize {
        self.inner.num_columns()
    }

    /// The schema as a list of `(name, type_name)` pairs, in column order.
    fn schema(&self) -> PyResult<Vec<(String, String)>> {
        Ok(self
            .inner
            .field_specs()?
            .into_iter()
            .map(|f| (f.name, f.column_type.name().to_string()))
            .collect())
    }

    fn schema_json(&self) -> PyResult<String> {
        Ok(self.inner.schema_json()?)
    }

    /// Returns the 8-tuple descriptor of column `index`.
    fn export_column(&self, index: usize) -> PyResult<DescriptorTuple> {
        let descriptor = bridge::export_table_column(&self.inner, index)?;
        Ok((*descriptor.raw()).into())
    }

    /// Column `index` as a `pyarrow.Array` (shared through the Arrow C data interface).
    fn column(&self, index: usize) -> PyResult<PyArrowType<ArrayData>> {
        let column = self.inner.column(index).ok_or_else(|| {
            PostmanError::SchemaMismatch(format!("column index {} out of range", index))
        })?;
        Ok(PyArrowType(column.array().to_data()))
    }

    fn to_pyarrow(&self) -> PyResult<PyArrowType<RecordBatch>> {
        Ok(PyArrowType(self.inner.to_record_batch()?))
    }

    fn __len__(&self) -> usize {
        self.inner.num_rows()
    }

    fn __repr__(&self) -> String {
        format!(
            "Table(num_rows={}, num_columns={})",
            self.inner.num_rows(),
            self.inner.num_columns()
        )
    }
}

//==================================================================================
// II. Build Request
//==================================================================================

/// Builds a `Table` from row-oriented Python values and a predeclared schema.
#[pyfunction]
#[pyo3(name = "build_table", signature = (fields, rows, trailing_null_row = false, memory_limit_bytes = None))]
pub fn build_table_py(
    py: Python<'_>,
    fields: Vec<(String, String)>,
    rows: Vec<Vec<Option<Bound<'_, PyAny>>>>,
    trailing_null_row: bool,
    memory_limit_bytes: Option<usize>,
) -> PyResult<PyTable> {
    let specs = fields
        .into_iter()
        .map(|(name, type_name)| Ok(FieldSpec::new(name, ColumnType::from_name(&type_name)?)))
        .collect::<Result<Vec<_>, PostmanError>>()?;

    let values = rows
        .iter()
        .enumerate()
        .map(|(row_index, row)| convert_row(&specs, row_index, row))
        .collect::<Result<Vec<_>, PostmanError>>()?;

    let config = PostmanConfig {
        trailing_null_row,
        memory_limit_bytes,
        ..Default::default()
    };
    let options = config.build_options();
    let pool = config.memory_pool();
    let inner = py.allow_threads(move || table::build_table(&specs, &values, &options, pool))?;
    Ok(PyTable { inner })
}

fn convert_row(
    specs: &[FieldSpec],
    row_index: usize,
    row: &[Option<Bound<'_, PyAny>>],
) -> Result<Vec<Value>, PostmanError> {
    if row.len() != specs.len() {
        return Err(PostmanError::SchemaMismatch(format!(
            "row {} has {} values but the schema declares {} columns",
            row_index,
            row.len(),
            specs.len()
        )));
    }
    specs
        .iter()
        .zip(row)
        .map(|(spec, cell)| match cell {
            None => Ok(Value::Null),
            Some(obj) => convert_cell(spec, obj),
        })
        .collect()
}

fn convert_cell(spec: &FieldSpec, obj: &Bound<'_, PyAny>) -> Result<Value, PostmanError> {
    let converted = match spec.column_type {
        ColumnType::Int32 => obj.extract::<i32>().map(Value::Int32),
        ColumnType::Int64 => obj.extract::<i64>().map(Value::Int64),
        ColumnType::Float64 => obj.extract::<f64>().map(Value::Float64),
        ColumnType::Utf8 => obj.extract::<String>().map(Value::Utf8),
    };
    converted.map_err(|_| {
        let actual = obj
            .get_type()
            .name()
            .map(|n| n.to_string())
            .unwrap_or_else(|_| "<unknown>".to_string());
        PostmanError::type_mismatch(format!("{} for column '{}'", spec.column_type, spec.name), actual)
    })
}

//==================================================================================
// III. Descriptor API
//==================================================================================

/// Describes a `pyarrow.Array` without copying it. The descriptor borrows the
/// pyarrow array's memory; the caller keeps that array alive.
#[pyfunction]
#[pyo3(name = "export_array")]
pub fn export_array_py(array: PyArrowType<ArrayData>) -> PyResult<DescriptorTuple> {
    let array = make_array(array.0);
    let raw = bridge::describe(&array)?;
    Ok(raw.into())
}

/// Adopts the memory behind `descriptor` and returns it as a `pyarrow.Array`.
///
/// `owner` is kept alive until the last reference to the returned array is gone.
#[pyfunction]
#[pyo3(name = "import_array")]
pub fn import_array_py(
    py: Python<'_>,
    descriptor: DescriptorTuple,
    owner: PyObject,
) -> PyResult<PyArrowType<ArrayData>> {
    let raw = RawDescriptor::from(descriptor);
    let owner: ForeignOwner = Arc::new(AssertUnwindSafe(owner));
    // SAFETY: the Python caller vouches that the descriptor's pointers stay valid
    // for as long as `owner` is alive, and `owner` now travels with every buffer.
    let descriptor = unsafe { ArrayDescriptor::adopted_from_raw(raw, owner) };
    let column = py.allow_threads(move || bridge::import_array(descriptor)?.into_column())?;
    Ok(PyArrowType(column.array().to_data()))
}

//==================================================================================
// IV. Logging
//==================================================================================

#[pyfunction]
#[pyo3(name = "enable_verbose_logging", signature = (log_file = None, level = "info"))]
pub fn enable_verbose_logging_py(log_file: Option<String>, level: &str) -> PyResult<()> {
    Ok(observability::init_logging(level, log_file.as_deref())?)
}
