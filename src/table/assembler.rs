// In: src/table/assembler.rs

use arrow::array::ArrayRef;
use arrow::datatypes::{Field, Schema, SchemaRef};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use hashbrown::HashMap;
use std::sync::Arc;

use super::column::Column;
use super::row_builder::FieldSpec;
use crate::error::PostmanError;

//==================================================================================
// 1. The Table
//==================================================================================

/// An immutable, ordered collection of equal-length named columns plus their schema.
///
/// The schema's field order is load-bearing: the foreign runtime addresses
/// columns positionally as well as by name.
#[derive(Debug, Clone)]
pub struct Table {
    schema: SchemaRef,
    columns: Vec<Column>,
    num_rows: usize,
    index: HashMap<String, usize>,
}

impl Table {
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// The Arrow schema serialized as JSON.
    pub fn schema_json(&self) -> Result<String, PostmanError> {
        Ok(serde_json::to_string(self.schema.as_ref())?)
    }

    /// The schema as `(name, type)` pairs; fails if a column is not a bridge type.
    pub fn field_specs(&self) -> Result<Vec<FieldSpec>, PostmanError> {
        self.schema
            .fields()
            .iter()
            .zip(&self.columns)
            .map(|(field, column)| Ok(FieldSpec::new(field.name(), column.column_type()?)))
            .collect()
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.index.get(name).and_then(|&i| self.columns.get(i))
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// A zero-copy Arrow `RecordBatch` view of this table.
    pub fn to_record_batch(&self) -> Result<RecordBatch, PostmanError> {
        let arrays: Vec<ArrayRef> = self.columns.iter().map(|c| c.array().clone()).collect();
        let options = RecordBatchOptions::new().with_row_count(Some(self.num_rows));
        Ok(RecordBatch::try_new_with_options(
            self.schema.clone(),
            arrays,
            &options,
        )?)
    }
}

/// Tables are equal when their schemas and column contents are equal.
impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.columns == other.columns
    }
}

//==================================================================================
// 2. The Assembler
//==================================================================================

/// Combines finished columns into one `Table`.
///
/// Fails with `SchemaMismatch` if any two columns differ in length or share a name.
/// Schema order equals input order. Zero columns and zero rows are both valid.
pub fn assemble(columns: Vec<(String, Column)>) -> Result<Table, PostmanError> {
    let num_rows = columns.first().map_or(0, |(_, c)| c.len());

    let mut index = HashMap::with_capacity(columns.len());
    let mut fields = Vec::with_capacity(columns.len());
    let mut owned = Vec::with_capacity(columns.len());

    for (position, (name, column)) in columns.into_iter().enumerate() {
        if column.len() != num_rows {
            return Err(PostmanError::SchemaMismatch(format!(
                "column '{}' has {} rows but the first column has {}",
                name,
                column.len(),
                num_rows
            )));
        }
        if index.insert(name.clone(), position).is_some() {
            return Err(PostmanError::SchemaMismatch(format!(
                "duplicate column name '{}'",
                name
            )));
        }
        fields.push(Field::new(name, column.data_type().clone(), true));
        owned.push(column);
    }

    log_metric!(
        "event" = "table_assembled",
        "columns" = owned.len(),
        "rows" = num_rows
    );

    Ok(Table {
        schema: Arc::new(Schema::new(fields)),
        columns: owned,
        num_rows,
        index,
    })
}
