// In: src/table/row_builder.rs

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::assembler::{assemble, Table};
use crate::builder::ColumnBuilder;
use crate::error::PostmanError;
use crate::memory::MemoryPool;
use crate::types::{ColumnType, Value};

//==================================================================================
// 1. Schema Declaration
//==================================================================================

/// One predeclared `(name, type)` pair of a build request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub column_type: ColumnType,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Caller-level policy for a build request.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Append one all-null row after the real rows.
    #[serde(default)]
    pub trailing_null_row: bool,

    /// Rows to claim up front in every column builder. `0` grows on demand.
    #[serde(default)]
    pub initial_capacity_rows: usize,
}

//==================================================================================
// 2. TableBuilder (positionally aligned column builders)
//==================================================================================

/// Builds a table row by row, keeping one `ColumnBuilder` per field in lockstep.
///
/// Every row appends exactly one value (or null) to every builder, so the
/// equal-length invariant holds by construction.
#[derive(Debug)]
pub struct TableBuilder {
    fields: Vec<FieldSpec>,
    builders: Vec<ColumnBuilder>,
    num_rows: usize,
}

impl TableBuilder {
    pub fn new(fields: Vec<FieldSpec>, pool: Arc<dyn MemoryPool>) -> Result<Self, PostmanError> {
        Self::with_capacity(fields, 0, pool)
    }

    pub fn with_capacity(
        fields: Vec<FieldSpec>,
        capacity: usize,
        pool: Arc<dyn MemoryPool>,
    ) -> Result<Self, PostmanError> {
        {
            let mut seen = HashSet::with_capacity(fields.len());
            for field in &fields {
                if !seen.insert(field.name.as_str()) {
                    return Err(PostmanError::SchemaMismatch(format!(
                        "duplicate column name '{}'",
                        field.name
                    )));
                }
            }
        }
        let builders = fields
            .iter()
            .map(|field| ColumnBuilder::with_capacity(field.column_type, capacity, pool.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            fields,
            builders,
            num_rows: 0,
        })
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Appends one row. The row must have one value per field.
    ///
    /// Types are checked for the whole row before any builder is touched, so a
    /// `TypeMismatch` never leaves a partially appended row behind.
    pub fn append_row(&mut self, row: &[Value]) -> Result<(), PostmanError> {
        if row.len() != self.fields.len() {
            return Err(PostmanError::SchemaMismatch(format!(
                "row {} has {} values but the schema declares {} columns",
                self.num_rows,
                row.len(),
                self.fields.len()
            )));
        }
        for (field, value) in self.fields.iter().zip(row) {
            if let Some(ty) = value.column_type() {
                if ty != field.column_type {
                    return Err(PostmanError::type_mismatch(
                        format!("{} for column '{}'", field.column_type, field.name),
                        ty,
                    ));
                }
            }
        }
        for (builder, value) in self.builders.iter_mut().zip(row) {
            builder.append(value)?;
        }
        self.num_rows += 1;
        Ok(())
    }

    /// Appends a row that is null in every column.
    pub fn append_null_row(&mut self) -> Result<(), PostmanError> {
        for builder in &mut self.builders {
            builder.append_null()?;
        }
        self.num_rows += 1;
        Ok(())
    }

    /// Finishes every column builder and assembles the table.
    pub fn finish(mut self) -> Result<Table, PostmanError> {
        let columns = self
            .builders
            .iter_mut()
            .map(ColumnBuilder::finish)
            .collect::<Result<Vec<_>, _>>()?;
        let named = self
            .fields
            .into_iter()
            .map(|field| field.name)
            .zip(columns)
            .collect();
        assemble(named)
    }
}

//==================================================================================
// 3. Build Request
//==================================================================================

/// Builds a table from row-oriented input with a predeclared schema.
pub fn build_table(
    fields: &[FieldSpec],
    rows: &[Vec<Value>],
    options: &BuildOptions,
    pool: Arc<dyn MemoryPool>,
) -> Result<Table, PostmanError> {
    let capacity = options.initial_capacity_rows;
    let mut builder = TableBuilder::with_capacity(fields.to_vec(), capacity, pool)?;
    for row in rows {
        builder.append_row(row)?;
    }
    if options.trailing_null_row {
        builder.append_null_row()?;
    }
    log::debug!(
        "build_table: {} rows x {} columns (trailing null row: {})",
        builder.num_rows(),
        fields.len(),
        options.trailing_null_row
    );
    builder.finish()
}
