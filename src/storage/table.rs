use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::{Column, RecordId, Result, Row, Schema, StoreError, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    name: String,
    schema: Schema,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            schema: Schema::new(columns),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    schema: TableSchema,
    rows: BTreeMap<RecordId, Row>,
    next_row_id: RecordId,
}

impl Table {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
            next_row_id: 1,
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn insert(&mut self, row: Row) -> Result<RecordId> {
        self.validate_row(&row)?;

        let id = self.next_row_id;
        self.next_row_id += 1;
        self.rows.insert(id, row);
        Ok(id)
    }

    pub fn get(&self, id: RecordId) -> Option<&Row> {
        self.rows.get(&id)
    }

    /// Raw column write, bypassing save machinery. Returns the previous
    /// values of the touched columns for undo, or `None` when the row is gone.
    pub fn update_columns(
        &mut self,
        id: RecordId,
        values: &[(String, Value)],
    ) -> Result<Option<Vec<(String, Value)>>> {
        let Some(row) = self.rows.get_mut(&id) else {
            return Ok(None);
        };

        let mut old = Vec::with_capacity(values.len());
        for (name, value) in values {
            let idx = self.schema.schema().find_column_index(name).ok_or_else(|| {
                StoreError::ColumnNotFound(name.clone(), self.schema.name.clone())
            })?;
            old.push((name.clone(), row[idx].clone()));
            row[idx] = value.clone();
        }
        Ok(Some(old))
    }

    /// Physical removal of a row. Returns the removed row for undo.
    pub fn remove(&mut self, id: RecordId) -> Option<Row> {
        self.rows.remove(&id)
    }

    /// Puts a previously removed row back under its original identity.
    /// Used by transaction rollback.
    pub fn restore_row(&mut self, id: RecordId, row: Row) {
        if id >= self.next_row_id {
            self.next_row_id = id + 1;
        }
        self.rows.insert(id, row);
    }

    pub fn rows(&self) -> impl Iterator<Item = (&RecordId, &Row)> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn validate_row(&self, row: &Row) -> Result<()> {
        let columns = self.schema.schema().columns();
        if row.len() != columns.len() {
            return Err(StoreError::ExecutionError(format!(
                "Table '{}' expects {} columns, got {}",
                self.schema.name,
                columns.len(),
                row.len()
            )));
        }
        for (column, value) in columns.iter().zip(row) {
            column.validate(value)?;
        }
        Ok(())
    }
}
