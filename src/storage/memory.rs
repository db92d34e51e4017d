use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use lazy_static::lazy_static;
use tracing::trace;

use crate::core::{RecordId, Result, Row, StoreError, Value};
use crate::query::Selection;
use crate::storage::engine::Backend;
use crate::storage::table::{Table, TableSchema};
use crate::transaction::Change;

lazy_static! {
    static ref GLOBAL_BACKEND: Arc<MemoryBackend> = Arc::new(MemoryBackend::new());
}

#[derive(Debug, Default)]
struct TxLog {
    /// One savepoint mark per open transaction scope, outermost first.
    marks: Vec<usize>,
    changes: Vec<Change>,
}

impl TxLog {
    fn depth(&self) -> usize {
        self.marks.len()
    }
}

/// In-memory reference store.
///
/// Tables live behind a single `RwLock`; transaction scopes are savepoint
/// marks over a shared undo log, so a nested rollback unwinds only its own
/// scope while an error propagating outward unwinds everything.
pub struct MemoryBackend {
    tables: RwLock<HashMap<String, Table>>,
    tx: RwLock<TxLog>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            tx: RwLock::new(TxLog::default()),
        }
    }

    /// A process-wide shared backend, for applications that want one store
    /// across all sessions.
    pub fn global() -> Arc<MemoryBackend> {
        GLOBAL_BACKEND.clone()
    }

    /// Records an applied change so the enclosing transaction can undo it.
    /// Outside a transaction the store is in autocommit and nothing is kept.
    fn record(&self, change: Change) -> Result<()> {
        let mut tx = self.tx.write()?;
        if tx.depth() > 0 {
            tx.changes.push(change);
        }
        Ok(())
    }
}

impl Backend for MemoryBackend {
    fn create_table(&self, schema: TableSchema) -> Result<()> {
        let mut tables = self.tables.write()?;
        let name = schema.name().to_string();
        if tables.contains_key(&name) {
            return Err(StoreError::TableExists(name));
        }
        tables.insert(name, Table::new(schema));
        Ok(())
    }

    fn table_exists(&self, name: &str) -> bool {
        self.tables
            .read()
            .map(|tables| tables.contains_key(name))
            .unwrap_or(false)
    }

    fn schema(&self, table: &str) -> Result<TableSchema> {
        let tables = self.tables.read()?;
        let table = tables
            .get(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        Ok(table.schema().clone())
    }

    fn begin(&self) -> Result<()> {
        let mut tx = self.tx.write()?;
        let mark = tx.changes.len();
        tx.marks.push(mark);
        trace!(depth = tx.depth(), "transaction scope opened");
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        let mut tx = self.tx.write()?;
        tx.marks.pop().ok_or(StoreError::NoActiveTransaction)?;
        if tx.marks.is_empty() {
            tx.changes.clear();
        }
        trace!(depth = tx.depth(), "transaction scope committed");
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        let mut tx = self.tx.write()?;
        let mark = tx.marks.pop().ok_or(StoreError::NoActiveTransaction)?;
        let undo: Vec<Change> = tx.changes.drain(mark..).collect();
        trace!(depth = tx.depth(), reverted = undo.len(), "transaction scope rolled back");
        drop(tx);

        let mut tables = self.tables.write()?;
        for change in undo.into_iter().rev() {
            let table = tables
                .get_mut(change.table_name())
                .ok_or_else(|| StoreError::TableNotFound(change.table_name().to_string()))?;
            change.revert(table)?;
        }
        Ok(())
    }

    fn transaction_depth(&self) -> usize {
        self.tx.read().map(|tx| tx.depth()).unwrap_or(0)
    }

    fn insert(&self, table: &str, row: Row) -> Result<RecordId> {
        let id = {
            let mut tables = self.tables.write()?;
            let table = tables
                .get_mut(table)
                .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
            table.insert(row)?
        };
        self.record(Change::InsertRow {
            table: table.to_string(),
            id,
        })?;
        Ok(id)
    }

    fn find(&self, table: &str, id: RecordId) -> Result<Option<Row>> {
        let tables = self.tables.read()?;
        let table = tables
            .get(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        Ok(table.get(id).cloned())
    }

    fn select(&self, selection: &Selection) -> Result<Vec<(RecordId, Row)>> {
        let tables = self.tables.read()?;
        let table = tables
            .get(selection.table())
            .ok_or_else(|| StoreError::TableNotFound(selection.table().to_string()))?;

        let mut results = Vec::new();
        for (id, row) in table.rows() {
            if selection.matches(table.schema(), row)? {
                results.push((*id, row.clone()));
            }
        }
        Ok(results)
    }

    fn update_columns(
        &self,
        table: &str,
        id: RecordId,
        values: &[(String, Value)],
    ) -> Result<bool> {
        let old = {
            let mut tables = self.tables.write()?;
            let table = tables
                .get_mut(table)
                .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
            table.update_columns(id, values)?
        };
        match old {
            Some(old) => {
                self.record(Change::UpdateRow {
                    table: table.to_string(),
                    id,
                    old,
                })?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn adjust_counter(&self, table: &str, id: RecordId, column: &str, delta: i64) -> Result<bool> {
        let current = {
            let tables = self.tables.read()?;
            let stored = tables
                .get(table)
                .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
            let Some(row) = stored.get(id) else {
                return Ok(false);
            };
            let idx = stored
                .schema()
                .schema()
                .find_column_index(column)
                .ok_or_else(|| StoreError::ColumnNotFound(column.to_string(), table.to_string()))?;
            row[idx].clone()
        };

        let count = match current {
            Value::Integer(n) => n,
            Value::Null => 0,
            other => {
                return Err(StoreError::TypeMismatch(format!(
                    "Counter column '{}' holds {}, expected INTEGER",
                    column,
                    other.type_name()
                )));
            }
        };

        self.update_columns(table, id, &[(column.to_string(), Value::Integer(count + delta))])
    }

    fn hard_delete(&self, table: &str, id: RecordId) -> Result<bool> {
        let removed = {
            let mut tables = self.tables.write()?;
            let table = tables
                .get_mut(table)
                .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
            table.remove(id)
        };
        match removed {
            Some(old_row) => {
                self.record(Change::DeleteRow {
                    table: table.to_string(),
                    id,
                    old_row,
                })?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
