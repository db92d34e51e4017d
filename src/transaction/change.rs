// ============================================================================
// Transaction Change Tracking
// ============================================================================
//
// Implements the Command Pattern for reversible row operations. Each Change
// records enough of the previous state to undo itself during ROLLBACK;
// COMMIT simply discards the log.
//
// ============================================================================

use crate::core::{RecordId, Result, Row, Value};
use crate::storage::Table;

/// A single reversible change recorded inside a transaction scope.
#[derive(Debug, Clone)]
pub enum Change {
    /// A row was inserted.
    InsertRow { table: String, id: RecordId },

    /// Columns of an existing row were overwritten.
    UpdateRow {
        table: String,
        id: RecordId,
        old: Vec<(String, Value)>,
    },

    /// A row was physically removed.
    DeleteRow {
        table: String,
        id: RecordId,
        old_row: Row,
    },
}

impl Change {
    /// Get the table name affected by this change
    pub fn table_name(&self) -> &str {
        match self {
            Change::InsertRow { table, .. } => table,
            Change::UpdateRow { table, .. } => table,
            Change::DeleteRow { table, .. } => table,
        }
    }

    /// Reverses this change against its table. Rollback applies changes in
    /// reverse order of recording.
    pub fn revert(self, table: &mut Table) -> Result<()> {
        match self {
            Change::InsertRow { id, .. } => {
                table.remove(id);
                Ok(())
            }
            Change::UpdateRow { id, old, .. } => {
                table.update_columns(id, &old)?;
                Ok(())
            }
            Change::DeleteRow { id, old_row, .. } => {
                table.restore_row(id, old_row);
                Ok(())
            }
        }
    }
}
