use crate::core::{RecordId, Result, Row, Value};
use crate::query::Selection;
use crate::storage::table::TableSchema;

/// Host persistence interface consumed by the lifecycle engine.
///
/// The engine never talks to storage any other way, so a relational store can
/// host the engine by implementing this trait. [`MemoryBackend`] is the
/// bundled reference implementation.
///
/// [`MemoryBackend`]: crate::storage::MemoryBackend
pub trait Backend: Send + Sync {
    fn create_table(&self, schema: TableSchema) -> Result<()>;

    fn table_exists(&self, name: &str) -> bool;

    fn schema(&self, table: &str) -> Result<TableSchema>;

    /// Opens a transaction scope. Nested calls open savepoints inside the
    /// enclosing transaction.
    fn begin(&self) -> Result<()>;

    fn commit(&self) -> Result<()>;

    fn rollback(&self) -> Result<()>;

    fn transaction_depth(&self) -> usize;

    fn insert(&self, table: &str, row: Row) -> Result<RecordId>;

    /// Ordering-agnostic lookup by identity, ignoring any scope.
    fn find(&self, table: &str, id: RecordId) -> Result<Option<Row>>;

    fn select(&self, selection: &Selection) -> Result<Vec<(RecordId, Row)>>;

    /// Raw column update bypassing validation/save machinery.
    /// Returns false when the row no longer exists.
    fn update_columns(&self, table: &str, id: RecordId, values: &[(String, Value)])
    -> Result<bool>;

    /// Adds `delta` to an integer counter column. NULL counters count as zero.
    /// Returns false when the row no longer exists.
    fn adjust_counter(&self, table: &str, id: RecordId, column: &str, delta: i64) -> Result<bool>;

    /// Raw physical delete. Returns false when the row no longer exists.
    fn hard_delete(&self, table: &str, id: RecordId) -> Result<bool>;
}
