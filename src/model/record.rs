use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use crate::core::{RecordId, Result, Row, StoreError, Value};
use crate::model::descriptor::ModelDescriptor;

/// An in-memory association slot on a record.
#[derive(Debug, Clone)]
pub enum AssociationTarget {
    Single(Option<Box<Record>>),
    Collection(Vec<Record>),
}

/// A materialized record: attribute state plus the transient bookkeeping the
/// lifecycle engine needs (association cache, cascade origin, counter
/// suppression).
#[derive(Debug, Clone)]
pub struct Record {
    model: String,
    id: Option<RecordId>,
    lifecycle_column: Option<String>,
    attributes: BTreeMap<String, Value>,
    frozen: bool,
    readonly: bool,
    associations: HashMap<String, AssociationTarget>,
    /// Foreign key of the association a cascading operation reached this
    /// record through, if any.
    cascade_origin: Option<String>,
    counters_suppressed: bool,
}

impl Record {
    /// A fresh, unpersisted record of the given model. Lifecycle-aware models
    /// start active (sentinel).
    pub fn new(model: &ModelDescriptor) -> Self {
        let mut attributes = BTreeMap::new();
        for column in model.columns() {
            attributes.insert(column.name.clone(), Value::Null);
        }
        if let Some(column) = model.lifecycle_column() {
            attributes.insert(column.to_string(), Value::sentinel());
        }
        Self {
            model: model.name().to_string(),
            id: None,
            lifecycle_column: model.lifecycle_column().map(str::to_string),
            attributes,
            frozen: false,
            readonly: false,
            associations: HashMap::new(),
            cascade_origin: None,
            counters_suppressed: false,
        }
    }

    /// Materializes a stored row.
    pub fn from_row(model: &ModelDescriptor, id: RecordId, row: Row) -> Self {
        let mut record = Self::new(model);
        record.id = Some(id);
        for (column, value) in model.columns().iter().zip(row) {
            record.attributes.insert(column.name.clone(), value);
        }
        record
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn id(&self) -> Option<RecordId> {
        self.id
    }

    pub fn set_id(&mut self, id: RecordId) {
        self.id = Some(id);
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: Value) {
        self.attributes.insert(name.into(), value);
    }

    /// Applies a batch of column writes to the in-memory state.
    pub fn apply(&mut self, values: &[(String, Value)]) {
        for (name, value) in values {
            self.attributes.insert(name.clone(), value.clone());
        }
    }

    /// Serializes attribute state to JSON, for audit trails and debugging.
    pub fn state(&self) -> Result<serde_json::Value> {
        serde_json::to_value(&self.attributes)
            .map_err(|err| StoreError::ExecutionError(err.to_string()))
    }

    /// True iff the lifecycle column holds something other than the sentinel.
    pub fn is_deleted(&self) -> bool {
        match &self.lifecycle_column {
            Some(column) => self
                .attributes
                .get(column)
                .map(|value| !value.is_sentinel())
                .unwrap_or(false),
            None => false,
        }
    }

    /// The lifecycle column's timestamp. For an active record this is the
    /// sentinel; `None` only for non-lifecycle-aware models.
    pub fn deletion_timestamp(&self) -> Option<DateTime<Utc>> {
        let column = self.lifecycle_column.as_ref()?;
        self.attributes.get(column)?.as_timestamp()
    }

    pub fn lifecycle_column(&self) -> Option<&str> {
        self.lifecycle_column.as_deref()
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn mark_readonly(&mut self) {
        self.readonly = true;
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    pub fn cache_single(&mut self, name: impl Into<String>, target: Option<Record>) {
        self.associations
            .insert(name.into(), AssociationTarget::Single(target.map(Box::new)));
    }

    pub fn cache_collection(&mut self, name: impl Into<String>, targets: Vec<Record>) {
        self.associations
            .insert(name.into(), AssociationTarget::Collection(targets));
    }

    pub fn cached(&self, name: &str) -> Option<&AssociationTarget> {
        self.associations.get(name)
    }

    /// Drops cached association results so subsequent reads go back to the
    /// store.
    pub fn clear_association_cache(&mut self) {
        self.associations.clear();
    }

    pub fn set_cascade_origin(&mut self, foreign_key: Option<String>) {
        self.cascade_origin = foreign_key;
    }

    pub fn cascade_origin(&self) -> Option<&str> {
        self.cascade_origin.as_deref()
    }

    pub fn suppress_counters(&mut self, suppressed: bool) {
        self.counters_suppressed = suppressed;
    }

    pub fn counters_suppressed(&self) -> bool {
        self.counters_suppressed
    }

    /// Row projection in schema column order, for inserts.
    pub fn to_row(&self, model: &ModelDescriptor) -> Row {
        model
            .columns()
            .iter()
            .map(|column| {
                self.attributes
                    .get(&column.name)
                    .cloned()
                    .unwrap_or(Value::Null)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType};

    fn model() -> ModelDescriptor {
        ModelDescriptor::new("note", "notes")
            .column(Column::new("title", DataType::Text))
            .lifecycle("deleted_at")
    }

    #[test]
    fn test_new_record_starts_active() {
        let record = Record::new(&model());
        assert!(!record.is_deleted());
        assert!(!record.is_persisted());
        assert_eq!(record.deletion_timestamp(), Some(crate::core::sentinel_timestamp()));
    }

    #[test]
    fn test_deleted_tracks_the_lifecycle_attribute() {
        let mut record = Record::new(&model());
        record.set_attribute("deleted_at", Value::Timestamp(Utc::now()));
        assert!(record.is_deleted());

        record.set_attribute("deleted_at", Value::sentinel());
        assert!(!record.is_deleted());
    }

    #[test]
    fn test_row_round_trip() {
        let model = model();
        let mut record = Record::new(&model);
        record.set_attribute("title", Value::Text("draft".into()));

        let row = record.to_row(&model);
        let back = Record::from_row(&model, 7, row);
        assert_eq!(back.id(), Some(7));
        assert_eq!(back.attribute("title"), Some(&Value::Text("draft".into())));
    }

    #[test]
    fn test_state_serializes_attributes() {
        let record = Record::new(&model());
        let state = record.state().unwrap();
        assert!(state.get("deleted_at").is_some());
    }
}
