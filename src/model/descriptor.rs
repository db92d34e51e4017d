//! Static, declarative model metadata.
//!
//! Descriptors are built once at registration time and passed by reference
//! into the cascade walker and counter coordinator; nothing is discovered by
//! runtime reflection. A model without a lifecycle column is not
//! lifecycle-aware and is never probed for soft-delete state.

use serde::{Deserialize, Serialize};

use crate::core::{Column, DataType};
use crate::storage::TableSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    Single,
    Collection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CascadePolicy {
    /// Destroy/restore/purge operations propagate to this dependent.
    Destroy,
    /// The dependent is left alone.
    None,
}

/// A dependent association: records of `target` pointing back at the owner
/// through `foreign_key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationDescriptor {
    pub name: String,
    pub target: String,
    pub cardinality: Cardinality,
    pub policy: CascadePolicy,
    /// Column on the target table holding the owner's identity.
    pub foreign_key: String,
    /// Polymorphic discriminator column on the target table, holding the
    /// owner's model name.
    pub type_column: Option<String>,
}

impl AssociationDescriptor {
    pub fn collection(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            cardinality: Cardinality::Collection,
            policy: CascadePolicy::Destroy,
            foreign_key: foreign_key.into(),
            type_column: None,
        }
    }

    pub fn single(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            cardinality: Cardinality::Single,
            ..Self::collection(name, target, foreign_key)
        }
    }

    /// Opt out of cascading for this dependent.
    pub fn keep(mut self) -> Self {
        self.policy = CascadePolicy::None;
        self
    }

    pub fn polymorphic(mut self, type_column: impl Into<String>) -> Self {
        self.type_column = Some(type_column.into());
        self
    }
}

/// An owner-pointing reference on the dependent side, optionally maintaining
/// a denormalized dependent count on the owner's row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceDescriptor {
    pub name: String,
    pub target: String,
    /// Column on this model's table holding the owner's identity.
    pub foreign_key: String,
    /// Counter column on the owner's table, if counted.
    pub counter_column: Option<String>,
}

impl ReferenceDescriptor {
    pub fn new(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            foreign_key: foreign_key.into(),
            counter_column: None,
        }
    }

    pub fn counted(mut self, counter_column: impl Into<String>) -> Self {
        self.counter_column = Some(counter_column.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    name: String,
    table: String,
    columns: Vec<Column>,
    lifecycle_column: Option<String>,
    timestamp_columns: Vec<String>,
    dependents: Vec<AssociationDescriptor>,
    references: Vec<ReferenceDescriptor>,
}

impl ModelDescriptor {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            columns: Vec::new(),
            lifecycle_column: None,
            timestamp_columns: Vec::new(),
            dependents: Vec::new(),
            references: Vec::new(),
        }
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Declares the lifecycle column and makes the model lifecycle-aware.
    /// The column is added to the schema if not already declared.
    pub fn lifecycle(mut self, column: impl Into<String>) -> Self {
        let column = column.into();
        if !self.columns.iter().any(|c| c.name == column) {
            self.columns
                .push(Column::new(column.clone(), DataType::Timestamp).not_null());
        }
        self.lifecycle_column = Some(column);
        self
    }

    /// Declares an "updated-at"-style column refreshed on every lifecycle
    /// transition. Added to the schema if not already declared.
    pub fn touch(mut self, column: impl Into<String>) -> Self {
        let column = column.into();
        if !self.columns.iter().any(|c| c.name == column) {
            self.columns
                .push(Column::new(column.clone(), DataType::Timestamp));
        }
        self.timestamp_columns.push(column);
        self
    }

    pub fn dependent(mut self, association: AssociationDescriptor) -> Self {
        self.dependents.push(association);
        self
    }

    pub fn reference(mut self, reference: ReferenceDescriptor) -> Self {
        if !self.columns.iter().any(|c| c.name == reference.foreign_key) {
            self.columns
                .push(Column::new(reference.foreign_key.clone(), DataType::Integer));
        }
        self.references.push(reference);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn lifecycle_column(&self) -> Option<&str> {
        self.lifecycle_column.as_deref()
    }

    pub fn is_lifecycle_aware(&self) -> bool {
        self.lifecycle_column.is_some()
    }

    pub fn timestamp_columns(&self) -> &[String] {
        &self.timestamp_columns
    }

    pub fn dependents(&self) -> &[AssociationDescriptor] {
        &self.dependents
    }

    /// Dependent associations the cascade walker traverses.
    pub fn cascading_dependents(&self) -> impl Iterator<Item = &AssociationDescriptor> {
        self.dependents
            .iter()
            .filter(|a| a.policy == CascadePolicy::Destroy)
    }

    pub fn references(&self) -> &[ReferenceDescriptor] {
        &self.references
    }

    pub fn find_reference(&self, name: &str) -> Option<&ReferenceDescriptor> {
        self.references.iter().find(|r| r.name == name)
    }

    pub fn find_dependent(&self, name: &str) -> Option<&AssociationDescriptor> {
        self.dependents.iter().find(|a| a.name == name)
    }

    pub fn table_schema(&self) -> TableSchema {
        TableSchema::new(self.table.clone(), self.columns.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_declaration_adds_the_column() {
        let model = ModelDescriptor::new("note", "notes")
            .column(Column::new("title", DataType::Text))
            .lifecycle("deleted_at");

        assert!(model.is_lifecycle_aware());
        assert_eq!(model.lifecycle_column(), Some("deleted_at"));
        assert!(model.columns().iter().any(|c| c.name == "deleted_at"));
    }

    #[test]
    fn test_cascading_dependents_filters_by_policy() {
        let model = ModelDescriptor::new("post", "posts")
            .dependent(AssociationDescriptor::collection("comments", "comment", "post_id"))
            .dependent(AssociationDescriptor::single("banner", "banner", "post_id").keep());

        let cascading: Vec<_> = model.cascading_dependents().collect();
        assert_eq!(cascading.len(), 1);
        assert_eq!(cascading[0].name, "comments");
    }

    #[test]
    fn test_reference_declaration_adds_the_foreign_key_column() {
        let model = ModelDescriptor::new("comment", "comments")
            .reference(ReferenceDescriptor::new("post", "post", "post_id").counted("comments_count"));

        assert!(model.columns().iter().any(|c| c.name == "post_id"));
        assert_eq!(
            model.find_reference("post").unwrap().counter_column.as_deref(),
            Some("comments_count")
        );
    }
}
