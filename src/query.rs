//! Minimal predicate composition over table rows.
//!
//! A [`Selection`] is the query contract the lifecycle engine hands to a
//! [`Backend`](crate::storage::Backend): a conjunction of column predicates
//! plus a scope mode controlling visibility of soft-deleted rows. The default
//! scope hides rows whose lifecycle column is at or before the selection's
//! time anchor; `WithDeleted` removes that filter, `OnlyDeleted` inverts it.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::core::{Result, Row, StoreError, Value};
use crate::storage::TableSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Lifecycle column strictly after the anchor (active rows).
    Active,
    /// Default scope removed: every row, deleted or not.
    WithDeleted,
    /// Lifecycle column at or before the anchor (soft-deleted rows).
    OnlyDeleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Le,
    Gt,
}

#[derive(Debug, Clone)]
pub struct Predicate {
    pub column: String,
    pub op: CmpOp,
    pub value: Value,
}

impl Predicate {
    pub fn new(column: impl Into<String>, op: CmpOp, value: Value) -> Self {
        Self {
            column: column.into(),
            op,
            value,
        }
    }

    fn holds(&self, candidate: &Value) -> Result<bool> {
        let ordering = candidate.compare(&self.value)?;
        Ok(match self.op {
            CmpOp::Eq => ordering == Ordering::Equal,
            CmpOp::Le => ordering != Ordering::Greater,
            CmpOp::Gt => ordering == Ordering::Greater,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Selection {
    table: String,
    lifecycle_column: Option<String>,
    scope: Scope,
    predicates: Vec<Predicate>,
    as_of: DateTime<Utc>,
}

impl Selection {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            lifecycle_column: None,
            scope: Scope::Active,
            predicates: Vec::new(),
            as_of: Utc::now(),
        }
    }

    /// Declares the lifecycle column the scope modes evaluate against.
    /// Without it every scope behaves like `WithDeleted`.
    pub fn lifecycle(mut self, column: impl Into<String>) -> Self {
        self.lifecycle_column = Some(column.into());
        self
    }

    pub fn filter(mut self, column: impl Into<String>, op: CmpOp, value: Value) -> Self {
        self.predicates.push(Predicate::new(column, op, value));
        self
    }

    pub fn with_deleted(mut self) -> Self {
        self.scope = Scope::WithDeleted;
        self
    }

    pub fn only_deleted(mut self) -> Self {
        self.scope = Scope::OnlyDeleted;
        self
    }

    /// Overrides the time anchor used by the scope modes.
    pub fn as_of(mut self, anchor: DateTime<Utc>) -> Self {
        self.as_of = anchor;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn matches(&self, schema: &TableSchema, row: &Row) -> Result<bool> {
        for predicate in &self.predicates {
            let idx = schema
                .schema()
                .find_column_index(&predicate.column)
                .ok_or_else(|| {
                    StoreError::ColumnNotFound(predicate.column.clone(), self.table.clone())
                })?;
            if !predicate.holds(&row[idx])? {
                return Ok(false);
            }
        }
        self.scope_holds(schema, row)
    }

    fn scope_holds(&self, schema: &TableSchema, row: &Row) -> Result<bool> {
        let Some(column) = self.lifecycle_column.as_deref() else {
            return Ok(true);
        };
        if self.scope == Scope::WithDeleted {
            return Ok(true);
        }
        let idx = schema
            .schema()
            .find_column_index(column)
            .ok_or_else(|| StoreError::ColumnNotFound(column.to_string(), self.table.clone()))?;
        let ordering = row[idx].compare(&Value::Timestamp(self.as_of))?;
        Ok(match self.scope {
            Scope::Active => ordering == Ordering::Greater,
            Scope::OnlyDeleted => ordering != Ordering::Greater,
            Scope::WithDeleted => true,
        })
    }
}
