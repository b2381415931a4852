//! Relation metadata and migration plan types.
//!
//! A [`ColumnDescriptor`] sequence is captured once per relation and drives
//! both the target DDL and the positional binds of every INSERT, so the two can
//! never disagree on column count or order.

use serde::{Deserialize, Serialize};

/// Column metadata read from a relation's result shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name as reported by the source.
    pub name: String,

    /// Native type name (e.g., "varchar", "numeric", "int4").
    pub native_type: String,

    /// Length for character types, total digits for numeric types, 0 if unreported.
    pub precision: i32,

    /// Digits after the decimal point, 0 if unreported.
    pub scale: i32,

    /// Ordinal position (1-based).
    pub ordinal_position: i32,
}

impl ColumnDescriptor {
    /// Create a descriptor.
    pub fn new(
        name: impl Into<String>,
        native_type: impl Into<String>,
        precision: i32,
        scale: i32,
        ordinal_position: i32,
    ) -> Self {
        Self {
            name: name.into(),
            native_type: native_type.into(),
            precision,
            scale,
            ordinal_position,
        }
    }
}

/// Column names in ordinal order.
pub fn column_names(columns: &[ColumnDescriptor]) -> Vec<String> {
    columns.iter().map(|c| c.name.clone()).collect()
}

/// One source relation to copy into one target table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMigrationTask {
    /// Source relation name (materialized view or table).
    pub source_name: String,

    /// Target table name.
    pub target_name: String,
}

impl TableMigrationTask {
    pub fn new(source_name: impl Into<String>, target_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            target_name: target_name.into(),
        }
    }
}

/// Ordered list of tasks, built once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationPlan {
    /// Tasks in execution order.
    pub tasks: Vec<TableMigrationTask>,

    /// True when target names were padded with source names.
    pub padded: bool,
}

impl MigrationPlan {
    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Check if the plan has no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Iterate over tasks in order.
    pub fn iter(&self) -> std::slice::Iter<'_, TableMigrationTask> {
        self.tasks.iter()
    }
}

impl<'a> IntoIterator for &'a MigrationPlan {
    type Item = &'a TableMigrationTask;
    type IntoIter = std::slice::Iter<'a, TableMigrationTask>;

    fn into_iter(self) -> Self::IntoIter {
        self.tasks.iter()
    }
}
