//! Core abstractions for database-agnostic migration.
//!
//! - [`schema`]: Column descriptors and migration plan types
//! - [`value`]: Row value representation
//! - [`traits`]: Connection traits and the SQL dialect strategy

pub mod schema;
pub mod traits;
pub mod value;

pub use schema::{column_names, ColumnDescriptor, MigrationPlan, TableMigrationTask};
pub use traits::{Dialect, DropOutcome, RowStream, SourceConnection, TargetConnection};
pub use value::{Row, SqlValue};
