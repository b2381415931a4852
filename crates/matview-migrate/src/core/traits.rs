//! Core traits for database-agnostic data migration.
//!
//! - [`SourceConnection`]: Reflects and streams source relations
//! - [`TargetConnection`]: Executes DDL and batched inserts under explicit commit control
//! - [`Dialect`]: SQL syntax strategy for the target engine
//!
//! Both connection traits take `&mut self`: a connection carries transaction
//! state and is never shared between tasks.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;

use super::schema::ColumnDescriptor;
use super::value::Row;

/// Forward-only stream of source rows.
pub type RowStream<'a> = BoxStream<'a, Result<Row>>;

/// Read schema and data from a source database.
#[async_trait]
pub trait SourceConnection: Send {
    /// Schema the relation names are resolved in.
    fn schema(&self) -> &str;

    /// List relations the catalog classifies as materialized views, in catalog order.
    async fn discover_materialized_views(&mut self) -> Result<Vec<String>>;

    /// Describe a relation's columns from its result shape without fetching rows.
    async fn describe_columns(&mut self, relation: &str) -> Result<Vec<ColumnDescriptor>>;

    /// Start streaming all rows of a relation, fields in `columns` order.
    async fn read_rows<'a>(
        &'a mut self,
        relation: &str,
        columns: &[ColumnDescriptor],
    ) -> Result<RowStream<'a>>;

    /// Exact row count of a relation.
    async fn row_count(&mut self, relation: &str) -> Result<i64>;

    /// Round-trip a trivial query.
    async fn ping(&mut self) -> Result<()>;

    /// Release the connection.
    async fn close(&mut self);
}

/// Result of a best-effort `DROP TABLE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// The table existed and was dropped.
    Dropped,
    /// No table of that name existed.
    Absent,
    /// The table may exist but could not be dropped.
    Failed(String),
}

/// Write schema and data to a target database.
#[async_trait]
pub trait TargetConnection: Send {
    /// SQL dialect of this target.
    fn dialect(&self) -> &dyn Dialect;

    /// Schema target tables are created in.
    fn schema(&self) -> &str;

    /// Drop a table. Never fails: problems are reported in the outcome.
    async fn drop_table(&mut self, table: &str) -> DropOutcome;

    /// Execute a single statement, returning affected rows.
    async fn execute(&mut self, sql: &str) -> Result<u64>;

    /// Current auto-commit state.
    fn auto_commit(&self) -> bool;

    /// Switch auto-commit. Enabling it discards uncommitted work.
    async fn set_auto_commit(&mut self, enabled: bool) -> Result<()>;

    /// Execute a parameterized statement once per row.
    ///
    /// Row fields bind positionally to placeholders `1..=N`.
    async fn execute_batch(&mut self, sql: &str, rows: &[Row]) -> Result<u64>;

    /// Commit the current transaction. A no-op when nothing is pending.
    async fn commit(&mut self) -> Result<()>;

    /// Exact row count of a table.
    async fn row_count(&mut self, table: &str) -> Result<i64>;

    /// Round-trip a trivial query.
    async fn ping(&mut self) -> Result<()>;

    /// Release the connection.
    async fn close(&mut self);
}

/// SQL syntax strategy for different database engines.
pub trait Dialect: Send + Sync {
    /// Quote an identifier (table name, column name, etc.).
    fn quote_ident(&self, name: &str) -> String;

    /// Schema-qualified, quoted table name.
    fn qualify(&self, schema: &str, table: &str) -> String {
        format!("{}.{}", self.quote_ident(schema), self.quote_ident(table))
    }

    /// Get a parameter placeholder for the given 1-based index.
    fn param_placeholder(&self, index: usize) -> String;
}
