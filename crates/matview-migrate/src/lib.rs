//! # matview-migrate
//!
//! Copy PostgreSQL materialized views into plain tables on another database.
//!
//! For every relation the library:
//!
//! - **Reflects** the column shape with a zero-row query
//! - **Provisions** the target table (drop, then `CREATE TABLE` with mapped types)
//! - **Transfers** all rows in fixed-size batches, committing each batch
//!
//! ## Example
//!
//! ```rust,no_run
//! use matview_migrate::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> matview_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::new(config).await?;
//!     let result = orchestrator.run().await?;
//!     println!("Migrated {} rows", result.rows_transferred);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod orchestrator;
pub mod progress;
pub mod provision;
pub mod reflect;
pub mod transfer;
pub mod typemap;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenient access
pub use config::{
    fold_identifier, parse_table_list, Config, DatabaseConfig, FailurePolicy, MigrationConfig,
};
pub use core::{
    ColumnDescriptor, Dialect, DropOutcome, MigrationPlan, Row, SourceConnection, SqlValue,
    TableMigrationTask, TargetConnection,
};
pub use error::{MigrateError, Result};
pub use orchestrator::{
    build_plan, HealthCheckResult, MigrationResult, Orchestrator, Phase, RunStatus,
    TableOutcome, TableValidation,
};
pub use progress::ProgressUpdate;
pub use provision::{provision, ProvisionOutcome};
pub use transfer::{BatchCursor, TransferEngine, TransferStats};
pub use typemap::{map_column_type, TypeFamily};
