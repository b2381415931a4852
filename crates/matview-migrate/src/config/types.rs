//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database configuration.
    pub source: DatabaseConfig,

    /// Target database configuration.
    pub target: DatabaseConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Connection settings for one side of the migration (PostgreSQL).
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Schema holding the relations (default: "public").
    #[serde(default = "default_public_schema")]
    pub schema: String,

    /// SSL mode: disable, require, verify-ca, verify-full (default: "require").
    #[serde(default = "default_require")]
    pub ssl_mode: String,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Explicit source relations, in migration order. Empty means discover the
    /// materialized views of the source schema. Names fold to lower case
    /// unless double-quoted.
    #[serde(default)]
    pub source_tables: Vec<String>,

    /// Target table names, paired positionally with the source relations.
    /// Missing entries default to the source name. Folded like `source_tables`.
    #[serde(default)]
    pub target_tables: Vec<String>,

    /// Rows per committed batch (default: 1000).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// What to do when a table fails (default: abort).
    #[serde(default)]
    pub on_table_error: FailurePolicy,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            source_tables: Vec::new(),
            target_tables: Vec::new(),
            batch_size: default_batch_size(),
            on_table_error: FailurePolicy::default(),
        }
    }
}

/// Policy applied when a table task fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the run at the first failed table.
    #[default]
    Abort,

    /// Record the failure and move on to the next table.
    Continue,
}

// Default value functions for serde
fn default_pg_port() -> u16 {
    5432
}

fn default_public_schema() -> String {
    "public".to_string()
}

fn default_require() -> String {
    "require".to_string()
}

fn default_batch_size() -> usize {
    1000
}
