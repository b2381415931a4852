//! Error types for the migration library.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, bad table lists, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Could not establish or verify a database connection.
    #[error("Connection error ({side}): {message}")]
    Connection { side: String, message: String },

    /// Column reflection failed for a relation.
    #[error("Schema reflection failed for {table}: {message}")]
    Schema { table: String, message: String },

    /// CREATE TABLE failed on the target.
    #[error("Provisioning failed for {table}: {message}")]
    Provisioning { table: String, message: String },

    /// A batch execute or commit failed mid-transfer.
    #[error(
        "Transfer failed for table {table} after {rows_committed} committed rows \
         ({commits} commits): {message}"
    )]
    Transfer {
        table: String,
        message: String,
        rows_committed: u64,
        commits: usize,
    },

    /// Unclassified database driver error.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// One or more tables failed while running with the `continue` policy.
    #[error("{} table(s) failed: {}", .0.len(), .0.join(", "))]
    TablesFailed(Vec<String>),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Connection error for the given side ("source" or "target").
    pub fn connection(side: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Connection {
            side: side.into(),
            message: message.to_string(),
        }
    }

    /// Create a Schema error.
    pub fn schema(table: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Schema {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create a Provisioning error.
    pub fn provisioning(table: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Provisioning {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create a Transfer error.
    pub fn transfer(
        table: impl Into<String>,
        message: impl ToString,
        rows_committed: u64,
        commits: usize,
    ) -> Self {
        MigrateError::Transfer {
            table: table.into(),
            message: message.to_string(),
            rows_committed,
            commits,
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => 1,
            MigrateError::Connection { .. } => 2,
            MigrateError::Schema { .. } => 3,
            MigrateError::Provisioning { .. } => 4,
            MigrateError::Transfer { .. } => 5,
            MigrateError::Database(_) => 6,
            MigrateError::Io(_) => 7,
            MigrateError::Json(_) => 8,
            MigrateError::TablesFailed(_) => 9,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        // Add error chain for wrapped errors
        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
