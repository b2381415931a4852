//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl DatabaseConfig {
    /// Host, port and database, without credentials. Used in log lines.
    pub fn display_name(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }

    /// Build a tokio-postgres configuration.
    pub fn pg_config(&self) -> tokio_postgres::Config {
        let mut pg_config = tokio_postgres::Config::new();
        pg_config.host(&self.host);
        pg_config.port(self.port);
        pg_config.dbname(&self.database);
        pg_config.user(&self.user);
        pg_config.password(&self.password);
        pg_config.application_name("matview-migrate");
        pg_config
    }
}

/// Split a comma-separated table list, trimming blanks.
///
/// `"a, b,,c"` becomes `["a", "b", "c"]`.
pub fn parse_table_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolve a configured relation name the way PostgreSQL resolves an
/// identifier in SQL text.
///
/// `MV_Sales` folds to `mv_sales`; `"MV_Sales"` keeps its case, with `""`
/// inside the quotes standing for one `"`.
pub fn fold_identifier(name: &str) -> String {
    match name
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        Some(quoted) => quoted.replace("\"\"", "\""),
        None => name.to_lowercase(),
    }
}
