//! Configuration validation.

use super::{fold_identifier, Config, DatabaseConfig};
use crate::drivers::common::SslMode;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    validate_database("source", &config.source)?;
    validate_database("target", &config.target)?;

    // Drop-and-recreate into the relations we read from would destroy the source
    if config.source.host == config.target.host
        && config.source.port == config.target.port
        && config.source.database == config.target.database
        && config.source.schema == config.target.schema
    {
        return Err(MigrateError::Config(
            "source and target cannot be the same schema of the same database".into(),
        ));
    }

    let migration = &config.migration;
    if migration.batch_size == 0 {
        return Err(MigrateError::Config(
            "migration.batch_size must be at least 1".into(),
        ));
    }
    let blank = |name: &&String| fold_identifier(name.trim()).trim().is_empty();
    if let Some(name) = migration.source_tables.iter().find(blank) {
        return Err(MigrateError::Config(format!(
            "migration.source_tables contains a blank name: '{}'",
            name
        )));
    }
    if let Some(name) = migration.target_tables.iter().find(blank) {
        return Err(MigrateError::Config(format!(
            "migration.target_tables contains a blank name: '{}'",
            name
        )));
    }

    Ok(())
}

fn validate_database(side: &str, db: &DatabaseConfig) -> Result<()> {
    if db.host.is_empty() {
        return Err(MigrateError::Config(format!("{}.host is required", side)));
    }
    if db.database.is_empty() {
        return Err(MigrateError::Config(format!("{}.database is required", side)));
    }
    if db.user.is_empty() {
        return Err(MigrateError::Config(format!("{}.user is required", side)));
    }
    if db.schema.is_empty() {
        return Err(MigrateError::Config(format!("{}.schema is required", side)));
    }
    SslMode::parse(&db.ssl_mode)
        .map_err(|e| MigrateError::Config(format!("{}: {}", side, e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FailurePolicy, MigrationConfig};

    fn valid_config() -> Config {
        Config {
            source: DatabaseConfig {
                host: "localhost".to_string(),
                port: 5432,
                database: "warehouse".to_string(),
                user: "reader".to_string(),
                password: "password".to_string(),
                schema: "public".to_string(),
                ssl_mode: "disable".to_string(),
            },
            target: DatabaseConfig {
                host: "localhost".to_string(),
                port: 5432,
                database: "reporting".to_string(),
                user: "writer".to_string(),
                password: "password".to_string(),
                schema: "public".to_string(),
                ssl_mode: "disable".to_string(),
            },
            migration: MigrationConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_missing_source_host() {
        let mut config = valid_config();
        config.source.host = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_target_user() {
        let mut config = valid_config();
        config.target.user = "".to_string();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("target.user"));
    }

    #[test]
    fn test_invalid_ssl_mode() {
        let mut config = valid_config();
        config.target.ssl_mode = "sometimes".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_same_schema_same_database_rejected() {
        let mut config = valid_config();
        config.target.database = config.source.database.clone();
        assert!(validate(&config).is_err());

        config.target.schema = "reporting".to_string();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = valid_config();
        config.migration.batch_size = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_blank_table_name_rejected() {
        let mut config = valid_config();
        config.migration.source_tables = vec!["mv_sales".into(), " ".into()];
        assert!(validate(&config).is_err());

        let mut config = valid_config();
        config.migration.target_tables = vec!["\"\"".into()];
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_continue_policy_is_valid() {
        let mut config = valid_config();
        config.migration.on_table_error = FailurePolicy::Continue;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_source_config_debug_redacts_password() {
        let mut config = valid_config();
        config.source.password = "super_secret_password_123".to_string();
        let debug_output = format!("{:?}", config.source);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_123"),
            "Debug output should not contain actual password value"
        );
    }

    #[test]
    fn test_target_config_debug_redacts_password() {
        let mut config = valid_config();
        config.target.password = "super_secret_password_456".to_string();
        let debug_output = format!("{:?}", config);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_password_456"));
    }
}
