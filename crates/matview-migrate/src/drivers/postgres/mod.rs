//! PostgreSQL driver.
//!
//! - [`PostgresDialect`]: SQL syntax strategy for PostgreSQL
//! - [`PostgresSource`]: Materialized view reflection and row streaming
//! - [`PostgresTarget`]: DDL and batched inserts under explicit commit control

mod dialect;
mod source;
mod target;
mod value;

pub use dialect::PostgresDialect;
pub use source::PostgresSource;
pub use target::PostgresTarget;

use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio_postgres::NoTls;
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::drivers::common::{make_tls_connector, SslMode};
use crate::error::{MigrateError, Result};

/// Open the single connection used for a whole run.
///
/// A one-slot pool keeps deadpool's connection management while guaranteeing
/// every statement of a run goes through the same session.
pub(crate) async fn connect(config: &DatabaseConfig, side: &str) -> Result<(Pool, Object)> {
    let manager_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };
    let pg_config = config.pg_config();

    let ssl_mode = SslMode::parse(&config.ssl_mode)?;
    let manager = match make_tls_connector(ssl_mode)? {
        Some(tls) => Manager::from_config(pg_config, tls, manager_config),
        None => {
            warn!(
                "{} connection to {} uses ssl_mode=disable; credentials travel unencrypted",
                side,
                config.display_name()
            );
            Manager::from_config(pg_config, NoTls, manager_config)
        }
    };

    let pool = Pool::builder(manager)
        .max_size(1)
        .build()
        .map_err(|e| MigrateError::connection(side, format!("building pool: {}", e)))?;

    let client = pool.get().await.map_err(|e| {
        MigrateError::connection(side, format!("connecting to {}: {}", config.display_name(), e))
    })?;

    client
        .simple_query("SELECT 1")
        .await
        .map_err(|e| MigrateError::connection(side, format!("test query failed: {}", e)))?;

    info!(
        "Connected to PostgreSQL {}: {} (schema {})",
        side,
        config.display_name(),
        config.schema
    );

    Ok((pool, client))
}
