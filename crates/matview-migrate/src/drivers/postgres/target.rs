//! PostgreSQL target connection.
//!
//! Auto-commit is emulated: with auto-commit off, the first statement opens a
//! transaction with `BEGIN` and [`TargetConnection::commit`] closes it.

use async_trait::async_trait;
use deadpool_postgres::{Object, Pool};
use futures::future::try_join_all;
use tokio_postgres::types::ToSql;
use tracing::{debug, warn};

use crate::config::DatabaseConfig;
use crate::core::{Dialect, DropOutcome, Row, TargetConnection};
use crate::error::Result;

use super::dialect::PostgresDialect;

/// Writes provisioned tables into a PostgreSQL schema.
pub struct PostgresTarget {
    pool: Pool,
    client: Object,
    schema: String,
    dialect: PostgresDialect,
    auto_commit: bool,
    in_transaction: bool,
}

impl PostgresTarget {
    /// Connect using the `target` section of the configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let (pool, client) = super::connect(config, "target").await?;
        Ok(Self {
            pool,
            client,
            schema: config.schema.clone(),
            dialect: PostgresDialect::new(),
            auto_commit: true,
            in_transaction: false,
        })
    }

    fn qualify(&self, table: &str) -> String {
        self.dialect.qualify(&self.schema, table)
    }

    async fn begin_if_needed(&mut self) -> Result<()> {
        if !self.auto_commit && !self.in_transaction {
            self.client.batch_execute("BEGIN").await?;
            self.in_transaction = true;
        }
        Ok(())
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let row = self
            .client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
                 WHERE table_schema = $1 AND table_name = $2)",
                &[&self.schema, &table],
            )
            .await?;
        Ok(row.get(0))
    }
}

#[async_trait]
impl TargetConnection for PostgresTarget {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn schema(&self) -> &str {
        &self.schema
    }

    async fn drop_table(&mut self, table: &str) -> DropOutcome {
        match self.table_exists(table).await {
            Ok(false) => return DropOutcome::Absent,
            Ok(true) => {}
            Err(e) => return DropOutcome::Failed(e.to_string()),
        }

        let sql = format!("DROP TABLE {}", self.qualify(table));
        match self.execute(&sql).await {
            Ok(_) => DropOutcome::Dropped,
            Err(e) => DropOutcome::Failed(e.to_string()),
        }
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        self.begin_if_needed().await?;
        Ok(self.client.execute(sql, &[]).await?)
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    async fn set_auto_commit(&mut self, enabled: bool) -> Result<()> {
        let discard = enabled && self.in_transaction;
        self.auto_commit = enabled;
        if discard {
            self.in_transaction = false;
            warn!("Discarding uncommitted work on {}", self.schema);
            self.client.batch_execute("ROLLBACK").await?;
        }
        Ok(())
    }

    async fn execute_batch(&mut self, sql: &str, rows: &[Row]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        self.begin_if_needed().await?;

        let stmt = self.client.prepare_cached(sql).await?;
        let client = &self.client;
        let stmt = &stmt;

        // Executes are issued together and pipelined on the one connection
        let pending = rows.iter().map(|row| async move {
            let params: Vec<&(dyn ToSql + Sync)> =
                row.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
            client.execute(stmt, &params).await
        });

        let counts = try_join_all(pending).await?;
        let affected = counts.iter().sum();
        debug!("Executed batch of {} rows", rows.len());
        Ok(affected)
    }

    async fn commit(&mut self) -> Result<()> {
        if self.in_transaction {
            self.in_transaction = false;
            self.client.batch_execute("COMMIT").await?;
        }
        Ok(())
    }

    async fn row_count(&mut self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.qualify(table));
        let row = self.client.query_one(&sql, &[]).await?;
        Ok(row.get(0))
    }

    async fn ping(&mut self) -> Result<()> {
        self.client.simple_query("SELECT 1").await?;
        Ok(())
    }

    async fn close(&mut self) {
        if self.in_transaction {
            if let Err(e) = self.set_auto_commit(true).await {
                warn!("Rollback on close failed: {}", e);
            }
        }
        self.pool.close();
    }
}
