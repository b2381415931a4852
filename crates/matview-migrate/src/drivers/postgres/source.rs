//! PostgreSQL source connection.

use std::collections::HashMap;

use async_trait::async_trait;
use deadpool_postgres::{Object, Pool};
use futures::StreamExt;
use tokio_postgres::types::{ToSql, Type};
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::core::{ColumnDescriptor, Dialect, RowStream, SourceConnection};
use crate::error::{MigrateError, Result};

use super::dialect::PostgresDialect;
use super::value::decode_row;

/// Reads materialized views from a PostgreSQL schema.
pub struct PostgresSource {
    pool: Pool,
    client: Object,
    schema: String,
    dialect: PostgresDialect,
}

impl PostgresSource {
    /// Connect using the `source` section of the configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let (pool, client) = super::connect(config, "source").await?;
        Ok(Self {
            pool,
            client,
            schema: config.schema.clone(),
            dialect: PostgresDialect::new(),
        })
    }

    fn qualify(&self, relation: &str) -> String {
        self.dialect.qualify(&self.schema, relation)
    }

    /// `atttypmod` of every attribute of the given relations, keyed by (oid, attnum).
    async fn load_typmods(&self, oids: &[u32]) -> Result<HashMap<(u32, i16), i32>> {
        let rows = self
            .client
            .query(
                "SELECT attrelid, attnum, atttypmod FROM pg_catalog.pg_attribute \
                 WHERE attrelid = ANY($1) AND attnum > 0 AND NOT attisdropped",
                &[&oids],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|r| ((r.get::<_, u32>(0), r.get::<_, i16>(1)), r.get::<_, i32>(2)))
            .collect())
    }
}

/// Decode precision and scale from a type modifier.
///
/// Types without a modifier (or with `-1`) report `(0, 0)`.
pub(crate) fn precision_scale(ty: &Type, typmod: i32) -> (i32, i32) {
    const VARHDRSZ: i32 = 4;

    if typmod < 0 {
        return (0, 0);
    }

    match *ty {
        Type::NUMERIC => {
            let t = typmod - VARHDRSZ;
            ((t >> 16) & 0xffff, (t & 0xffff) as i16 as i32)
        }
        Type::VARCHAR | Type::BPCHAR => (typmod - VARHDRSZ, 0),
        Type::BIT | Type::VARBIT => (typmod, 0),
        Type::TIME | Type::TIMETZ | Type::TIMESTAMP | Type::TIMESTAMPTZ | Type::INTERVAL => {
            (0, typmod & 0xffff)
        }
        _ => (0, 0),
    }
}

#[async_trait]
impl SourceConnection for PostgresSource {
    fn schema(&self) -> &str {
        &self.schema
    }

    async fn discover_materialized_views(&mut self) -> Result<Vec<String>> {
        let rows = self
            .client
            .query(
                "SELECT matviewname FROM pg_catalog.pg_matviews \
                 WHERE schemaname = $1 ORDER BY matviewname",
                &[&self.schema],
            )
            .await?;

        Ok(rows.iter().map(|r| r.get::<_, String>(0)).collect())
    }

    async fn describe_columns(&mut self, relation: &str) -> Result<Vec<ColumnDescriptor>> {
        // Preparing a zero-row query yields the result shape without fetching data
        let shape_query = format!("SELECT * FROM {} LIMIT 0", self.qualify(relation));
        let stmt = self
            .client
            .prepare(&shape_query)
            .await
            .map_err(|e| MigrateError::schema(relation, e))?;

        let mut oids: Vec<u32> = stmt.columns().iter().filter_map(|c| c.table_oid()).collect();
        oids.sort_unstable();
        oids.dedup();
        let typmods = self
            .load_typmods(&oids)
            .await
            .map_err(|e| MigrateError::schema(relation, e))?;

        let columns: Vec<ColumnDescriptor> = stmt
            .columns()
            .iter()
            .enumerate()
            .map(|(i, col)| {
                let typmod = match (col.table_oid(), col.column_id()) {
                    (Some(oid), Some(attnum)) => typmods.get(&(oid, attnum)).copied().unwrap_or(-1),
                    _ => -1,
                };
                let (precision, scale) = precision_scale(col.type_(), typmod);
                ColumnDescriptor::new(col.name(), col.type_().name(), precision, scale, i as i32 + 1)
            })
            .collect();

        debug!("{}: {} columns", relation, columns.len());
        Ok(columns)
    }

    async fn read_rows<'a>(
        &'a mut self,
        relation: &str,
        columns: &[ColumnDescriptor],
    ) -> Result<RowStream<'a>> {
        let col_list = columns
            .iter()
            .map(|c| self.dialect.quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("SELECT {} FROM {}", col_list, self.qualify(relation));

        let params: Vec<&(dyn ToSql + Sync)> = Vec::new();
        let stream = self.client.query_raw(sql.as_str(), params).await?;

        Ok(stream
            .map(|row| row.map_err(MigrateError::from).and_then(|r| decode_row(&r)))
            .boxed())
    }

    async fn row_count(&mut self, relation: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.qualify(relation));
        let row = self.client.query_one(&sql, &[]).await?;
        Ok(row.get(0))
    }

    async fn ping(&mut self) -> Result<()> {
        self.client.simple_query("SELECT 1").await?;
        Ok(())
    }

    async fn close(&mut self) {
        self.pool.close();
    }
}
