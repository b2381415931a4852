//! Schema reflection: relation discovery and column description.

use tracing::{debug, info};

use crate::core::{ColumnDescriptor, SourceConnection};
use crate::error::{MigrateError, Result};

/// Materialized views of the source schema, in catalog order.
pub async fn discover_tables<S>(source: &mut S) -> Result<Vec<String>>
where
    S: SourceConnection + ?Sized,
{
    let schema = source.schema().to_string();
    let tables = source
        .discover_materialized_views()
        .await
        .map_err(|e| as_schema_error(&schema, e))?;

    info!(
        "Discovered {} materialized views in schema {}",
        tables.len(),
        schema
    );
    Ok(tables)
}

/// Ordered column descriptors of `table`, read without fetching rows.
///
/// Fails with [`MigrateError::Schema`] when the relation is missing,
/// inaccessible or has no columns.
pub async fn describe_columns<S>(source: &mut S, table: &str) -> Result<Vec<ColumnDescriptor>>
where
    S: SourceConnection + ?Sized,
{
    let mut columns = source
        .describe_columns(table)
        .await
        .map_err(|e| as_schema_error(table, e))?;

    if columns.is_empty() {
        return Err(MigrateError::schema(table, "relation has no columns"));
    }

    columns.sort_by_key(|c| c.ordinal_position);

    for col in &columns {
        debug!(
            "{}.{}: {} precision={} scale={}",
            table, col.name, col.native_type, col.precision, col.scale
        );
    }
    Ok(columns)
}

fn as_schema_error(table: &str, err: MigrateError) -> MigrateError {
    match err {
        MigrateError::Schema { .. } => err,
        other => MigrateError::schema(table, other),
    }
}
