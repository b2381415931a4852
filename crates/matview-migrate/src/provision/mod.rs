//! Target table provisioning.

use tracing::{debug, info, warn};

use crate::core::{ColumnDescriptor, Dialect, DropOutcome, TargetConnection};
use crate::error::{MigrateError, Result};
use crate::typemap::map_column;

/// What happened while provisioning one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionOutcome {
    /// Result of the best-effort drop.
    pub drop: DropOutcome,
    /// The CREATE TABLE statement that was executed.
    pub ddl: String,
}

/// Build `CREATE TABLE` for `qualified` with one column per descriptor, in slice order.
pub fn build_create_table(
    dialect: &dyn Dialect,
    qualified: &str,
    columns: &[ColumnDescriptor],
) -> String {
    let defs = columns
        .iter()
        .map(|c| format!("{} {}", dialect.quote_ident(&c.name), map_column(c)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({})", qualified, defs)
}

/// Drop and recreate `table` on the target with the given columns.
///
/// Destructive: an existing table of the same name is dropped with all its
/// data, unconditionally. A failed drop is only logged; if the table is still
/// there the following CREATE fails with [`MigrateError::Provisioning`].
pub async fn provision<T>(
    target: &mut T,
    table: &str,
    columns: &[ColumnDescriptor],
) -> Result<ProvisionOutcome>
where
    T: TargetConnection + ?Sized,
{
    if columns.is_empty() {
        return Err(MigrateError::provisioning(table, "no columns to create"));
    }

    let drop = target.drop_table(table).await;
    match &drop {
        DropOutcome::Dropped => info!("Dropped existing table {}", table),
        DropOutcome::Absent => debug!("Table {} did not exist", table),
        DropOutcome::Failed(reason) => warn!("Could not drop table {}: {}", table, reason),
    }

    let qualified = target.dialect().qualify(target.schema(), table);
    let ddl = build_create_table(target.dialect(), &qualified, columns);
    debug!("{}", ddl);

    target
        .execute(&ddl)
        .await
        .map_err(|e| MigrateError::provisioning(table, e))?;

    info!("Created table {} ({} columns)", qualified, columns.len());
    Ok(ProvisionOutcome { drop, ddl })
}
