//! In-memory connections for engine tests.

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use crate::core::{
    ColumnDescriptor, Dialect, DropOutcome, Row, RowStream, SourceConnection, SqlValue,
    TargetConnection,
};
use crate::drivers::PostgresDialect;
use crate::error::{MigrateError, Result};

fn fail(message: impl Into<String>) -> MigrateError {
    MigrateError::Io(io::Error::other(message.into()))
}

/// `n` rows of `(id int8, label text)`, ids starting at 1.
pub(crate) fn numbered_rows(n: usize) -> Vec<Row> {
    (1..=n as i64)
        .map(|i| vec![SqlValue::I64(i), SqlValue::Text(format!("row {i}"))])
        .collect()
}

/// Bare table name from a quoted, schema-qualified one.
fn table_of(qualified: &str) -> String {
    qualified
        .rsplit("\".\"")
        .next()
        .unwrap_or(qualified)
        .trim_matches('"')
        .to_string()
}

/// Source backed by in-memory relations.
#[derive(Default)]
pub(crate) struct MemorySource {
    views: Vec<String>,
    relations: HashMap<String, (Vec<ColumnDescriptor>, Vec<Row>)>,
    fail_after: HashMap<String, usize>,
    closed: Arc<AtomicBool>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a materialized view; discovery returns views in insertion order.
    pub fn with_view(mut self, name: &str, columns: Vec<ColumnDescriptor>, rows: Vec<Row>) -> Self {
        self.views.push(name.to_string());
        self.relations.insert(name.to_string(), (columns, rows));
        self
    }

    /// Add a relation that discovery does not report.
    pub fn with_table(mut self, name: &str, columns: Vec<ColumnDescriptor>, rows: Vec<Row>) -> Self {
        self.relations.insert(name.to_string(), (columns, rows));
        self
    }

    /// Make the row stream of `name` fail after `rows` rows.
    pub fn fail_read_after(mut self, name: &str, rows: usize) -> Self {
        self.fail_after.insert(name.to_string(), rows);
        self
    }

    /// Flag set once `close` has run.
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }

    fn relation(&self, name: &str) -> Result<&(Vec<ColumnDescriptor>, Vec<Row>)> {
        self.relations
            .get(name)
            .ok_or_else(|| MigrateError::schema(name, "relation does not exist"))
    }
}

#[async_trait]
impl SourceConnection for MemorySource {
    fn schema(&self) -> &str {
        "public"
    }

    async fn discover_materialized_views(&mut self) -> Result<Vec<String>> {
        Ok(self.views.clone())
    }

    async fn describe_columns(&mut self, relation: &str) -> Result<Vec<ColumnDescriptor>> {
        Ok(self.relation(relation)?.0.clone())
    }

    async fn read_rows<'a>(
        &'a mut self,
        relation: &str,
        _columns: &[ColumnDescriptor],
    ) -> Result<RowStream<'a>> {
        let rows = self.relation(relation)?.1.clone();
        let mut items: Vec<Result<Row>> = match self.fail_after.get(relation) {
            Some(&n) => rows.into_iter().take(n).map(Ok).collect(),
            None => rows.into_iter().map(Ok).collect(),
        };
        if self.fail_after.contains_key(relation) {
            items.push(Err(fail("connection reset by peer")));
        }
        Ok(stream::iter(items).boxed())
    }

    async fn row_count(&mut self, relation: &str) -> Result<i64> {
        Ok(self.relation(relation)?.1.len() as i64)
    }

    async fn ping(&mut self) -> Result<()> {
        Ok(())
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct MemTable {
    columns: usize,
    rows: Vec<Row>,
}

struct TargetState {
    tables: HashMap<String, MemTable>,
    pending: Vec<(String, Row)>,
    auto_commit: bool,
    commits: Vec<usize>,
    batches: usize,
    fail_batch: Option<usize>,
    fail_create: HashSet<String>,
    locked: HashSet<String>,
    closed: bool,
}

/// Target backed by in-memory tables. Clones share state.
#[derive(Clone)]
pub(crate) struct MemoryTarget {
    dialect: PostgresDialect,
    state: Arc<Mutex<TargetState>>,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self {
            dialect: PostgresDialect::new(),
            state: Arc::new(Mutex::new(TargetState {
                tables: HashMap::new(),
                pending: Vec::new(),
                auto_commit: true,
                commits: Vec::new(),
                batches: 0,
                fail_batch: None,
                fail_create: HashSet::new(),
                locked: HashSet::new(),
                closed: false,
            })),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, TargetState> {
        self.state.lock().unwrap()
    }

    /// Rows per commit, in order.
    pub fn commits(&self) -> Vec<usize> {
        self.state().commits.clone()
    }

    /// Committed rows of `table`.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.state()
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub fn column_count(&self, table: &str) -> Option<usize> {
        self.state().tables.get(table).map(|t| t.columns)
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state().tables.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn batches_executed(&self) -> usize {
        self.state().batches
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// Put `n` committed rows into an existing table.
    pub fn seed_rows(&self, table: &str, n: usize) {
        let mut state = self.state();
        if let Some(t) = state.tables.get_mut(table) {
            t.rows.extend(numbered_rows(n));
        }
    }

    /// Make the `n`th batch execute (1-based) fail.
    pub fn fail_batch(&self, n: usize) {
        self.state().fail_batch = Some(n);
    }

    /// Make CREATE TABLE of `table` fail.
    pub fn fail_create(&self, table: &str) {
        self.state().fail_create.insert(table.to_string());
    }

    /// Make DROP TABLE of `table` fail.
    pub fn lock_table(&self, table: &str) {
        self.state().locked.insert(table.to_string());
    }
}

#[async_trait]
impl TargetConnection for MemoryTarget {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn schema(&self) -> &str {
        "public"
    }

    async fn drop_table(&mut self, table: &str) -> DropOutcome {
        let mut state = self.state();
        if state.locked.contains(table) {
            return DropOutcome::Failed("table is locked".into());
        }
        match state.tables.remove(table) {
            Some(_) => DropOutcome::Dropped,
            None => DropOutcome::Absent,
        }
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        let mut state = self.state();
        if let Some(rest) = sql.strip_prefix("CREATE TABLE ") {
            let (qualified, defs) = rest.split_once(" (").ok_or_else(|| fail("bad DDL"))?;
            let table = table_of(qualified);
            if state.fail_create.contains(&table) {
                return Err(fail(format!("permission denied for schema public ({})", table)));
            }
            if state.tables.contains_key(&table) {
                return Err(fail(format!("relation \"{}\" already exists", table)));
            }
            let columns = defs.matches(", \"").count() + 1;
            state.tables.insert(table, MemTable { columns, rows: Vec::new() });
        }
        Ok(0)
    }

    fn auto_commit(&self) -> bool {
        self.state().auto_commit
    }

    async fn set_auto_commit(&mut self, enabled: bool) -> Result<()> {
        let mut state = self.state();
        if enabled {
            state.pending.clear();
        }
        state.auto_commit = enabled;
        Ok(())
    }

    async fn execute_batch(&mut self, sql: &str, rows: &[Row]) -> Result<u64> {
        let mut state = self.state();
        state.batches += 1;
        if state.fail_batch == Some(state.batches) {
            return Err(fail("duplicate key value violates unique constraint"));
        }

        let qualified = sql
            .strip_prefix("INSERT INTO ")
            .and_then(|rest| rest.split_once(" ("))
            .map(|(q, _)| q)
            .ok_or_else(|| fail("bad INSERT"))?;
        let table = table_of(qualified);
        let columns = state
            .tables
            .get(&table)
            .map(|t| t.columns)
            .ok_or_else(|| fail(format!("relation \"{}\" does not exist", table)))?;

        for row in rows {
            if row.len() != columns {
                return Err(fail("column count mismatch"));
            }
            state.pending.push((table.clone(), row.clone()));
        }
        if state.auto_commit {
            let pending = std::mem::take(&mut state.pending);
            for (t, row) in pending {
                state.tables.entry(t).or_default().rows.push(row);
            }
        }
        Ok(rows.len() as u64)
    }

    async fn commit(&mut self) -> Result<()> {
        let mut state = self.state();
        let pending = std::mem::take(&mut state.pending);
        state.commits.push(pending.len());
        for (table, row) in pending {
            state.tables.entry(table).or_default().rows.push(row);
        }
        Ok(())
    }

    async fn row_count(&mut self, table: &str) -> Result<i64> {
        let state = self.state();
        state
            .tables
            .get(table)
            .map(|t| t.rows.len() as i64)
            .ok_or_else(|| fail(format!("relation \"{}\" does not exist", table)))
    }

    async fn ping(&mut self) -> Result<()> {
        Ok(())
    }

    async fn close(&mut self) {
        self.state().closed = true;
    }
}
