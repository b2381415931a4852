//! Migration orchestrator - coordinates the migration workflow.
//!
//! A run resolves the source relation names, pairs them with target names
//! into a [`MigrationPlan`], then moves each table in order through
//! describe, provision and transfer.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::{fold_identifier, Config, DatabaseConfig, FailurePolicy};
use crate::core::{MigrationPlan, SourceConnection, TableMigrationTask, TargetConnection};
use crate::drivers::{PostgresSource, PostgresTarget};
use crate::error::{MigrateError, Result};
use crate::progress::{ProgressSink, ProgressUpdate};
use crate::provision::provision;
use crate::reflect::{describe_columns, discover_tables};
use crate::transfer::{TransferEngine, TransferStats};

/// Pair source names with target names positionally.
///
/// Missing target names default to the source name; surplus target names are
/// ignored. When some but not all target names are given, the plan is marked
/// `padded` and a warning is logged.
pub fn build_plan(source_names: &[String], target_names: &[String]) -> MigrationPlan {
    if target_names.len() > source_names.len() {
        debug!(
            "Ignoring {} surplus target names: {:?}",
            target_names.len() - source_names.len(),
            &target_names[source_names.len()..]
        );
    }

    let padded = !target_names.is_empty() && target_names.len() < source_names.len();
    if padded {
        warn!(
            "{} target names for {} source relations; the remaining {} keep their source names",
            target_names.len(),
            source_names.len(),
            source_names.len() - target_names.len()
        );
    }

    let tasks = source_names
        .iter()
        .enumerate()
        .map(|(i, source)| {
            let target = target_names.get(i).unwrap_or(source);
            TableMigrationTask::new(source.as_str(), target.as_str())
        })
        .collect();

    MigrationPlan { tasks, padded }
}

/// Step of a table task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Describe,
    Provision,
    Transfer,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Describe => "describe",
            Phase::Provision => "provision",
            Phase::Transfer => "transfer",
        };
        f.write_str(name)
    }
}

/// Final status of a run or table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Completed => f.write_str("completed"),
            RunStatus::Failed => f.write_str("failed"),
        }
    }
}

/// Outcome of one table task.
#[derive(Debug, Clone, Serialize)]
pub struct TableOutcome {
    pub source: String,
    pub target: String,
    pub status: RunStatus,
    pub rows: u64,
    pub commits: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_seconds: f64,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status.
    pub status: RunStatus,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Total tables processed.
    pub tables_total: usize,

    /// Tables successfully migrated.
    pub tables_success: usize,

    /// Tables that failed.
    pub tables_failed: usize,

    /// Total rows transferred.
    pub rows_transferred: u64,

    /// Average throughput (rows/second).
    pub rows_per_second: u64,

    /// Whether target names were padded with source names.
    pub plan_padded: bool,

    /// Per-table outcomes in plan order.
    pub tables: Vec<TableOutcome>,
}

impl MigrationResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Source names of the failed tables.
    pub fn failed_tables(&self) -> Vec<String> {
        self.tables
            .iter()
            .filter(|t| t.status == RunStatus::Failed)
            .map(|t| t.source.clone())
            .collect()
    }
}

/// Row counts of one planned table on both sides.
#[derive(Debug, Clone, Serialize)]
pub struct TableValidation {
    pub source: String,
    pub target: String,
    pub source_rows: i64,
    /// `None` when the target table is missing or unreadable.
    pub target_rows: Option<i64>,
    pub matches: bool,
}

/// Connectivity of both databases.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    pub healthy: bool,
    pub source_connected: bool,
    pub source_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_error: Option<String>,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_error: Option<String>,
}

impl HealthCheckResult {
    /// Combine the outcome and latency of each side.
    pub fn from_checks(source: (Result<()>, u64), target: (Result<()>, u64)) -> Self {
        let (source, source_latency_ms) = source;
        let (target, target_latency_ms) = target;
        Self {
            healthy: source.is_ok() && target.is_ok(),
            source_connected: source.is_ok(),
            source_latency_ms,
            source_error: source.err().map(|e| e.to_string()),
            target_connected: target.is_ok(),
            target_latency_ms,
            target_error: target.err().map(|e| e.to_string()),
        }
    }
}

async fn timed<F>(check: F) -> (Result<()>, u64)
where
    F: std::future::Future<Output = Result<()>>,
{
    let start = Instant::now();
    let result = check.await;
    (result, start.elapsed().as_millis() as u64)
}

async fn check_source(config: &DatabaseConfig) -> Result<()> {
    let mut source = PostgresSource::connect(config).await?;
    let pinged = source.ping().await;
    source.close().await;
    pinged
}

async fn check_target(config: &DatabaseConfig) -> Result<()> {
    let mut target = PostgresTarget::connect(config).await?;
    let pinged = target.ping().await;
    target.close().await;
    pinged
}

/// Migration orchestrator.
///
/// Owns one source and one target connection for its lifetime. Every public
/// entry point consumes the orchestrator and closes both connections before
/// returning, on success or failure.
pub struct Orchestrator {
    config: Config,
    source: Box<dyn SourceConnection>,
    target: Box<dyn TargetConnection>,
    progress: ProgressSink,
}

impl Orchestrator {
    /// Validate the configuration and connect to both databases.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let mut source = PostgresSource::connect(&config.source).await?;
        let target = match PostgresTarget::connect(&config.target).await {
            Ok(target) => target,
            Err(e) => {
                source.close().await;
                return Err(e);
            }
        };

        Ok(Self::with_connections(config, Box::new(source), Box::new(target)))
    }

    /// Connect to each database in turn and ping it.
    ///
    /// Unlike [`Orchestrator::new`], a database that cannot be reached is
    /// reported in the result rather than returned as an error. Only an
    /// invalid configuration fails the call.
    pub async fn check_health(config: &Config) -> Result<HealthCheckResult> {
        config.validate()?;
        let source = timed(check_source(&config.source)).await;
        let target = timed(check_target(&config.target)).await;
        Ok(HealthCheckResult::from_checks(source, target))
    }

    /// Build an orchestrator over already-open connections.
    pub fn with_connections(
        config: Config,
        source: Box<dyn SourceConnection>,
        target: Box<dyn TargetConnection>,
    ) -> Self {
        Self {
            config,
            source,
            target,
            progress: ProgressSink::default(),
        }
    }

    /// Send progress updates to `tx`.
    pub fn with_progress(mut self, tx: mpsc::Sender<ProgressUpdate>) -> Self {
        self.progress = ProgressSink::new(tx);
        self
    }

    /// Resolve names and build the plan without touching the target.
    pub async fn plan(mut self) -> Result<MigrationPlan> {
        let plan = self.build_run_plan().await;
        self.close_connections().await;
        plan
    }

    /// Run the migration.
    pub async fn run(mut self) -> Result<MigrationResult> {
        let result = self.execute_run().await;
        self.close_connections().await;
        result
    }

    /// Compare source and target row counts for every planned table.
    pub async fn validate(mut self) -> Result<Vec<TableValidation>> {
        let result = self.validate_counts().await;
        self.close_connections().await;
        result
    }

    /// Ping both open connections.
    pub async fn health_check(mut self) -> Result<HealthCheckResult> {
        let source = timed(self.source.ping()).await;
        let target = timed(self.target.ping()).await;
        self.close_connections().await;
        Ok(HealthCheckResult::from_checks(source, target))
    }

    /// Release both connections.
    pub async fn close(mut self) {
        self.close_connections().await;
    }

    async fn close_connections(&mut self) {
        self.source.close().await;
        self.target.close().await;
        debug!("Connections closed");
    }

    async fn build_run_plan(&mut self) -> Result<MigrationPlan> {
        let source_names = if self.config.migration.source_tables.is_empty() {
            discover_tables(self.source.as_mut()).await?
        } else {
            info!(
                "Using {} configured source relations",
                self.config.migration.source_tables.len()
            );
            self.config
                .migration
                .source_tables
                .iter()
                .map(|name| fold_identifier(name))
                .collect()
        };

        if source_names.is_empty() {
            warn!(
                "No materialized views found in source schema {}",
                self.source.schema()
            );
        }

        let target_names: Vec<String> = self
            .config
            .migration
            .target_tables
            .iter()
            .map(|name| fold_identifier(name))
            .collect();

        Ok(build_plan(&source_names, &target_names))
    }

    async fn execute_run(&mut self) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!("Starting migration run: {}", run_id);

        self.progress
            .send(ProgressUpdate::Connected {
                source: self.config.source.display_name(),
                target: self.config.target.display_name(),
            })
            .await;

        info!("Phase 1: Building migration plan");
        let plan = self.build_run_plan().await?;
        info!("Planned {} tables", plan.len());
        self.progress
            .send(ProgressUpdate::PlanReady {
                tables: plan.len(),
                padded: plan.padded,
            })
            .await;
        if plan.padded {
            self.progress
                .send(ProgressUpdate::Warning {
                    message: "fewer target names than source relations; padded with source names"
                        .into(),
                })
                .await;
        }

        info!("Phase 2: Migrating tables");
        let engine = TransferEngine::new(self.config.migration.batch_size)?
            .with_progress(self.progress.clone());
        let policy = self.config.migration.on_table_error;
        let mut outcomes = Vec::with_capacity(plan.len());

        for (i, task) in plan.iter().enumerate() {
            info!(
                "[{}/{}] {} -> {}",
                i + 1,
                plan.len(),
                task.source_name,
                task.target_name
            );
            self.progress
                .send(ProgressUpdate::TableStarted {
                    source: task.source_name.clone(),
                    target: task.target_name.clone(),
                })
                .await;

            let start = Instant::now();
            match self.migrate_table(&engine, task).await {
                Ok(stats) => {
                    info!(
                        "{}: {} rows in {} commits ({:.1}s, read {:.1}s, write {:.1}s)",
                        task.target_name,
                        stats.rows,
                        stats.commits,
                        start.elapsed().as_secs_f64(),
                        stats.read_time.as_secs_f64(),
                        stats.write_time.as_secs_f64()
                    );
                    self.progress
                        .send(ProgressUpdate::TableCompleted {
                            table: task.target_name.clone(),
                            rows: stats.rows,
                            commits: stats.commits,
                        })
                        .await;
                    outcomes.push(TableOutcome {
                        source: task.source_name.clone(),
                        target: task.target_name.clone(),
                        status: RunStatus::Completed,
                        rows: stats.rows,
                        commits: stats.commits,
                        phase: None,
                        error: None,
                        duration_seconds: start.elapsed().as_secs_f64(),
                    });
                }
                Err((phase, e)) => {
                    error!(
                        "{} -> {} failed during {}: {}",
                        task.source_name, task.target_name, phase, e
                    );
                    self.progress
                        .send(ProgressUpdate::TableFailed {
                            table: task.target_name.clone(),
                            phase: phase.to_string(),
                            error: e.to_string(),
                        })
                        .await;

                    if policy == FailurePolicy::Abort {
                        return Err(e);
                    }

                    let (rows, commits) = match &e {
                        MigrateError::Transfer {
                            rows_committed,
                            commits,
                            ..
                        } => (*rows_committed, *commits),
                        _ => (0, 0),
                    };
                    outcomes.push(TableOutcome {
                        source: task.source_name.clone(),
                        target: task.target_name.clone(),
                        status: RunStatus::Failed,
                        rows,
                        commits,
                        phase: Some(phase),
                        error: Some(e.to_string()),
                        duration_seconds: start.elapsed().as_secs_f64(),
                    });
                }
            }
        }

        let completed_at = Utc::now();
        let duration = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

        let tables_success = outcomes
            .iter()
            .filter(|t| t.status == RunStatus::Completed)
            .count();
        let tables_failed = outcomes.len() - tables_success;
        let rows_transferred: u64 = outcomes
            .iter()
            .filter(|t| t.status == RunStatus::Completed)
            .map(|t| t.rows)
            .sum();
        let rows_per_second = if duration > 0.0 {
            (rows_transferred as f64 / duration) as u64
        } else {
            0
        };
        let status = if tables_failed > 0 {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };

        info!(
            "Migration {}: {}/{} tables, {} rows in {:.1}s ({} rows/sec)",
            status,
            tables_success,
            outcomes.len(),
            rows_transferred,
            duration,
            rows_per_second
        );
        self.progress
            .send(ProgressUpdate::RunCompleted {
                status: status.to_string(),
                tables_success,
                tables_failed,
                rows_transferred,
            })
            .await;

        Ok(MigrationResult {
            run_id,
            status,
            duration_seconds: duration,
            started_at,
            completed_at,
            tables_total: outcomes.len(),
            tables_success,
            tables_failed,
            rows_transferred,
            rows_per_second,
            plan_padded: plan.padded,
            tables: outcomes,
        })
    }

    async fn migrate_table(
        &mut self,
        engine: &TransferEngine,
        task: &TableMigrationTask,
    ) -> std::result::Result<TransferStats, (Phase, MigrateError)> {
        let columns = describe_columns(self.source.as_mut(), &task.source_name)
            .await
            .map_err(|e| (Phase::Describe, e))?;

        let outcome = provision(self.target.as_mut(), &task.target_name, &columns)
            .await
            .map_err(|e| (Phase::Provision, e))?;
        self.progress
            .send(ProgressUpdate::TableProvisioned {
                table: task.target_name.clone(),
                dropped: outcome.drop == crate::core::DropOutcome::Dropped,
            })
            .await;

        engine
            .transfer(
                self.source.as_mut(),
                self.target.as_mut(),
                &task.source_name,
                &task.target_name,
                &columns,
            )
            .await
            .map_err(|e| (Phase::Transfer, e))
    }

    async fn validate_counts(&mut self) -> Result<Vec<TableValidation>> {
        let plan = self.build_run_plan().await?;
        let mut results = Vec::with_capacity(plan.len());

        for task in &plan {
            let source_rows = self.source.row_count(&task.source_name).await?;
            let target_rows = match self.target.row_count(&task.target_name).await {
                Ok(n) => Some(n),
                Err(e) => {
                    debug!("{}: target count unavailable: {}", task.target_name, e);
                    None
                }
            };
            let matches = target_rows == Some(source_rows);

            if matches {
                info!("{}: {} rows (match)", task.target_name, source_rows);
            } else {
                warn!(
                    "{}: source={} target={} (MISMATCH)",
                    task.target_name,
                    source_rows,
                    target_rows.map_or_else(|| "missing".to_string(), |n| n.to_string())
                );
            }

            results.push(TableValidation {
                source: task.source_name.clone(),
                target: task.target_name.clone(),
                source_rows,
                target_rows,
                matches,
            });
        }

        Ok(results)
    }
}
