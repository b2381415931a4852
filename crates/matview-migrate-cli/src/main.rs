//! matview-migrate CLI - copy materialized views into plain tables.

use clap::{Parser, Subcommand};
use matview_migrate::{
    parse_table_list, Config, FailurePolicy, MigrateError, Orchestrator, ProgressUpdate,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "matview-migrate")]
#[command(about = "Copy materialized views into tables on another PostgreSQL database")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Print progress updates as JSON lines to stderr
    #[arg(long)]
    progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the migration
    ///
    /// WARNING: every target table is dropped and recreated. Existing data in
    /// a target table with the same name is lost.
    Run {
        /// Dry run: resolve tables and show the plan without touching the target
        #[arg(long)]
        dry_run: bool,

        /// Comma-separated source relations (default: discover materialized views)
        #[arg(long)]
        tables: Option<String>,

        /// Comma-separated target table names, paired positionally with the sources
        #[arg(long)]
        target_tables: Option<String>,

        /// Rows per committed batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Keep going after a table fails instead of stopping
        #[arg(long)]
        continue_on_error: bool,
    },

    /// Validate row counts between source and target
    Validate,

    /// Test database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run {
            dry_run,
            tables,
            target_tables,
            batch_size,
            continue_on_error,
        } => {
            // Apply overrides
            if let Some(list) = tables {
                config.migration.source_tables = parse_table_list(&list);
            }
            if let Some(list) = target_tables {
                config.migration.target_tables = parse_table_list(&list);
            }
            if let Some(size) = batch_size {
                config.migration.batch_size = size;
            }
            if continue_on_error {
                config.migration.on_table_error = FailurePolicy::Continue;
            }

            let mut orchestrator = Orchestrator::new(config).await?;

            if dry_run {
                let plan = orchestrator.plan().await?;
                if cli.output_json {
                    println!("{}", serde_json::to_string_pretty(&plan)?);
                } else {
                    println!("Dry run: {} tables", plan.len());
                    for task in &plan {
                        println!("  {} -> {}", task.source_name, task.target_name);
                    }
                    if plan.padded {
                        println!("  (target names padded with source names)");
                    }
                }
                return Ok(());
            }

            let printer = if cli.progress {
                let (tx, rx) = mpsc::channel(256);
                orchestrator = orchestrator.with_progress(tx);
                Some(spawn_progress_printer(rx))
            } else {
                None
            };

            let result = orchestrator.run().await;
            if let Some(handle) = printer {
                let _ = handle.await;
            }
            let result = result?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                println!("\nMigration {}!", result.status);
                println!("  Run ID: {}", result.run_id);
                println!("  Duration: {:.2}s", result.duration_seconds);
                println!(
                    "  Tables: {}/{}",
                    result.tables_success, result.tables_total
                );
                println!("  Rows: {}", result.rows_transferred);
                println!("  Throughput: {} rows/sec", result.rows_per_second);
                for table in result.tables.iter().filter(|t| t.error.is_some()) {
                    println!(
                        "  Failed: {} -> {} ({}): {}",
                        table.source,
                        table.target,
                        table.phase.map(|p| p.to_string()).unwrap_or_default(),
                        table.error.as_deref().unwrap_or_default()
                    );
                }
            }

            let failed = result.failed_tables();
            if !failed.is_empty() {
                return Err(MigrateError::TablesFailed(failed));
            }
        }

        Commands::Validate => {
            let orchestrator = Orchestrator::new(config).await?;
            let results = orchestrator.validate().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                for r in &results {
                    let target_rows = r
                        .target_rows
                        .map_or_else(|| "missing".to_string(), |n| n.to_string());
                    println!(
                        "  {} {} -> {}: source={} target={}",
                        if r.matches { "OK      " } else { "MISMATCH" },
                        r.source,
                        r.target,
                        r.source_rows,
                        target_rows
                    );
                }
            }

            let mismatched: Vec<String> = results
                .iter()
                .filter(|r| !r.matches)
                .map(|r| r.target.clone())
                .collect();
            if !mismatched.is_empty() {
                return Err(MigrateError::TablesFailed(mismatched));
            }
            println!("Validation completed successfully");
        }

        Commands::HealthCheck => {
            let result = Orchestrator::check_health(&config).await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source: {} ({}ms)",
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_latency_ms
                );
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Target: {} ({}ms)",
                    if result.target_connected { "OK" } else { "FAILED" },
                    result.target_latency_ms
                );
                if let Some(ref err) = result.target_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(MigrateError::connection(
                    "health-check",
                    "one or both databases did not respond",
                ));
            }
        }
    }

    Ok(())
}

/// Print every progress update as one JSON line on stderr.
fn spawn_progress_printer(mut rx: mpsc::Receiver<ProgressUpdate>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            if let Ok(line) = serde_json::to_string(&update) {
                eprintln!("{}", line);
            }
        }
    })
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
