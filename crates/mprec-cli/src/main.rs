use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mprec_storage::{CaseStore, InMemoryCaseStore, PgCaseStore};
use mprec_sync::{PlatformOutcome, SourceRegistry, SyncConfig, SyncPipeline};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "mprec")]
#[command(about = "Missing-person listing reconciler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Reconcile one platform, or every enabled platform.
    Sync {
        #[arg(long)]
        platform: Option<String>,
        /// Reconcile against an empty in-memory store instead of the database.
        #[arg(long)]
        dry_run: bool,
    },
    /// Apply the database migrations.
    Migrate,
    /// List the platforms in the source registry.
    Platforms,
}

/// `RUST_LOG` when it is set and valid, `info` otherwise.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref()))
        .init();

    let cli = Cli::parse();
    let config = SyncConfig::from_env();

    match cli.command {
        Commands::Sync { platform, dry_run } => {
            let store: Arc<dyn CaseStore> = if dry_run {
                info!("dry run; using an in-memory store");
                Arc::new(InMemoryCaseStore::new())
            } else {
                let store = PgCaseStore::connect(&config.database_url)
                    .await
                    .context("connecting to the case store")?;
                store.migrate().await.context("applying migrations")?;
                Arc::new(store)
            };

            let pipeline = SyncPipeline::new(config, store)?;
            let summary = pipeline.run(platform.as_deref()).await?;
            for outcome in &summary.outcomes {
                match outcome {
                    PlatformOutcome::Succeeded(run) => println!(
                        "{}: listed={} created={} inserted={} updated={} unchanged={} retired={} orphans={} skipped_retirements={} complete={}",
                        run.platform,
                        run.listed_records,
                        run.reconcile.cases_created,
                        run.reconcile.information_inserted,
                        run.reconcile.information_updated,
                        run.reconcile.information_unchanged,
                        run.reconcile.information_retired,
                        run.reconcile.orphan_cases_deleted,
                        run.reconcile.retirement_skipped,
                        run.snapshot_complete,
                    ),
                    PlatformOutcome::Failed { platform, error } => {
                        eprintln!("{platform}: failed: {error}")
                    }
                }
            }
            if let Some(dir) = &summary.reports_dir {
                println!("reports: {}", dir.display());
            }
            if summary.failures() > 0 {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Migrate => {
            let store = PgCaseStore::connect(&config.database_url)
                .await
                .context("connecting to the case store")?;
            store.migrate().await.context("applying migrations")?;
            println!("migrations applied");
        }
        Commands::Platforms => {
            let registry = SourceRegistry::load(&config.registry_path()).await?;
            for platform in &registry.platforms {
                println!(
                    "{}\t{:?}\t{}\t{}",
                    platform.platform,
                    platform.kind,
                    if platform.enabled { "enabled" } else { "disabled" },
                    platform.display_name
                );
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
