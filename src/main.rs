use anyhow::Context;
use clap::{CommandFactory, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use austarch_ingest::config::Config;
use austarch_ingest::error::IngestError;
use austarch_ingest::logging;
use austarch_ingest::pipeline::storage::Store;
use austarch_ingest::pipeline::{BatchOrchestrator, RunReport};
use austarch_ingest::postprocess;

#[derive(Parser, Debug)]
#[command(name = "austarch-ingest")]
#[command(about = "Load archaeological dating records into the canonical site/sample/age store")]
#[command(version)]
#[command(after_help = "Environment variables:
  AUSTARCH_DB_PATH               Database file (default: austarch.db)
  AUSTARCH_DATA_DIR              Directory with CSV/TSV input files (default: ./data)
  AUSTARCH_SKIP_EXISTING         Skip lab codes already loaded (default: true)
  AUSTARCH_VALIDATE_COORDINATES  Null out coordinates outside the bounds (default: true)")]
struct Cli {
    /// Ingest every input file in the data directory
    #[arg(long)]
    ingest: bool,

    /// Assign bioregions to sites with coordinates
    #[arg(long)]
    assign_bioregions: bool,

    /// Rebuild the summary statistics table
    #[arg(long)]
    refresh_views: bool,

    /// Run data quality and record count checks
    #[arg(long)]
    validate: bool,

    /// Run every step in order
    #[arg(long)]
    all: bool,

    /// Overrides the configured data directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Overrides the configured database path
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// TOML configuration file (default: austarch.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy)]
struct Steps {
    ingest: bool,
    assign_bioregions: bool,
    refresh_views: bool,
    validate: bool,
}

impl Steps {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            ingest: cli.all || cli.ingest,
            assign_bioregions: cli.all || cli.assign_bioregions,
            refresh_views: cli.all || cli.refresh_views,
            validate: cli.all || cli.validate,
        }
    }

    fn any(&self) -> bool {
        self.ingest || self.assign_bioregions || self.refresh_views || self.validate
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let steps = Steps::from_cli(&cli);
    if !steps.any() {
        Cli::command().print_help()?;
        return Ok(ExitCode::SUCCESS);
    }

    let _log_guard = logging::init_logging();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(path) = cli.db_path {
        config.db_path = path;
    }

    tokio::task::spawn_blocking(move || run_steps(steps, &config))
        .await
        .context("Pipeline task panicked")?
}

fn run_steps(steps: Steps, config: &Config) -> anyhow::Result<ExitCode> {
    let mut store = Store::open(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;
    store.run_migrations().context("Failed to apply schema")?;

    if steps.ingest {
        info!("AustArch data ingestion pipeline");
        match BatchOrchestrator::new(config).run(&mut store) {
            Ok(report) => print_report(&report),
            Err(IngestError::BatchAborted { batch_id, source }) => {
                if let Err(e) = store.fail_batch(batch_id, &source.to_string()) {
                    error!("Could not mark batch {} as failed: {}", batch_id, e);
                }
                error!(batch_id = %batch_id, "Ingestion failed: {}", source);
                eprintln!("Ingestion failed: {source} (batch {batch_id})");
                return Ok(ExitCode::FAILURE);
            }
            Err(e) => {
                error!("Ingestion failed: {}", e);
                eprintln!("Ingestion failed: {e}");
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    if steps.assign_bioregions {
        let updated = postprocess::assign_bioregions(store.connection_mut())
            .context("Bioregion assignment failed")?;
        println!("Assigned bioregions to {updated} sites");
    }

    if steps.refresh_views {
        postprocess::refresh_summary(store.connection_mut()).context("Summary refresh failed")?;
        println!("Summary statistics refreshed");
    }

    if steps.validate {
        let report = postprocess::validate(store.connection(), &config.bounds)
            .context("Validation failed")?;
        println!("\nValidation results:");
        for check in &report.quality {
            let mark = if check.issue_count == 0 { "ok" } else { "!!" };
            println!("  [{mark}] {}: {} ({})", check.name, check.issue_count, check.severity);
        }
        println!("\nRecord count verification:");
        for check in &report.counts {
            let mark = if check.passed { "PASS" } else { "CHECK" };
            println!("  [{mark}] {}: {} (expected ~{})", check.metric, check.actual, check.expected);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_report(report: &RunReport) {
    let stats = &report.stats;
    println!("\nIngestion complete (batch {})", report.batch_id);
    println!("   Files processed: {}", report.files.len());
    println!("   Sites created:   {}", stats.sites_created);
    println!("   Sites matched:   {}", stats.sites_matched);
    println!("   Samples created: {}", stats.samples_created);
    println!("   Ages created:    {}", stats.ages_created);
    println!("   Ages skipped:    {}", stats.ages_skipped);
    if !stats.warnings.is_empty() {
        println!("   Warnings:        {}", stats.warnings.len());
    }
    if !stats.errors.is_empty() {
        println!("\nErrors encountered: {}", stats.errors.len());
        for line in stats.error_summary() {
            println!("   - {line}");
        }
    }
}
