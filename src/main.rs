use clap::{Parser, Subcommand};
use lineup_etl::collectors::paranagua::ParanaguaCollector;
use lineup_etl::collectors::santos::SantosCollector;
use lineup_etl::config::Config;
use lineup_etl::error::PipelineError;
use lineup_etl::logging;
use lineup_etl::pipeline::{MedallionPipeline, RunSummary};
use lineup_etl::storage::{SqliteStorage, Storage};
use lineup_etl::types::{DateRange, LineupSource};
use lineup_etl::validation::Validator;
use chrono::{Duration, NaiveDate};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "lineup_etl")]
#[command(about = "Ship lineup ETL for Brazilian port data")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full daily collection over the last 7 days
    Daily {
        /// Specific sources to run (comma-separated). Available: paranagua, santos
        #[arg(long)]
        sources: Option<String>,
    },
    /// Collect only what is newer than the last stored collection date
    Incremental {
        /// Specific sources to run (comma-separated)
        #[arg(long)]
        sources: Option<String>,
    },
    /// Run over an explicit date range
    Manual {
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start_date: NaiveDate,
        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end_date: NaiveDate,
        /// Specific sources to run (comma-separated)
        #[arg(long)]
        sources: Option<String>,
    },
    /// Delete bronze rows older than the retention window
    Cleanup {
        /// Days of bronze history to keep
        #[arg(long, default_value_t = 90)]
        days: i64,
    },
    /// Show row counts per layer
    Status,
}

fn create_source(
    name: &str,
    config: &Config,
) -> Result<Option<Box<dyn LineupSource>>, PipelineError> {
    let Some(source_config) = config.sources.get(name) else {
        return Ok(None);
    };
    let collector: Box<dyn LineupSource> = match name {
        "paranagua" => Box::new(ParanaguaCollector::new(
            source_config,
            config.request_timeout_secs,
            config.max_retries,
        )?),
        "santos" => Box::new(SantosCollector::new(
            source_config,
            config.request_timeout_secs,
            config.max_retries,
        )?),
        _ => return Ok(None),
    };
    Ok(Some(collector))
}

fn parse_source_list(sources: Option<String>, config: &Config) -> Vec<String> {
    match sources {
        Some(list) => list.split(',').map(|s| s.trim().to_string()).collect(),
        None => config.sources.keys().cloned().collect(),
    }
}

async fn run_sources(
    source_names: &[String],
    range_for: impl Fn(&str) -> DateRange,
    config: &Config,
    storage: Arc<dyn Storage>,
    incremental: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = MedallionPipeline::new(config)?;
    let validator = Validator::new(config.validation.clone());
    let mut summaries: Vec<RunSummary> = Vec::new();

    for name in source_names {
        let Some(source) = create_source(name, config)? else {
            warn!("Unknown source specified: {}", name);
            println!("⚠️  Unknown source: {}", name);
            continue;
        };
        let range = range_for(name);
        match pipeline
            .run_source(&*source, &range, &validator, storage.clone(), incremental)
            .await
        {
            Ok(summary) => {
                println!("\n📊 Run results for {}:", name);
                println!("   Raw records: {}", summary.raw_records);
                println!("   Valid records: {}", summary.valid_records);
                println!("   Duplicates removed: {}", summary.duplicate_records);
                println!("   Quality score: {:.2}%", summary.data_quality_score);
                println!("   Gold rows: {}", summary.gold_rows);
                println!("   Gold artifact: {}", summary.gold_path);
                if !summary.validation_errors.is_empty() {
                    println!("\n⚠️  Validation issues:");
                    for issue in &summary.validation_errors {
                        println!("   - {}", issue);
                    }
                }
                summaries.push(summary);
            }
            Err(e) => {
                error!("Pipeline run failed for {}: {}", name, e);
                println!("❌ Pipeline run failed for {}: {}", name, e);
            }
        }
    }

    if !summaries.is_empty() {
        let date = chrono::Local::now().date_naive();
        let report = pipeline.write_daily_report(&summaries, date)?;
        println!("\n📋 Daily report: {}", report.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load()?;
    let storage: Arc<dyn Storage> = Arc::new(SqliteStorage::open(&config.database_path)?);

    match cli.command {
        Commands::Daily { sources } => {
            println!("🔄 Running daily collection...");
            let names = parse_source_list(sources, &config);
            run_sources(&names, |_| DateRange::last_days(7), &config, storage, false).await?;
        }
        Commands::Incremental { sources } => {
            println!("🔄 Running incremental collection...");
            let names = parse_source_list(sources, &config);
            let today = chrono::Local::now().date_naive();

            // Resume each source from the day after its last stored
            // collection, falling back to the last week.
            let mut ranges = std::collections::HashMap::new();
            for name in &names {
                let start = match storage.latest_collection_date(name).await? {
                    Some(latest) => latest + Duration::days(1),
                    None => today - Duration::days(7),
                };
                info!("Incremental range for {}: {} to {}", name, start, today);
                ranges.insert(name.clone(), DateRange::new(start.min(today), today));
            }
            run_sources(
                &names,
                |name| ranges[name],
                &config,
                storage.clone(),
                true,
            )
            .await?;
        }
        Commands::Manual {
            start_date,
            end_date,
            sources,
        } => {
            println!("🔄 Running manual collection {} to {}...", start_date, end_date);
            if end_date < start_date {
                return Err(Box::new(PipelineError::Config(
                    "end date is before start date".to_string(),
                )) as Box<dyn std::error::Error>);
            }
            let names = parse_source_list(sources, &config);
            run_sources(
                &names,
                |_| DateRange::new(start_date, end_date),
                &config,
                storage,
                false,
            )
            .await?;
        }
        Commands::Cleanup { days } => {
            println!("🧹 Cleaning up bronze data older than {} days...", days);
            let cutoff = chrono::Local::now().date_naive() - Duration::days(days);
            let removed = storage.cleanup_bronze_older_than(cutoff).await?;
            info!("Cleanup removed {} rows", removed);
            println!("✅ Removed {} bronze rows collected before {}", removed, cutoff);
        }
        Commands::Status => {
            let (bronze, silver, gold) = storage.layer_counts().await?;
            println!("📊 Stored rows per layer:");
            println!("   Bronze: {}", bronze);
            println!("   Silver: {}", silver);
            println!("   Gold: {}", gold);
        }
    }

    Ok(())
}
