pub mod bronze;
pub mod gold;
pub mod silver;

use crate::config::Config;
use crate::dictionary::ClassificationDictionary;
use crate::error::{PipelineError, Result};
use crate::storage::Storage;
use crate::types::{
    BronzeRecord, DateRange, GoldRecord, LineupSource, RawRecord, SilverRecord, ValidationReport,
};
use crate::validation::Validator;
use chrono::{NaiveDate, Utc};
use metrics::{counter, histogram};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Result of a complete run for one source.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub source: String,
    pub collection_date: NaiveDate,
    pub raw_records: usize,
    pub valid_records: usize,
    pub duplicate_records: usize,
    pub data_quality_score: f64,
    pub bronze_path: String,
    pub silver_path: String,
    pub gold_path: String,
    pub gold_rows: usize,
    pub validation_errors: Vec<String>,
}

/// The three-stage pipeline. Each stage reads the previous stage's JSON
/// artifact from disk, so any stage can be replayed in isolation.
pub struct MedallionPipeline {
    bronze_dir: PathBuf,
    silver_dir: PathBuf,
    gold_dir: PathBuf,
    dictionary: ClassificationDictionary,
}

impl MedallionPipeline {
    pub fn new(config: &Config) -> Result<Self> {
        config.create_directories()?;
        Ok(Self {
            bronze_dir: config.bronze_dir(),
            silver_dir: config.silver_dir(),
            gold_dir: config.gold_dir(),
            dictionary: ClassificationDictionary::new(),
        })
    }

    /// Tag validated raw rows with provenance and persist the bronze
    /// artifact.
    #[instrument(skip(self, rows))]
    pub fn process_bronze(
        &self,
        rows: Vec<RawRecord>,
        source: &str,
        collection_date: NaiveDate,
    ) -> Result<PathBuf> {
        let records = bronze::tag(rows, source, collection_date, Utc::now());
        let filename = format!(
            "bronze_{}_{}.json",
            source,
            collection_date.format("%Y%m%d")
        );
        let path = self.bronze_dir.join(filename);
        write_artifact(&path, &records, "bronze")?;
        counter!("lineup_bronze_records_total", "source" => source.to_string())
            .increment(records.len() as u64);
        info!("Bronze layer saved: {} ({} records)", path.display(), records.len());
        Ok(path)
    }

    /// Clean, standardize, and enrich a bronze artifact into silver.
    #[instrument(skip(self))]
    pub fn process_silver(&self, bronze_path: &Path) -> Result<PathBuf> {
        let records: Vec<BronzeRecord> = read_artifact(bronze_path, "silver")?;
        let silver = silver::transform(&records, &self.dictionary);

        let path = self.silver_dir.join(stage_filename(bronze_path, "bronze_", "silver_")?);
        write_artifact(&path, &silver, "silver")?;
        counter!("lineup_silver_records_total").increment(silver.len() as u64);
        info!("Silver layer saved: {} ({} records)", path.display(), silver.len());
        Ok(path)
    }

    /// Apply business rules and aggregations to a silver artifact.
    #[instrument(skip(self))]
    pub fn process_gold(&self, silver_path: &Path) -> Result<PathBuf> {
        let records: Vec<SilverRecord> = read_artifact(silver_path, "gold")?;
        let gold = gold::transform(&records, chrono::Local::now().date_naive());

        let path = self.gold_dir.join(stage_filename(silver_path, "silver_", "gold_")?);
        write_artifact(&path, &gold, "gold")?;
        counter!("lineup_gold_records_total").increment(gold.len() as u64);
        info!("Gold layer saved: {} ({} rows)", path.display(), gold.len());
        Ok(path)
    }

    /// Run the complete pipeline for one source: collect, validate, then
    /// bronze, silver, and gold, mirroring each layer into storage.
    #[instrument(skip(self, source, validator, storage), fields(source_name = %source.source_name()))]
    pub async fn run_source(
        &self,
        source: &dyn LineupSource,
        range: &DateRange,
        validator: &Validator,
        storage: Arc<dyn Storage>,
        incremental: bool,
    ) -> Result<RunSummary> {
        let source_name = source.source_name().to_string();
        let collection_date = range.end;
        info!("🚀 Starting pipeline run for {}", source_name);
        println!("🚀 Starting pipeline run for {}", source_name);
        counter!("lineup_pipeline_runs_total", "source" => source_name.clone()).increment(1);
        let t_run = std::time::Instant::now();

        info!("📡 Collecting lineup data from {}...", source_name);
        println!("📡 Collecting lineup data from {}...", source_name);
        let t_collect = std::time::Instant::now();
        let raw_rows = source.collect(range).await?;
        histogram!("lineup_collect_duration_seconds", "source" => source_name.clone())
            .record(t_collect.elapsed().as_secs_f64());
        info!("✅ Collected {} raw records", raw_rows.len());
        println!("✅ Collected {} raw records", raw_rows.len());

        println!("🔍 Validating {} records...", raw_rows.len());
        let (valid_rows, report) = if incremental {
            let existing: Vec<RawRecord> = storage
                .bronze_records(Some(&source_name))
                .await?
                .into_iter()
                .map(|r| r.record)
                .collect();
            validator.validate_incremental(&raw_rows, &existing)
        } else {
            validator.validate(&raw_rows)
        };
        log_validation(&report);

        println!("🥉 Writing bronze layer...");
        let bronze_path = self.process_bronze(valid_rows, &source_name, collection_date)?;
        let bronze_records: Vec<BronzeRecord> = read_artifact(&bronze_path, "bronze")?;
        storage.insert_bronze(&bronze_records).await?;

        println!("🥈 Writing silver layer...");
        let silver_path = self.process_silver(&bronze_path)?;
        let silver_records: Vec<SilverRecord> = read_artifact(&silver_path, "silver")?;
        storage.insert_silver(&silver_records).await?;

        println!("🥇 Writing gold layer...");
        let gold_path = self.process_gold(&silver_path)?;
        let gold_records: Vec<GoldRecord> = read_artifact(&gold_path, "gold")?;
        storage.insert_gold(&gold_records).await?;

        let total_secs = t_run.elapsed().as_secs_f64();
        histogram!("lineup_pipeline_duration_seconds", "source" => source_name.clone())
            .record(total_secs);
        info!("🎉 Pipeline run for {} finished in {:.2}s", source_name, total_secs);
        println!("🎉 Pipeline run for {} finished in {:.2}s", source_name, total_secs);

        Ok(RunSummary {
            run_id: Uuid::new_v4(),
            source: source_name,
            collection_date,
            raw_records: report.total_records,
            valid_records: report.valid_records,
            duplicate_records: report.duplicate_records,
            data_quality_score: report.data_quality_score,
            bronze_path: bronze_path.to_string_lossy().to_string(),
            silver_path: silver_path.to_string_lossy().to_string(),
            gold_path: gold_path.to_string_lossy().to_string(),
            gold_rows: gold_records.len(),
            validation_errors: report.validation_errors,
        })
    }

    /// Persist the per-source summaries of one day's run next to the gold
    /// artifacts.
    pub fn write_daily_report(&self, summaries: &[RunSummary], date: NaiveDate) -> Result<PathBuf> {
        let path = self
            .gold_dir
            .join(format!("daily_report_{}.json", date.format("%Y%m%d")));
        write_artifact(&path, &summaries, "gold")?;
        info!("📋 Daily report saved: {}", path.display());
        Ok(path)
    }
}

fn log_validation(report: &ValidationReport) {
    info!(
        "Validation: {}/{} valid, {} duplicates, quality {:.2}%",
        report.valid_records,
        report.total_records,
        report.duplicate_records,
        report.data_quality_score
    );
    println!(
        "✅ {}/{} records valid (quality {:.2}%)",
        report.valid_records, report.total_records, report.data_quality_score
    );
    for error in &report.validation_errors {
        warn!("Validation issue: {}", error);
    }
}

/// Derive the next layer's filename by swapping the layer prefix.
fn stage_filename(path: &Path, from: &str, to: &str) -> Result<String> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| PipelineError::stage("silver", path.display().to_string(), "bad artifact name"))?;
    Ok(name.replacen(from, to, 1))
}

/// Write a JSON artifact atomically (temp file then rename) and record its
/// sha256 alongside it.
pub fn write_artifact<T: Serialize>(path: &Path, records: &T, layer: &'static str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(records)?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &json).map_err(|e| PipelineError::stage(layer, path.display().to_string(), e))?;
    fs::rename(&tmp, path).map_err(|e| PipelineError::stage(layer, path.display().to_string(), e))?;

    let digest = hex::encode(Sha256::digest(json.as_bytes()));
    fs::write(path.with_extension("json.sha256"), &digest)
        .map_err(|e| PipelineError::stage(layer, path.display().to_string(), e))?;
    Ok(())
}

/// Read a previous layer's JSON artifact back into typed records.
pub fn read_artifact<T: serde::de::DeserializeOwned>(path: &Path, layer: &'static str) -> Result<T> {
    let content = fs::read_to_string(path)
        .map_err(|e| PipelineError::stage(layer, path.display().to_string(), e))?;
    serde_json::from_str(&content)
        .map_err(|e| PipelineError::stage(layer, path.display().to_string(), e))
}
