use anyhow::Result;
use chrono::NaiveDate;
use lineup_etl::config::Config;
use lineup_etl::pipeline::{read_artifact, MedallionPipeline};
use lineup_etl::storage::{InMemoryStorage, Storage};
use lineup_etl::types::{
    DateRange, GoldRecord, LineupSource, RawRecord, RowKind, SilverRecord,
};
use lineup_etl::validation::Validator;
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

fn raw_record(navio: &str, volume: &str, chegada: &str) -> RawRecord {
    RawRecord {
        porto: Some("PARANAGUÁ".into()),
        navio: Some(navio.into()),
        produto: Some("SOJA".into()),
        sentido: Some("EXPORTAÇÃO".into()),
        volume: Some(volume.into()),
        data_chegada: Some(chegada.into()),
        ..Default::default()
    }
}

fn test_config(data_dir: &std::path::Path) -> Config {
    Config {
        data_dir: data_dir.to_path_buf(),
        ..Default::default()
    }
}

fn collection_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
}

/// Canned source used to exercise the full orchestration path.
struct StaticSource {
    rows: Vec<RawRecord>,
}

#[async_trait::async_trait]
impl LineupSource for StaticSource {
    fn source_name(&self) -> &'static str {
        "paranagua"
    }

    fn port_name(&self) -> &'static str {
        "PARANAGUÁ"
    }

    async fn collect(&self, _range: &DateRange) -> lineup_etl::error::Result<Vec<RawRecord>> {
        Ok(self.rows.clone())
    }
}

#[test]
fn bronze_silver_gold_artifacts_chain() -> Result<()> {
    let dir = tempdir()?;
    let config = test_config(dir.path());
    let pipeline = MedallionPipeline::new(&config)?;

    let rows = vec![
        raw_record("MSC LORETO", "65000.5", "2024-01-13 08:30:00"),
        raw_record("ATLANTIC HERO", "28000", "2024-01-14 10:00:00"),
    ];
    let bronze_path = pipeline.process_bronze(rows, "paranagua", collection_date())?;
    assert_eq!(
        bronze_path.file_name().unwrap().to_str().unwrap(),
        "bronze_paranagua_20240115.json"
    );

    let silver_path = pipeline.process_silver(&bronze_path)?;
    assert_eq!(
        silver_path.file_name().unwrap().to_str().unwrap(),
        "silver_paranagua_20240115.json"
    );
    let silver: Vec<SilverRecord> = read_artifact(&silver_path, "silver")?;
    assert_eq!(silver.len(), 2);
    assert_eq!(silver[0].categoria_produto, "GRÃOS");

    let gold_path = pipeline.process_gold(&silver_path)?;
    assert_eq!(
        gold_path.file_name().unwrap().to_str().unwrap(),
        "gold_paranagua_20240115.json"
    );
    let gold: Vec<GoldRecord> = read_artifact(&gold_path, "gold")?;

    let atomic = gold.iter().filter(|r| r.row_kind == RowKind::Atomic).count();
    let daily = gold
        .iter()
        .filter(|r| r.row_kind == RowKind::AggregateDaily)
        .count();
    let product = gold
        .iter()
        .filter(|r| r.row_kind == RowKind::AggregateProduct)
        .count();
    assert_eq!(atomic, 2);
    // Two arrival days, one (porto, produto, sentido) combination.
    assert_eq!(daily, 2);
    assert_eq!(product, 1);

    // Every artifact carries its checksum.
    for path in [&bronze_path, &silver_path, &gold_path] {
        assert!(path.with_extension("json.sha256").exists());
    }
    Ok(())
}

#[test]
fn silver_stage_is_deterministic() -> Result<()> {
    let dir = tempdir()?;
    let config = test_config(dir.path());
    let pipeline = MedallionPipeline::new(&config)?;

    let rows = vec![
        raw_record("msc loreto", "65000.5", "2024-01-13 08:30:00"),
        raw_record("ever given", "1000", "2024-01-14 10:00:00"),
    ];
    let bronze_path = pipeline.process_bronze(rows, "paranagua", collection_date())?;

    let silver_path = pipeline.process_silver(&bronze_path)?;
    let first = fs::read_to_string(&silver_path)?;
    let silver_path = pipeline.process_silver(&bronze_path)?;
    let second = fs::read_to_string(&silver_path)?;

    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn run_source_mirrors_all_layers_into_storage() -> Result<()> {
    let dir = tempdir()?;
    let config = test_config(dir.path());
    let pipeline = MedallionPipeline::new(&config)?;
    let validator = Validator::new(config.validation.clone());
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());

    let source = StaticSource {
        rows: vec![
            raw_record("MSC LORETO", "65000.5", "2024-01-13 08:30:00"),
            raw_record("ATLANTIC HERO", "28000", "2024-01-14 10:00:00"),
            // Fails the direction whitelist.
            RawRecord {
                sentido: Some("SIDEWAYS".into()),
                ..raw_record("BAD SHIP", "1000", "2024-01-14 11:00:00")
            },
        ],
    };
    let range = DateRange::new(
        NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
        collection_date(),
    );

    let summary = pipeline
        .run_source(&source, &range, &validator, storage.clone(), false)
        .await?;

    assert_eq!(summary.raw_records, 3);
    assert_eq!(summary.valid_records, 2);
    assert!((summary.data_quality_score - 66.67).abs() < 0.01);

    let (bronze, silver, gold) = storage.layer_counts().await?;
    assert_eq!(bronze, 2);
    assert_eq!(silver, 2);
    // 2 atomic + 2 daily aggregates + 1 product aggregate.
    assert_eq!(gold, 5);

    let report_path = pipeline.write_daily_report(&[summary], collection_date())?;
    assert!(report_path
        .file_name()
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("daily_report_"));
    Ok(())
}

#[tokio::test]
async fn incremental_run_skips_rows_already_stored() -> Result<()> {
    let dir = tempdir()?;
    let config = test_config(dir.path());
    let pipeline = MedallionPipeline::new(&config)?;
    let validator = Validator::new(config.validation.clone());
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());

    let first = StaticSource {
        rows: vec![raw_record("MSC LORETO", "65000.5", "2024-01-13 08:30:00")],
    };
    let range = DateRange::new(
        NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
        collection_date(),
    );
    pipeline
        .run_source(&first, &range, &validator, storage.clone(), false)
        .await?;

    // Second run sees the same ship call plus one genuinely new row.
    let second = StaticSource {
        rows: vec![
            raw_record("MSC LORETO", "65000.5", "2024-01-13 08:30:00"),
            raw_record("EVER GIVEN", "12000", "2024-01-15 09:00:00"),
        ],
    };
    let summary = pipeline
        .run_source(&second, &range, &validator, storage.clone(), true)
        .await?;

    assert_eq!(summary.raw_records, 2);
    assert_eq!(summary.duplicate_records, 1);
    assert_eq!(summary.valid_records, 1);

    let bronze = storage.bronze_records(Some("paranagua")).await?;
    assert_eq!(bronze.len(), 2);
    Ok(())
}
