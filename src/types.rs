use crate::error::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw record names understood by the column-oriented validation rules.
pub const RAW_COLUMNS: &[&str] = &[
    "porto",
    "navio",
    "produto",
    "sentido",
    "volume",
    "data_chegada",
    "data_partida",
    "armador",
    "agente",
];

/// One loosely typed row as a collector scraped it.
///
/// Only `navio` is non-null by convention; everything else may be missing or
/// a mistyped string (volumes with thousand separators, dates in local
/// formats, and so on).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub porto: Option<String>,
    #[serde(default)]
    pub navio: Option<String>,
    #[serde(default)]
    pub produto: Option<String>,
    #[serde(default)]
    pub sentido: Option<String>,
    #[serde(default)]
    pub volume: Option<String>,
    #[serde(default)]
    pub data_chegada: Option<String>,
    #[serde(default)]
    pub data_partida: Option<String>,
    #[serde(default)]
    pub armador: Option<String>,
    #[serde(default)]
    pub agente: Option<String>,
}

impl RawRecord {
    /// Column-generic accessor used by the rule-driven validator.
    pub fn column(&self, name: &str) -> Option<&str> {
        let value = match name {
            "porto" => &self.porto,
            "navio" => &self.navio,
            "produto" => &self.produto,
            "sentido" => &self.sentido,
            "volume" => &self.volume,
            "data_chegada" => &self.data_chegada,
            "data_partida" => &self.data_partida,
            "armador" => &self.armador,
            "agente" => &self.agente,
            _ => return None,
        };
        value.as_deref()
    }
}

/// Raw record plus collection provenance. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BronzeRecord {
    #[serde(flatten)]
    pub record: RawRecord,
    pub collection_date: NaiveDate,
    pub source: String,
    pub processing_timestamp: DateTime<Utc>,
}

/// Cleaned, standardized, and enriched record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SilverRecord {
    pub porto: Option<String>,
    pub navio: String,
    pub produto: String,
    pub sentido: String,
    pub volume: f64,
    pub data_chegada: Option<NaiveDateTime>,
    pub data_partida: Option<NaiveDateTime>,
    pub armador: Option<String>,
    pub agente: Option<String>,
    pub ano: Option<i32>,
    pub mes: Option<u32>,
    pub dia_semana: Option<String>,
    pub trimestre: Option<u32>,
    pub tipo_navio: String,
    pub categoria_produto: String,
    pub categoria_volume: Option<String>,
    pub collection_date: NaiveDate,
    pub source: String,
    pub processing_timestamp: DateTime<Utc>,
}

/// Discriminates atomic ship-call rows from the aggregate rows that share
/// the Gold table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowKind {
    Atomic,
    AggregateDaily,
    AggregateProduct,
}

impl RowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowKind::Atomic => "atomic",
            RowKind::AggregateDaily => "aggregate_daily",
            RowKind::AggregateProduct => "aggregate_product",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "atomic" => Some(RowKind::Atomic),
            "aggregate_daily" => Some(RowKind::AggregateDaily),
            "aggregate_product" => Some(RowKind::AggregateProduct),
            _ => None,
        }
    }
}

/// Business-ready row. Atomic rows carry the full Silver column set plus
/// business flags; aggregate rows carry only their grouping keys and the
/// summary columns, with everything else null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldRecord {
    pub row_kind: RowKind,
    pub porto: Option<String>,
    pub navio: Option<String>,
    pub produto: Option<String>,
    pub sentido: Option<String>,
    pub volume: Option<f64>,
    pub data_chegada: Option<NaiveDateTime>,
    pub data_partida: Option<NaiveDateTime>,
    pub armador: Option<String>,
    pub agente: Option<String>,
    pub ano: Option<i32>,
    pub mes: Option<u32>,
    pub dia_semana: Option<String>,
    pub trimestre: Option<u32>,
    pub tipo_navio: Option<String>,
    pub categoria_produto: Option<String>,
    pub categoria_volume: Option<String>,
    pub status_operacao: Option<String>,
    pub flag_qualidade: Option<String>,
    pub volume_total: Option<f64>,
    pub qtd_operacoes: Option<u64>,
    pub volume_medio: Option<f64>,
    pub qtd_navios: Option<u64>,
    pub volume_ma_7d: Option<f64>,
    pub volume_ma_30d: Option<f64>,
    pub crescimento_volume: Option<f64>,
    pub ranking_volume: Option<f64>,
    pub collection_date: Option<NaiveDate>,
    pub source: Option<String>,
    pub processing_timestamp: Option<DateTime<Utc>>,
}

/// Outcome of one bulk or incremental validation call. Returned in-process,
/// never persisted by the pipeline itself.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub total_records: usize,
    pub valid_records: usize,
    pub invalid_records: usize,
    pub duplicate_records: usize,
    pub validation_errors: Vec<String>,
    pub data_quality_score: f64,
}

impl ValidationReport {
    /// Formatted plain-text rendering for logs and daily reports.
    pub fn render(&self) -> String {
        let mut report = format!(
            "Data Validation Report\n\
             =====================\n\
             Total Records: {}\n\
             Valid Records: {}\n\
             Invalid Records: {}\n\
             Data Quality Score: {:.2}%\n\n\
             Validation Errors:\n",
            self.total_records, self.valid_records, self.invalid_records, self.data_quality_score
        );
        if self.validation_errors.is_empty() {
            report.push_str("- No validation errors found\n");
        } else {
            for error in &self.validation_errors {
                report.push_str(&format!("- {}\n", error));
            }
        }
        report
    }
}

/// Inclusive date window requested from a collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The trailing `days`-day window ending today.
    pub fn last_days(days: i64) -> Self {
        let end = chrono::Local::now().date_naive();
        Self {
            start: end - chrono::Duration::days(days),
            end,
        }
    }
}

/// Core trait every lineup data source implements. The pipeline only
/// depends on the shape of the rows a source produces, never on how it
/// scrapes them.
#[async_trait::async_trait]
pub trait LineupSource: Send + Sync {
    /// Unique identifier for this source ("paranagua", "santos").
    fn source_name(&self) -> &'static str;

    /// Canonical port name the source reports for.
    fn port_name(&self) -> &'static str;

    /// Fetch the raw lineup rows for a date range.
    async fn collect(&self, range: &DateRange) -> Result<Vec<RawRecord>>;
}

/// Accepted artifact and scrape date formats, most specific first.
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d/%m/%Y %H:%M"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

/// Best-effort datetime parsing over the formats the port sites emit.
/// Returns `None` for anything unparseable (the null-coercion marker).
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, format) {
            return parsed.and_hms_opt(0, 0, 0);
        }
    }
    None
}
