use crate::config::ValidationRules;
use crate::types::{parse_datetime, RawRecord, ValidationReport};
use chrono::{Duration, Utc};
use std::collections::HashSet;
use tracing::info;

/// Business key identifying a logically unique ship-call record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BusinessKey {
    pub porto: Option<String>,
    pub navio: Option<String>,
    pub data_chegada: Option<String>,
    pub produto: Option<String>,
}

impl BusinessKey {
    pub fn from_record(record: &RawRecord) -> Self {
        let norm = |v: &Option<String>| v.as_ref().map(|s| s.trim().to_string());
        Self {
            porto: norm(&record.porto),
            navio: norm(&record.navio),
            data_chegada: norm(&record.data_chegada),
            produto: norm(&record.produto),
        }
    }
}

/// Rule-based gate over raw lineup tables.
///
/// Rows failing a rule are removed and the violation recorded as a
/// human-readable message; data-quality problems never raise. The rule set
/// (required columns, vocabularies, volume bounds) comes from configuration.
pub struct Validator {
    rules: ValidationRules,
}

impl Validator {
    pub fn new(rules: ValidationRules) -> Self {
        Self { rules }
    }

    /// Validate a full table, returning the surviving rows and a report.
    pub fn validate(&self, rows: &[RawRecord]) -> (Vec<RawRecord>, ValidationReport) {
        info!("Starting validation of {} records", rows.len());

        let mut report = ValidationReport {
            total_records: rows.len(),
            ..Default::default()
        };

        let cleaned = self.run_rules(rows.to_vec(), &mut report.validation_errors);
        self.finalize(cleaned, report)
    }

    /// Validate a new batch against an existing table: rows whose business
    /// key `(porto, navio, data_chegada, produto)` already exists (in the
    /// existing table or earlier in the batch) are removed and counted, then
    /// the standard rules run on the remainder.
    pub fn validate_incremental(
        &self,
        new_rows: &[RawRecord],
        existing: &[RawRecord],
    ) -> (Vec<RawRecord>, ValidationReport) {
        info!(
            "Validating incremental data: {} new records against {} existing records",
            new_rows.len(),
            existing.len()
        );

        let mut report = ValidationReport {
            total_records: new_rows.len(),
            ..Default::default()
        };

        let mut seen: HashSet<BusinessKey> =
            existing.iter().map(BusinessKey::from_record).collect();

        let mut deduped = Vec::with_capacity(new_rows.len());
        for row in new_rows {
            if seen.insert(BusinessKey::from_record(row)) {
                deduped.push(row.clone());
            } else {
                report.duplicate_records += 1;
            }
        }
        if report.duplicate_records > 0 {
            report.validation_errors.push(format!(
                "Found {} duplicate records",
                report.duplicate_records
            ));
        }

        let cleaned = self.run_rules(deduped, &mut report.validation_errors);
        self.finalize(cleaned, report)
    }

    fn finalize(
        &self,
        cleaned: Vec<RawRecord>,
        mut report: ValidationReport,
    ) -> (Vec<RawRecord>, ValidationReport) {
        report.valid_records = cleaned.len();
        report.invalid_records = report.total_records - report.valid_records;
        if report.total_records > 0 {
            report.data_quality_score =
                report.valid_records as f64 / report.total_records as f64 * 100.0;
        }

        info!(
            "Validation completed: {}/{} valid records (quality score {:.2}%)",
            report.valid_records, report.total_records, report.data_quality_score
        );

        (cleaned, report)
    }

    fn run_rules(&self, mut rows: Vec<RawRecord>, errors: &mut Vec<String>) -> Vec<RawRecord> {
        if rows.is_empty() {
            return rows;
        }

        // A required column entirely absent stops the column-specific rules;
        // the rows we have are returned as-is.
        if !self.check_required_columns(&mut rows, errors) {
            return rows;
        }
        self.check_ports(&mut rows, errors);
        self.check_directions(&mut rows, errors);
        self.check_volumes(&mut rows, errors);
        self.check_dates(&mut rows, errors);
        self.check_ship_names(&mut rows, errors);
        rows
    }

    fn column_present(rows: &[RawRecord], column: &str) -> bool {
        rows.iter().any(|row| row.column(column).is_some())
    }

    /// Required columns must be present and non-null. Returns `false` when a
    /// required column is missing from the table altogether.
    fn check_required_columns(&self, rows: &mut Vec<RawRecord>, errors: &mut Vec<String>) -> bool {
        let missing: Vec<&str> = self
            .rules
            .required_columns
            .iter()
            .map(String::as_str)
            .filter(|col| !Self::column_present(rows, col))
            .collect();
        if !missing.is_empty() {
            errors.push(format!("Missing required columns: {:?}", missing));
            return false;
        }

        for col in &self.rules.required_columns {
            let null_count = rows.iter().filter(|row| row.column(col).is_none()).count();
            if null_count > 0 {
                errors.push(format!("Column '{}' has {} null values", col, null_count));
                rows.retain(|row| row.column(col).is_some());
            }
        }
        true
    }

    fn check_ports(&self, rows: &mut Vec<RawRecord>, errors: &mut Vec<String>) {
        if !Self::column_present(rows, "porto") {
            return;
        }
        let mut invalid: Vec<String> = Vec::new();
        for row in rows.iter() {
            if let Some(porto) = row.column("porto") {
                if !self.rules.valid_ports.iter().any(|p| p == porto)
                    && !invalid.iter().any(|p| p == porto)
                {
                    invalid.push(porto.to_string());
                }
            }
        }
        if !invalid.is_empty() {
            errors.push(format!("Invalid port names found: {:?}", invalid));
        }
        rows.retain(|row| {
            row.column("porto")
                .map(|p| self.rules.valid_ports.iter().any(|v| v == p))
                .unwrap_or(false)
        });
    }

    fn check_directions(&self, rows: &mut Vec<RawRecord>, errors: &mut Vec<String>) {
        if !Self::column_present(rows, "sentido") {
            return;
        }
        let mut invalid: Vec<String> = Vec::new();
        for row in rows.iter() {
            if let Some(sentido) = row.column("sentido") {
                if !self.rules.valid_directions.iter().any(|d| d == sentido)
                    && !invalid.iter().any(|d| d == sentido)
                {
                    invalid.push(sentido.to_string());
                }
            }
        }
        if !invalid.is_empty() {
            errors.push(format!("Invalid directions found: {:?}", invalid));
        }
        rows.retain(|row| {
            row.column("sentido")
                .map(|d| self.rules.valid_directions.iter().any(|v| v == d))
                .unwrap_or(false)
        });
    }

    /// Volume must parse as a number inside the configured bounds.
    /// Non-numeric values are out-of-range by definition.
    fn check_volumes(&self, rows: &mut Vec<RawRecord>, errors: &mut Vec<String>) {
        if !Self::column_present(rows, "volume") {
            return;
        }
        let in_range = |row: &RawRecord| {
            row.column("volume")
                .and_then(|v| v.trim().parse::<f64>().ok())
                .map(|v| v >= self.rules.min_volume && v <= self.rules.max_volume)
                .unwrap_or(false)
        };
        let invalid_count = rows.iter().filter(|&row| !in_range(row)).count();
        if invalid_count > 0 {
            errors.push(format!("Invalid volumes found: {} records", invalid_count));
            rows.retain(in_range);
        }
    }

    /// Present date values must parse; unparseable values drop the row.
    /// Dates more than a year out additionally raise a non-dropping warning.
    fn check_dates(&self, rows: &mut Vec<RawRecord>, errors: &mut Vec<String>) {
        for col in ["data_chegada", "data_partida"] {
            if !Self::column_present(rows, col) {
                continue;
            }
            let unparseable = |row: &RawRecord| {
                row.column(col)
                    .map(|v| parse_datetime(v).is_none())
                    .unwrap_or(false)
            };
            let invalid_count = rows.iter().filter(|&row| unparseable(row)).count();
            if invalid_count > 0 {
                errors.push(format!(
                    "Invalid dates in column '{}': {} records",
                    col, invalid_count
                ));
                rows.retain(|row| !unparseable(row));
            }

            let future_threshold = Utc::now().naive_utc() + Duration::days(365);
            let future_count = rows
                .iter()
                .filter(|row| {
                    row.column(col)
                        .and_then(parse_datetime)
                        .map(|d| d > future_threshold)
                        .unwrap_or(false)
                })
                .count();
            if future_count > 0 {
                errors.push(format!(
                    "Future dates in column '{}': {} records",
                    col, future_count
                ));
            }
        }
    }

    fn check_ship_names(&self, rows: &mut Vec<RawRecord>, errors: &mut Vec<String>) {
        if !Self::column_present(rows, "navio") {
            return;
        }
        let valid_name = |row: &RawRecord| {
            row.column("navio")
                .map(|n| n.trim().chars().count() >= 2)
                .unwrap_or(false)
        };
        let invalid_count = rows.iter().filter(|&row| !valid_name(row)).count();
        if invalid_count > 0 {
            errors.push(format!("Invalid ship names: {} records", invalid_count));
            rows.retain(valid_name);
        }
    }
}
