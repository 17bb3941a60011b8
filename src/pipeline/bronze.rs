use crate::types::{BronzeRecord, RawRecord};
use chrono::{DateTime, NaiveDate, Utc};

/// Tag raw rows with collection provenance. No filtering, no coercion:
/// the bronze layer preserves whatever the collector produced.
pub fn tag(
    rows: Vec<RawRecord>,
    source: &str,
    collection_date: NaiveDate,
    processing_timestamp: DateTime<Utc>,
) -> Vec<BronzeRecord> {
    rows.into_iter()
        .map(|record| BronzeRecord {
            record,
            collection_date,
            source: source.to_string(),
            processing_timestamp,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagging_preserves_rows_verbatim() {
        let rows = vec![
            RawRecord {
                navio: Some("MSC LORETO".into()),
                volume: Some("not even numeric".into()),
                ..Default::default()
            },
            RawRecord::default(),
        ];
        let collection_date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let now = Utc::now();

        let bronze = tag(rows.clone(), "paranagua", collection_date, now);

        assert_eq!(bronze.len(), 2);
        assert_eq!(bronze[0].record, rows[0]);
        assert_eq!(bronze[1].record, rows[1]);
        assert!(bronze
            .iter()
            .all(|r| r.source == "paranagua" && r.collection_date == collection_date));
    }
}
