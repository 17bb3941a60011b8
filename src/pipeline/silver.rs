use crate::dictionary::ClassificationDictionary;
use crate::types::{parse_datetime, BronzeRecord, SilverRecord};
use chrono::Datelike;
use std::collections::HashSet;
use tracing::info;

/// Fixed substitution tables for vocabulary canonicalization. Values are
/// matched exactly (after uppercasing); anything unmapped passes through
/// unchanged.
const PORT_SUBSTITUTIONS: &[(&str, &str)] = &[
    ("PARANAGUA", "PARANAGUÁ"),
    ("PAR", "PARANAGUÁ"),
    ("STS", "SANTOS"),
];

const DIRECTION_SUBSTITUTIONS: &[(&str, &str)] = &[
    ("EXP", "EXPORTAÇÃO"),
    ("IMP", "IMPORTAÇÃO"),
    ("EXPORT", "EXPORTAÇÃO"),
    ("IMPORT", "IMPORTAÇÃO"),
    ("OUTBOUND", "EXPORTAÇÃO"),
    ("INBOUND", "IMPORTAÇÃO"),
];

const PRODUCT_SUBSTITUTIONS: &[(&str, &str)] = &[
    ("SUGAR", "AÇÚCAR"),
    ("CONTÊINER", "CONTAINER"),
    ("FERTILIZER", "FERTILIZANTE"),
];

/// Transform a bronze table into the silver layer: clean, standardize,
/// enrich. Purely a function of its input; re-running over the same bronze
/// artifact yields identical output.
pub fn transform(bronze: &[BronzeRecord], dictionary: &ClassificationDictionary) -> Vec<SilverRecord> {
    let initial_count = bronze.len();

    let mut seen = HashSet::new();
    let mut silver: Vec<SilverRecord> = bronze
        .iter()
        // Exact-duplicate rows: first occurrence wins.
        .filter(|row| seen.insert(row.record.clone()))
        .filter_map(|row| clean(row))
        .collect();
    info!(
        "Cleaning removed {} of {} bronze records",
        initial_count - silver.len(),
        initial_count
    );

    for record in &mut silver {
        standardize(record);
        enrich(record, dictionary);
    }
    silver
}

/// Drop rows missing essential fields or a positive volume, normalize text
/// fields, and parse dates. Returns `None` when the row does not survive.
fn clean(row: &BronzeRecord) -> Option<SilverRecord> {
    let normalize = |v: &Option<String>| v.as_ref().map(|s| s.trim().to_uppercase());

    let navio = normalize(&row.record.navio)?;
    let produto = normalize(&row.record.produto)?;
    let sentido = row.record.sentido.as_ref()?.trim().to_uppercase();

    // Volume must coerce to a positive number; this is stricter than (and
    // independent of) the validator's configured bounds.
    let volume: f64 = row.record.volume.as_ref()?.trim().parse().ok()?;
    if volume <= 0.0 {
        return None;
    }

    Some(SilverRecord {
        porto: row.record.porto.as_ref().map(|p| p.trim().to_uppercase()),
        navio,
        produto,
        sentido,
        volume,
        data_chegada: row.record.data_chegada.as_deref().and_then(parse_datetime),
        data_partida: row.record.data_partida.as_deref().and_then(parse_datetime),
        armador: normalize(&row.record.armador),
        agente: normalize(&row.record.agente),
        ano: None,
        mes: None,
        dia_semana: None,
        trimestre: None,
        tipo_navio: String::new(),
        categoria_produto: String::new(),
        categoria_volume: None,
        collection_date: row.collection_date,
        source: row.source.clone(),
        processing_timestamp: row.processing_timestamp,
    })
}

fn substitute(value: &str, table: &[(&str, &str)]) -> Option<String> {
    table
        .iter()
        .find(|(from, _)| *from == value)
        .map(|(_, to)| to.to_string())
}

/// Canonicalize port, direction, and product vocabulary in place.
fn standardize(record: &mut SilverRecord) {
    if let Some(porto) = &record.porto {
        if let Some(canonical) = substitute(porto, PORT_SUBSTITUTIONS) {
            record.porto = Some(canonical);
        }
    }
    if let Some(canonical) = substitute(&record.sentido, DIRECTION_SUBSTITUTIONS) {
        record.sentido = canonical;
    }
    if let Some(canonical) = substitute(&record.produto, PRODUCT_SUBSTITUTIONS) {
        record.produto = canonical;
    }
}

/// Derive calendar fields and classification categories.
fn enrich(record: &mut SilverRecord, dictionary: &ClassificationDictionary) {
    if let Some(chegada) = record.data_chegada {
        record.ano = Some(chegada.year());
        record.mes = Some(chegada.month());
        record.dia_semana = Some(chegada.format("%A").to_string());
        record.trimestre = Some((chegada.month() - 1) / 3 + 1);
    }

    // The Silver stage deliberately uses its own ship-type table, which
    // differs from the dictionary's ad hoc classifier.
    record.tipo_navio = dictionary
        .enrichment_ship_types
        .classify(&record.navio)
        .to_string();
    record.categoria_produto = dictionary.classify_product(&record.produto).to_string();
    record.categoria_volume = volume_bucket(record.volume);
}

/// Right-closed volume bins: (0, 1000] Pequeno, (1000, 5000] Médio,
/// (5000, 10000] Grande, (10000, ∞) Muito Grande.
fn volume_bucket(volume: f64) -> Option<String> {
    if volume <= 0.0 {
        return None;
    }
    let label = if volume <= 1000.0 {
        "Pequeno"
    } else if volume <= 5000.0 {
        "Médio"
    } else if volume <= 10_000.0 {
        "Grande"
    } else {
        "Muito Grande"
    };
    Some(label.to_string())
}
