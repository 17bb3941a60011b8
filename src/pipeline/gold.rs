use crate::stats;
use crate::types::{GoldRecord, RowKind, SilverRecord};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Transform the silver layer into the gold layer: business flags on the
/// atomic rows, grouped aggregates appended as extra rows, then the
/// table-wide metrics (rolling means, growth, ranking) over the combined
/// table.
pub fn transform(silver: &[SilverRecord], today: NaiveDate) -> Vec<GoldRecord> {
    let mut gold: Vec<GoldRecord> = silver.iter().map(atomic).collect();
    apply_quality_flags(&mut gold, today);

    let aggregates = daily_aggregates(silver)
        .into_iter()
        .chain(product_aggregates(silver));
    gold.extend(aggregates);

    apply_table_metrics(&mut gold);
    info!(
        "Gold table has {} rows ({} atomic)",
        gold.len(),
        silver.len()
    );
    gold
}

fn atomic(row: &SilverRecord) -> GoldRecord {
    GoldRecord {
        row_kind: RowKind::Atomic,
        porto: row.porto.clone(),
        navio: Some(row.navio.clone()),
        produto: Some(row.produto.clone()),
        sentido: Some(row.sentido.clone()),
        volume: Some(row.volume),
        data_chegada: row.data_chegada,
        data_partida: row.data_partida,
        armador: row.armador.clone(),
        agente: row.agente.clone(),
        ano: row.ano,
        mes: row.mes,
        dia_semana: row.dia_semana.clone(),
        trimestre: row.trimestre,
        tipo_navio: Some(row.tipo_navio.clone()),
        categoria_produto: Some(row.categoria_produto.clone()),
        categoria_volume: row.categoria_volume.clone(),
        status_operacao: Some("ATIVO".to_string()),
        flag_qualidade: Some("OK".to_string()),
        volume_total: None,
        qtd_operacoes: None,
        volume_medio: None,
        qtd_navios: None,
        volume_ma_7d: None,
        volume_ma_30d: None,
        crescimento_volume: None,
        ranking_volume: None,
        collection_date: Some(row.collection_date),
        source: Some(row.source.clone()),
        processing_timestamp: Some(row.processing_timestamp),
    }
}

/// Tukey-fence outlier marking over the atomic volumes, then future-dated
/// arrivals override whatever the fences said. Last rule applied wins.
fn apply_quality_flags(gold: &mut [GoldRecord], today: NaiveDate) {
    let volumes: Vec<f64> = gold.iter().filter_map(|row| row.volume).collect();
    if let Some((lower, upper)) = stats::iqr_fences(&volumes) {
        for row in gold.iter_mut() {
            match row.volume {
                Some(volume) if volume < lower => {
                    row.flag_qualidade = Some("VOLUME_BAIXO".to_string());
                }
                Some(volume) if volume > upper => {
                    row.flag_qualidade = Some("VOLUME_ALTO".to_string());
                }
                _ => {}
            }
        }
    }
    for row in gold.iter_mut() {
        if row.data_chegada.map(|d| d.date() > today).unwrap_or(false) {
            row.flag_qualidade = Some("DATA_FUTURA".to_string());
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn empty_aggregate(kind: RowKind) -> GoldRecord {
    GoldRecord {
        row_kind: kind,
        porto: None,
        navio: None,
        produto: None,
        sentido: None,
        volume: None,
        data_chegada: None,
        data_partida: None,
        armador: None,
        agente: None,
        ano: None,
        mes: None,
        dia_semana: None,
        trimestre: None,
        tipo_navio: None,
        categoria_produto: None,
        categoria_volume: None,
        status_operacao: None,
        flag_qualidade: None,
        volume_total: None,
        qtd_operacoes: None,
        volume_medio: None,
        qtd_navios: None,
        volume_ma_7d: None,
        volume_ma_30d: None,
        crescimento_volume: None,
        ranking_volume: None,
        collection_date: None,
        source: None,
        processing_timestamp: None,
    }
}

/// One row per (porto, data_chegada, sentido). Rows missing any key are
/// skipped rather than grouped under a null bucket.
fn daily_aggregates(silver: &[SilverRecord]) -> Vec<GoldRecord> {
    let mut groups: BTreeMap<(String, NaiveDate, String), (f64, u64, BTreeSet<String>)> =
        BTreeMap::new();
    for row in silver {
        let (Some(porto), Some(chegada)) = (&row.porto, row.data_chegada) else {
            continue;
        };
        let entry = groups
            .entry((porto.clone(), chegada.date(), row.sentido.clone()))
            .or_default();
        entry.0 += row.volume;
        entry.1 += 1;
        entry.2.insert(row.navio.clone());
    }

    groups
        .into_iter()
        .map(|((porto, date, sentido), (total, count, ships))| {
            let mut record = empty_aggregate(RowKind::AggregateDaily);
            record.porto = Some(porto);
            record.data_chegada = date.and_hms_opt(0, 0, 0);
            record.sentido = Some(sentido);
            record.volume_total = Some(round2(total));
            record.qtd_operacoes = Some(count);
            record.volume_medio = Some(round2(total / count as f64));
            record.qtd_navios = Some(ships.len() as u64);
            record
        })
        .collect()
}

/// One row per (porto, produto, sentido).
fn product_aggregates(silver: &[SilverRecord]) -> Vec<GoldRecord> {
    let mut groups: BTreeMap<(String, String, String), (f64, u64, BTreeSet<String>)> =
        BTreeMap::new();
    for row in silver {
        let Some(porto) = &row.porto else { continue };
        let entry = groups
            .entry((porto.clone(), row.produto.clone(), row.sentido.clone()))
            .or_default();
        entry.0 += row.volume;
        entry.1 += 1;
        entry.2.insert(row.navio.clone());
    }

    groups
        .into_iter()
        .map(|((porto, produto, sentido), (total, count, ships))| {
            let mut record = empty_aggregate(RowKind::AggregateProduct);
            record.porto = Some(porto);
            record.produto = Some(produto);
            record.sentido = Some(sentido);
            record.volume_total = Some(round2(total));
            record.qtd_operacoes = Some(count);
            record.volume_medio = Some(round2(total / count as f64));
            record.qtd_navios = Some(ships.len() as u64);
            record
        })
        .collect()
}

/// Sort by arrival date, then compute the rolling means, day-over-day
/// growth, and per-(porto, sentido) volume ranking over the whole combined
/// table. The rolling and growth series run across group boundaries on
/// purpose; consumers filter by row_kind before reading them.
fn apply_table_metrics(gold: &mut Vec<GoldRecord>) {
    gold.sort_by(|a, b| match (a.data_chegada, b.data_chegada) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    let volumes: Vec<Option<f64>> = gold.iter().map(|row| row.volume).collect();
    let ma7 = stats::rolling_mean(&volumes, 7);
    let ma30 = stats::rolling_mean(&volumes, 30);
    let growth = stats::pct_change(&volumes);
    for (i, row) in gold.iter_mut().enumerate() {
        row.volume_ma_7d = ma7[i];
        row.volume_ma_30d = ma30[i];
        row.crescimento_volume = growth[i];
    }

    apply_rankings(gold);
}

/// Rank volumes descending within each (porto, sentido) pair, average ties.
/// Only rows carrying all of porto, sentido, and volume participate.
fn apply_rankings(gold: &mut [GoldRecord]) {
    let mut groups: BTreeMap<(String, String), Vec<usize>> = BTreeMap::new();
    for (i, row) in gold.iter().enumerate() {
        if let (Some(porto), Some(sentido), Some(_)) = (&row.porto, &row.sentido, row.volume) {
            groups
                .entry((porto.clone(), sentido.clone()))
                .or_default()
                .push(i);
        }
    }
    for indices in groups.values() {
        let volumes: Vec<f64> = indices
            .iter()
            .map(|&i| gold[i].volume.unwrap_or_default())
            .collect();
        for (&i, rank) in indices.iter().zip(stats::rank_desc(&volumes)) {
            gold[i].ranking_volume = Some(rank);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDateTime, Utc};

    fn silver_row(navio: &str, volume: f64, chegada: &str) -> SilverRecord {
        SilverRecord {
            porto: Some("PARANAGUÁ".into()),
            navio: navio.into(),
            produto: "SOJA".into(),
            sentido: "EXPORTAÇÃO".into(),
            volume,
            data_chegada: NaiveDateTime::parse_from_str(chegada, "%Y-%m-%d %H:%M:%S").ok(),
            data_partida: None,
            armador: None,
            agente: None,
            ano: Some(2024),
            mes: Some(1),
            dia_semana: None,
            trimestre: Some(1),
            tipo_navio: "OUTROS".into(),
            categoria_produto: "GRÃOS".into(),
            categoria_volume: Some("Muito Grande".into()),
            collection_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            source: "paranagua".into(),
            processing_timestamp: Utc::now(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 20).unwrap()
    }

    fn atomic_rows(gold: &[GoldRecord]) -> Vec<&GoldRecord> {
        gold.iter()
            .filter(|r| r.row_kind == RowKind::Atomic)
            .collect()
    }

    #[test]
    fn every_atomic_row_is_active_and_future_arrivals_are_flagged() {
        let silver = vec![
            silver_row("PAST", 100.0, "2024-01-10 08:00:00"),
            silver_row("FUTURE", 100.0, "2024-02-01 08:00:00"),
            silver_row("NODATE", 100.0, "bad"),
        ];

        let gold = transform(&silver, today());
        let by_name = |name: &str| {
            atomic_rows(&gold)
                .into_iter()
                .find(|r| r.navio.as_deref() == Some(name))
                .unwrap()
                .clone()
        };
        for name in ["PAST", "FUTURE", "NODATE"] {
            assert_eq!(by_name(name).status_operacao.as_deref(), Some("ATIVO"));
        }
        assert_eq!(by_name("PAST").flag_qualidade.as_deref(), Some("OK"));
        assert_eq!(by_name("FUTURE").flag_qualidade.as_deref(), Some("DATA_FUTURA"));
        assert_eq!(by_name("NODATE").flag_qualidade.as_deref(), Some("OK"));
    }

    #[test]
    fn future_date_flag_overwrites_a_volume_flag() {
        let mut silver: Vec<SilverRecord> = (0..10)
            .map(|i| silver_row(&format!("SHIP{}", i), 1000.0, "2024-01-10 08:00:00"))
            .collect();
        // Extreme volume and a future arrival on the same row.
        silver.push(silver_row("SPIKE", 9_000_000.0, "2024-02-01 08:00:00"));

        let gold = transform(&silver, today());
        let spike = atomic_rows(&gold)
            .into_iter()
            .find(|r| r.navio.as_deref() == Some("SPIKE"))
            .unwrap()
            .clone();
        assert_eq!(spike.flag_qualidade.as_deref(), Some("DATA_FUTURA"));
    }

    #[test]
    fn outlier_volumes_get_flagged_high_and_low() {
        let mut silver: Vec<SilverRecord> = (0..10)
            .map(|i| silver_row(&format!("SHIP{}", i), 1000.0, "2024-01-10 08:00:00"))
            .collect();
        silver.push(silver_row("SPIKE", 9_000_000.0, "2024-01-11 08:00:00"));

        let gold = transform(&silver, today());
        let flags: Vec<_> = atomic_rows(&gold)
            .into_iter()
            .map(|r| r.flag_qualidade.clone().unwrap())
            .collect();
        assert_eq!(flags.iter().filter(|f| *f == "VOLUME_ALTO").count(), 1);
        assert_eq!(flags.iter().filter(|f| *f == "OK").count(), 10);
    }

    #[test]
    fn daily_aggregates_sum_count_and_distinct_ships() {
        let silver = vec![
            silver_row("A", 100.0, "2024-01-10 06:00:00"),
            silver_row("A", 200.0, "2024-01-10 18:00:00"),
            silver_row("B", 300.0, "2024-01-10 09:00:00"),
        ];
        let gold = transform(&silver, today());
        let daily: Vec<_> = gold
            .iter()
            .filter(|r| r.row_kind == RowKind::AggregateDaily)
            .collect();
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].volume_total, Some(600.0));
        assert_eq!(daily[0].qtd_operacoes, Some(3));
        assert_eq!(daily[0].volume_medio, Some(200.0));
        assert_eq!(daily[0].qtd_navios, Some(2));
        assert_eq!(daily[0].navio, None);
    }

    #[test]
    fn product_aggregates_span_arrival_days() {
        let silver = vec![
            silver_row("A", 100.0, "2024-01-10 06:00:00"),
            silver_row("B", 200.0, "2024-01-11 06:00:00"),
            silver_row("B", 100.0, "2024-01-12 06:00:00"),
        ];
        let gold = transform(&silver, today());
        let product: Vec<_> = gold
            .iter()
            .filter(|r| r.row_kind == RowKind::AggregateProduct)
            .collect();
        assert_eq!(product.len(), 1);
        assert_eq!(product[0].volume_total, Some(400.0));
        assert_eq!(product[0].qtd_operacoes, Some(3));
        assert_eq!(product[0].volume_medio, Some(133.33));
        assert_eq!(product[0].qtd_navios, Some(2));
        assert_eq!(product[0].data_chegada, None);
    }

    #[test]
    fn rows_without_group_keys_are_skipped_by_aggregation() {
        let mut no_port = silver_row("A", 100.0, "2024-01-10 06:00:00");
        no_port.porto = None;
        let gold = transform(&[no_port], today());
        assert!(gold
            .iter()
            .all(|r| r.row_kind != RowKind::AggregateDaily || r.porto.is_some()));
        assert_eq!(
            gold.iter()
                .filter(|r| r.row_kind != RowKind::Atomic)
                .count(),
            0
        );
    }

    #[test]
    fn table_is_sorted_with_undated_rows_last() {
        let silver = vec![
            silver_row("LATE", 100.0, "2024-01-12 06:00:00"),
            silver_row("EARLY", 100.0, "2024-01-10 06:00:00"),
            silver_row("NODATE", 100.0, "bad"),
        ];
        let gold = transform(&silver, today());
        let first_dated = gold.iter().position(|r| r.data_chegada.is_some()).unwrap();
        assert_eq!(first_dated, 0);
        let last = gold.last().unwrap();
        assert!(last.data_chegada.is_none());
    }

    #[test]
    fn rolling_growth_and_ranking_cover_atomic_rows() {
        let silver = vec![
            silver_row("A", 100.0, "2024-01-10 06:00:00"),
            silver_row("B", 50.0, "2024-01-11 06:00:00"),
            silver_row("C", 75.0, "2024-01-12 06:00:00"),
        ];
        let gold = transform(&silver, today());
        let atomics = atomic_rows(&gold);

        assert_eq!(atomics[0].volume_ma_7d, Some(100.0));
        assert_eq!(atomics[1].volume_ma_7d, Some(75.0));
        assert_eq!(atomics[2].volume_ma_7d, Some(75.0));
        assert_eq!(atomics[0].crescimento_volume, None);
        assert_eq!(atomics[1].crescimento_volume, Some(-0.5));
        assert_eq!(atomics[2].crescimento_volume, Some(0.5));

        assert_eq!(atomics[0].ranking_volume, Some(1.0));
        assert_eq!(atomics[1].ranking_volume, Some(3.0));
        assert_eq!(atomics[2].ranking_volume, Some(2.0));
    }

    #[test]
    fn aggregate_rows_carry_no_volume_metrics() {
        let silver = vec![silver_row("A", 100.0, "2024-01-10 06:00:00")];
        let gold = transform(&silver, today());
        for row in gold.iter().filter(|r| r.row_kind != RowKind::Atomic) {
            assert_eq!(row.volume, None);
            assert_eq!(row.ranking_volume, None);
        }
    }
}
