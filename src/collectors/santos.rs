use super::{build_client, cell_text, clean_number, fetch_with_retry};
use crate::config::SourceConfig;
use crate::error::Result;
use crate::types::{DateRange, LineupSource, RawRecord};
use scraper::{Html, Selector};
use tracing::{info, instrument, warn};

/// Header fragments that mark a lineup table on the Santos page. The site
/// publishes one table per cargo class, all with the same bilingual header
/// row ("Navio Ship", "Mercadoria Goods", ...).
const TABLE_KEYWORDS: &[&str] = &["navio", "ship", "vessel", "produto", "cargo", "sentido"];

pub struct SantosCollector {
    client: reqwest::Client,
    url: String,
    max_retries: u32,
}

impl SantosCollector {
    pub fn new(source: &SourceConfig, timeout_secs: u64, max_retries: u32) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            url: source.url.clone(),
            max_retries,
        })
    }
}

#[async_trait::async_trait]
impl LineupSource for SantosCollector {
    fn source_name(&self) -> &'static str {
        "santos"
    }

    fn port_name(&self) -> &'static str {
        "SANTOS"
    }

    #[instrument(skip(self))]
    async fn collect(&self, _range: &DateRange) -> Result<Vec<RawRecord>> {
        let body = fetch_with_retry(&self.client, &self.url, self.max_retries).await?;
        let records = parse_expected_ships_page(&body);
        info!("Santos lineup parsed: {} records", records.len());
        Ok(records)
    }
}

/// Which well-known field a table column feeds, decided from its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Navio,
    Produto,
    Sentido,
    Volume,
    DataChegada,
    Agente,
    Ignored,
}

fn classify_header(header: &str) -> Field {
    let h = header.to_lowercase();
    if h.contains("navio") || h.contains("ship") || h.contains("vessel") {
        Field::Navio
    } else if h.contains("mercadoria") || h.contains("goods") {
        Field::Produto
    } else if h.contains("operaç") || h.contains("operat") {
        Field::Sentido
    } else if h.contains("peso") || h.contains("weight") {
        Field::Volume
    } else if h.contains("cheg") || h.contains("arrival") {
        Field::DataChegada
    } else if h.contains("agência") || h.contains("agencia") || h.contains("office") {
        Field::Agente
    } else {
        Field::Ignored
    }
}

/// The operation column uses EMB (loading) and DESC (discharge).
fn map_direction(value: &str) -> String {
    match value.trim().to_uppercase().as_str() {
        "EMB" => "EXPORTAÇÃO".to_string(),
        "DESC" => "IMPORTAÇÃO".to_string(),
        other => other.to_string(),
    }
}

/// Parse every lineup table on the expected-ships page. Each table's first
/// row is its cargo-class title and the second its column headers; data
/// starts on the third.
pub(crate) fn parse_expected_ships_page(html: &str) -> Vec<RawRecord> {
    let document = Html::parse_document(html);
    let table_sel = Selector::parse("table").unwrap();
    let row_sel = Selector::parse("tr").unwrap();
    let cell_sel = Selector::parse("td, th").unwrap();

    let mut records = Vec::new();
    for table in document.select(&table_sel) {
        let rows: Vec<Vec<String>> = table
            .select(&row_sel)
            .map(|row| row.select(&cell_sel).map(|c| cell_text(&c)).collect())
            .collect();
        if rows.len() < 3 {
            continue;
        }

        let header_row = &rows[1];
        let header_text = header_row.join(" ").to_lowercase();
        if !TABLE_KEYWORDS.iter().any(|kw| header_text.contains(kw)) {
            continue;
        }
        let fields: Vec<Field> = header_row.iter().map(|h| classify_header(h)).collect();

        for cells in &rows[2..] {
            if cells.len() < 3 || cells.iter().all(|c| c.trim().len() <= 2) {
                continue;
            }
            if let Some(record) = map_row(cells, &fields) {
                records.push(record);
            }
        }
    }
    if records.is_empty() {
        warn!("No lineup tables found on Santos page");
    }
    records
}

fn map_row(cells: &[String], fields: &[Field]) -> Option<RawRecord> {
    let mut record = RawRecord {
        porto: Some("SANTOS".to_string()),
        ..Default::default()
    };
    for (cell, field) in cells.iter().zip(fields) {
        let value = cell.trim();
        if value.is_empty() {
            continue;
        }
        match field {
            Field::Navio => record.navio = Some(value.to_string()),
            Field::Produto => record.produto = Some(value.to_string()),
            Field::Sentido => record.sentido = Some(map_direction(value)),
            Field::Volume => record.volume = clean_number(value),
            Field::DataChegada => record.data_chegada = Some(value.to_string()),
            Field::Agente => record.agente = Some(value.to_string()),
            Field::Ignored => {}
        }
    }
    record.navio.is_some().then_some(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected_ships_page() -> String {
        "<html><body><table>\
         <tr><td colspan=\"7\">GRANEIS DE ORIGEM VEGETAL</td></tr>\
         <tr><th>Navio Ship</th><th>Bandeira Flag</th><th>Cheg/Arrival d/m/y</th>\
             <th>Agência Office</th><th>Operaç Operat</th><th>Mercadoria Goods</th>\
             <th>Peso Weight</th></tr>\
         <tr><td>STAR PEGASUS</td><td>PANAMA</td><td>15/01/2024 06:00</td>\
             <td>WILSON SONS</td><td>EMB</td><td>FARELO DE SOJA</td>\
             <td>45.500,0</td></tr>\
         <tr><td>ATLANTIC HERO</td><td>LIBERIA</td><td>16/01/2024 10:00</td>\
             <td>UNIMAR</td><td>DESC</td><td>TRIGO</td>\
             <td>28.000,0</td></tr>\
         </table></body></html>"
            .to_string()
    }

    #[test]
    fn parses_header_mapped_rows() {
        let records = parse_expected_ships_page(&expected_ships_page());

        assert_eq!(records.len(), 2);
        let first = &records[0];
        assert_eq!(first.porto.as_deref(), Some("SANTOS"));
        assert_eq!(first.navio.as_deref(), Some("STAR PEGASUS"));
        assert_eq!(first.produto.as_deref(), Some("FARELO DE SOJA"));
        assert_eq!(first.sentido.as_deref(), Some("EXPORTAÇÃO"));
        assert_eq!(first.volume.as_deref(), Some("45500.0"));
        assert_eq!(first.data_chegada.as_deref(), Some("15/01/2024 06:00"));
        assert_eq!(first.agente.as_deref(), Some("WILSON SONS"));

        assert_eq!(records[1].sentido.as_deref(), Some("IMPORTAÇÃO"));
    }

    #[test]
    fn tables_without_lineup_headers_are_skipped() {
        let page = "<html><body><table>\
                    <tr><td>title</td></tr>\
                    <tr><th>Preço</th><th>Taxa</th><th>Data</th></tr>\
                    <tr><td>100</td><td>200</td><td>300</td></tr>\
                    </table></body></html>";
        assert!(parse_expected_ships_page(page).is_empty());
    }

    #[test]
    fn rows_without_a_ship_name_are_dropped() {
        let page = "<html><body><table>\
                    <tr><td>CONTEINERES</td></tr>\
                    <tr><th>Navio Ship</th><th>Mercadoria Goods</th><th>Peso Weight</th></tr>\
                    <tr><td></td><td>CONTAINER</td><td>12.000,0</td></tr>\
                    </table></body></html>";
        assert!(parse_expected_ships_page(page).is_empty());
    }

    #[test]
    fn unknown_directions_pass_through_uppercased() {
        assert_eq!(map_direction("emb"), "EXPORTAÇÃO");
        assert_eq!(map_direction("transbordo"), "TRANSBORDO");
    }
}
