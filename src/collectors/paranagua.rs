use super::{build_client, cell_text, clean_number, fetch_with_retry};
use crate::config::SourceConfig;
use crate::error::Result;
use crate::types::{DateRange, LineupSource, RawRecord};
use scraper::{Html, Selector};
use tracing::{info, instrument, warn};

/// Positions in the APPA retroactive lineup table. The page publishes a
/// wide positional table: Programação, DUV, Berço, Embarcação, IMO, LOA,
/// DWT, Bordo, Sentido, Agência, Operador, Mercadoria, Atracação, Chegada,
/// Janela Operacional, Prancha, Tons/Dia, Previsto, Realizado, ...
const COL_NAVIO: usize = 3;
const COL_SENTIDO: usize = 8;
const COL_AGENTE: usize = 9;
const COL_PRODUTO: usize = 11;
const COL_CHEGADA: usize = 13;
const COL_VOLUME_PREVISTO: usize = 17;

const TABLE_KEYWORDS: &[&str] = &["atracados", "programação", "embarcação", "navio"];

pub struct ParanaguaCollector {
    client: reqwest::Client,
    url: String,
    max_retries: u32,
}

impl ParanaguaCollector {
    pub fn new(source: &SourceConfig, timeout_secs: u64, max_retries: u32) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            url: source.url.clone(),
            max_retries,
        })
    }
}

#[async_trait::async_trait]
impl LineupSource for ParanaguaCollector {
    fn source_name(&self) -> &'static str {
        "paranagua"
    }

    fn port_name(&self) -> &'static str {
        "PARANAGUÁ"
    }

    #[instrument(skip(self))]
    async fn collect(&self, _range: &DateRange) -> Result<Vec<RawRecord>> {
        // The retroactive report always returns the full current lineup;
        // the requested range only narrows what later stages keep.
        let body = fetch_with_retry(&self.client, &self.url, self.max_retries).await?;
        let records = parse_lineup_page(&body);
        info!("Paranaguá lineup parsed: {} records", records.len());
        Ok(records)
    }
}

/// Extract lineup rows from the APPA report HTML. Separate from the
/// collector so tests can feed it captured pages.
pub(crate) fn parse_lineup_page(html: &str) -> Vec<RawRecord> {
    if html.contains("Erro de Tempo de Execução") || html.contains("Tela não Implementada") {
        warn!("Received an error page instead of the lineup report");
        return Vec::new();
    }

    let document = Html::parse_document(html);
    let table_sel = Selector::parse("table").unwrap();
    let row_sel = Selector::parse("tr").unwrap();
    let cell_sel = Selector::parse("td, th").unwrap();

    for table in document.select(&table_sel) {
        let table_text = table.text().collect::<String>().to_lowercase();
        if !TABLE_KEYWORDS.iter().any(|kw| table_text.contains(kw)) {
            continue;
        }

        let mut records = Vec::new();
        for row in table.select(&row_sel) {
            let cells: Vec<String> = row.select(&cell_sel).map(|c| cell_text(&c)).collect();
            if is_ship_row(&cells) {
                records.push(map_row(&cells));
            }
        }
        if !records.is_empty() {
            return records;
        }
    }

    warn!("No lineup table found in page");
    Vec::new()
}

/// A data row carries the full column set and a 7-digit IMO number
/// somewhere; header and banner rows have neither.
fn is_ship_row(cells: &[String]) -> bool {
    cells.len() > COL_VOLUME_PREVISTO
        && cells
            .iter()
            .any(|c| c.len() == 7 && c.chars().all(|ch| ch.is_ascii_digit()))
}

fn map_row(cells: &[String]) -> RawRecord {
    let field = |idx: usize| -> Option<String> {
        cells
            .get(idx)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
    };
    RawRecord {
        porto: Some("PARANAGUÁ".to_string()),
        navio: field(COL_NAVIO),
        produto: field(COL_PRODUTO),
        sentido: field(COL_SENTIDO),
        volume: field(COL_VOLUME_PREVISTO).and_then(|v| clean_number(&v)),
        data_chegada: field(COL_CHEGADA),
        data_partida: None,
        armador: None,
        agente: field(COL_AGENTE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lineup_row(navio: &str, imo: &str, volume: &str) -> String {
        let cells = [
            "77505", "123", "201", navio, imo, "229", "81000", "BE", "EXP", "CARGILL AG",
            "CARGILL OP", "SOJA", "2024-01-14 22:00", "13/01/2024 08:30", "14/01 a 16/01",
            "15000", "12000", volume, "0",
        ];
        let tds: String = cells.iter().map(|c| format!("<td>{c}</td>")).collect();
        format!("<tr>{tds}</tr>")
    }

    fn lineup_page(rows: &str) -> String {
        format!(
            "<html><body><table>\
             <tr><th>Programação</th><th>DUV</th><th>Berço</th><th>Embarcação</th></tr>\
             {rows}\
             </table></body></html>"
        )
    }

    #[test]
    fn parses_positional_lineup_rows() {
        let page = lineup_page(&lineup_row("MSC LORETO", "9493377", "65.000,5"));
        let records = parse_lineup_page(&page);

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.porto.as_deref(), Some("PARANAGUÁ"));
        assert_eq!(record.navio.as_deref(), Some("MSC LORETO"));
        assert_eq!(record.produto.as_deref(), Some("SOJA"));
        assert_eq!(record.sentido.as_deref(), Some("EXP"));
        assert_eq!(record.volume.as_deref(), Some("65000.5"));
        assert_eq!(record.data_chegada.as_deref(), Some("13/01/2024 08:30"));
        assert_eq!(record.agente.as_deref(), Some("CARGILL AG"));
    }

    #[test]
    fn skips_header_and_short_rows() {
        let page = lineup_page(&format!(
            "<tr><td>banner</td><td>only</td></tr>{}",
            lineup_row("EVER GIVEN", "9811000", "1000")
        ));
        let records = parse_lineup_page(&page);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].navio.as_deref(), Some("EVER GIVEN"));
    }

    #[test]
    fn error_pages_yield_nothing() {
        let page = "<html><body>Erro de Tempo de Execução</body></html>";
        assert!(parse_lineup_page(page).is_empty());
    }

    #[test]
    fn pages_without_lineup_tables_yield_nothing() {
        let page = "<html><body><table><tr><td>something else</td></tr></table></body></html>";
        assert!(parse_lineup_page(page).is_empty());
    }
}
