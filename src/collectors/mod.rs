pub mod paranagua;
pub mod santos;

use crate::error::{PipelineError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use std::time::Duration;
use tracing::warn;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Shared HTTP client for the port sites. They expect browser-looking
/// requests in Portuguese and some of them serve broken TLS chains.
pub fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("pt-BR,pt;q=0.9,en;q=0.8"),
    );

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(timeout_secs))
        .danger_accept_invalid_certs(true)
        .build()
        .map_err(PipelineError::from)
}

/// GET a page body, retrying transient failures up to `max_retries` times.
pub async fn fetch_with_retry(
    client: &reqwest::Client,
    url: &str,
    max_retries: u32,
) -> Result<String> {
    let mut last_error = None;
    for attempt in 1..=max_retries {
        match client.get(url).send().await {
            Ok(response) => match response.error_for_status() {
                Ok(response) => return Ok(response.text().await?),
                Err(e) => {
                    warn!("Request attempt {} failed: {}", attempt, e);
                    last_error = Some(e);
                }
            },
            Err(e) => {
                warn!("Request attempt {} failed: {}", attempt, e);
                last_error = Some(e);
            }
        }
    }
    Err(match last_error {
        Some(e) => PipelineError::Http(e),
        None => PipelineError::Source {
            message: format!("no attempts made for {url}"),
        },
    })
}

static NUMERIC_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9.,\-]").unwrap());

/// Normalize a Brazilian-formatted quantity ("65.000,5", "1 234,5") into a
/// plain decimal string. Returns `None` when nothing numeric remains.
pub fn clean_number(raw: &str) -> Option<String> {
    let stripped = NUMERIC_CHARS.replace_all(raw, "");
    if stripped.is_empty() {
        return None;
    }
    // With both separators present the dot is the thousands marker.
    let normalized = if stripped.contains('.') && stripped.contains(',') {
        stripped.replace('.', "").replace(',', ".")
    } else {
        stripped.replace(',', ".")
    };
    normalized.parse::<f64>().ok().map(|_| normalized)
}

/// Cell text stripped the way the port tables need it.
pub(crate) fn cell_text(cell: &scraper::ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_number_handles_brazilian_separators() {
        assert_eq!(clean_number("65.000,5").as_deref(), Some("65000.5"));
        assert_eq!(clean_number("1 234,5").as_deref(), Some("1234.5"));
        assert_eq!(clean_number("42").as_deref(), Some("42"));
        assert_eq!(clean_number("12,5 t").as_deref(), Some("12.5"));
        assert_eq!(clean_number("n/a"), None);
        assert_eq!(clean_number(""), None);
    }
}
