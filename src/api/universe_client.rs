//! Candidate universe: the NASDAQ-100 constituent list, cached on disk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::store::require_columns;

use super::types::IndexListResponse;

const INDEX_LIST_URL: &str = "https://api.nasdaq.com/api/quote/list-type/nasdaq100";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// A cache with fewer rows than this is considered incomplete.
const MIN_CACHED_COMPANIES: usize = 80;

/// One constituent of the universe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    #[serde(rename = "Ticker")]
    pub ticker: String,
    #[serde(rename = "Company", default)]
    pub name: String,
}

/// Loads the ticker universe from cache, refreshing it from the API when
/// the cache is missing or incomplete.
pub struct UniverseClient {
    client: Client,
    url: String,
    cache_path: PathBuf,
}

impl UniverseClient {
    pub fn new(cache_path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_url(INDEX_LIST_URL.to_string(), cache_path)
    }

    /// Create with custom endpoint (for testing).
    pub fn with_url(url: String, cache_path: impl Into<PathBuf>) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url,
            cache_path: cache_path.into(),
        })
    }

    /// Load the universe. Fails only when neither the API nor any cache
    /// can provide data, which ends the run.
    pub async fn load(&self) -> Result<Vec<Company>> {
        match read_cache(&self.cache_path) {
            Ok(companies) if companies.len() >= MIN_CACHED_COMPANIES => {
                info!(count = companies.len(), path = %self.cache_path.display(), "Loaded universe from cache");
                return Ok(companies);
            }
            Ok(companies) => {
                info!(count = companies.len(), "Universe cache incomplete, refreshing");
            }
            Err(e) => {
                info!(error = %e, "No usable universe cache, fetching");
            }
        }

        match self.fetch().await {
            Ok(companies) => {
                if let Err(e) = write_cache(&self.cache_path, &companies) {
                    warn!(error = %e, "Failed to write universe cache");
                }
                info!(count = companies.len(), "Fetched universe from API");
                Ok(companies)
            }
            Err(fetch_err) => {
                warn!(error = %fetch_err, "Universe fetch failed, trying stale cache");
                let stale = read_cache(&self.cache_path)
                    .with_context(|| format!("no universe data and no cache: {}", fetch_err))?;
                if stale.is_empty() {
                    bail!("universe cache is empty and the API is unreachable");
                }
                Ok(stale)
            }
        }
    }

    async fn fetch(&self) -> Result<Vec<Company>> {
        let response = self
            .client
            .get(&self.url)
            .header("Accept", "application/json, text/plain, */*")
            .header("Origin", "https://www.nasdaq.com")
            .header("Referer", "https://www.nasdaq.com/market-activity/quotes/nasdaq-ndx-index")
            .send()
            .await
            .context("Failed to fetch index constituents")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Index list request failed: {} - {}", status, body);
        }

        let payload: IndexListResponse = response
            .json()
            .await
            .context("Failed to parse index list response")?;

        let rows = payload
            .data
            .and_then(|d| d.data)
            .map(|t| t.rows)
            .context("Unexpected index list format")?;

        let companies = normalize_rows(rows.into_iter().map(|r| (r.symbol, r.company_name)));
        if companies.is_empty() {
            bail!("Index list response contained no tickers");
        }

        Ok(companies)
    }
}

/// Trim and uppercase tickers, drop rows without a symbol.
fn normalize_rows<I>(rows: I) -> Vec<Company>
where
    I: IntoIterator<Item = (Option<String>, Option<String>)>,
{
    rows.into_iter()
        .filter_map(|(symbol, name)| {
            let ticker = symbol?.trim().to_uppercase();
            if ticker.is_empty() {
                return None;
            }
            Some(Company {
                ticker,
                name: name.unwrap_or_default().trim().to_string(),
            })
        })
        .collect()
}

/// Read a `Ticker,Company` CSV.
fn read_cache(path: &Path) -> Result<Vec<Company>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let headers = reader.headers()?.clone();
    require_columns(path, &headers, ["Ticker"])?;

    let mut companies = Vec::new();
    for record in reader.deserialize() {
        let company: Company = record.with_context(|| format!("Bad row in {}", path.display()))?;
        companies.push(company);
    }

    Ok(normalize_rows(
        companies.into_iter().map(|c| (Some(c.ticker), Some(c.name))),
    ))
}

fn write_cache(path: &Path, companies: &[Company]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for company in companies {
        writer.serialize(company)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_normalize_rows() {
        let rows = vec![
            (Some(" aapl ".to_string()), Some(" Apple Inc. ".to_string())),
            (None, Some("Ghost".to_string())),
            (Some("  ".to_string()), None),
        ];

        let companies = normalize_rows(rows);
        assert_eq!(companies.len(), 1);
        assert_eq!(companies[0].ticker, "AAPL");
        assert_eq!(companies[0].name, "Apple Inc.");
    }

    #[test]
    fn test_cache_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("universe.csv");
        let companies = vec![
            Company { ticker: "AAPL".into(), name: "Apple".into() },
            Company { ticker: "MSFT".into(), name: "Microsoft".into() },
        ];

        write_cache(&path, &companies).unwrap();
        assert_eq!(read_cache(&path).unwrap(), companies);
    }

    #[test]
    fn test_cache_without_ticker_column_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("universe.csv");
        std::fs::write(&path, "Symbol,Company\nAAPL,Apple\n").unwrap();

        assert!(read_cache(&path).is_err());
    }

    #[tokio::test]
    async fn test_load_uses_small_cache_when_api_unreachable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("universe.csv");
        std::fs::write(&path, "Ticker,Company\nAAPL,Apple\nNVDA,Nvidia\n").unwrap();

        let client = UniverseClient::with_url("http://127.0.0.1:9/unreachable".into(), &path).unwrap();
        let companies = client.load().await.unwrap();
        assert_eq!(companies.len(), 2);
    }

    #[tokio::test]
    async fn test_load_fails_without_any_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.csv");

        let client = UniverseClient::with_url("http://127.0.0.1:9/unreachable".into(), &path).unwrap();
        assert!(client.load().await.is_err());
    }
}
