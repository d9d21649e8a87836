//! API response types for the chart, spark and index-constituent endpoints.

use rust_decimal::Decimal;
use serde::Deserialize;

use super::PriceMap;

/// Response of the `/v8/finance/chart/{symbol}` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ChartResponse {
    pub chart: ChartBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartBody {
    #[serde(default)]
    pub result: Option<Vec<ChartResult>>,
    #[serde(default)]
    pub error: Option<ChartError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartResult {
    pub meta: ChartMeta,
    #[serde(default)]
    pub indicators: Option<ChartIndicators>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    #[serde(default)]
    pub regular_market_price: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartIndicators {
    #[serde(default)]
    pub quote: Vec<ChartQuote>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartQuote {
    #[serde(default)]
    pub close: Vec<Option<Decimal>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartError {
    #[serde(default)]
    pub code: String,
}

impl ChartResult {
    /// Last non-empty close of the series, falling back to the regular
    /// market price from the metadata block.
    pub fn latest_close(&self) -> Option<Decimal> {
        self.indicators
            .as_ref()
            .and_then(|i| i.quote.first())
            .and_then(|q| q.close.iter().rev().flatten().next().copied())
            .or(self.meta.regular_market_price)
            .filter(|p| *p > Decimal::ZERO)
    }
}

/// Response of the `/v7/finance/spark?symbols=...` batch endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SparkResponse {
    pub spark: SparkBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SparkBody {
    #[serde(default)]
    pub result: Option<Vec<SparkResult>>,
    #[serde(default)]
    pub error: Option<ChartError>,
}

/// One symbol of a spark batch; `response` holds a chart series.
#[derive(Debug, Clone, Deserialize)]
pub struct SparkResult {
    pub symbol: String,
    #[serde(default)]
    pub response: Vec<ChartResult>,
}

impl SparkBody {
    /// Latest close per symbol. Symbols without a usable close are left out.
    pub fn closes(self) -> PriceMap {
        self.result
            .unwrap_or_default()
            .into_iter()
            .filter_map(|r| {
                let close = r.response.first().and_then(ChartResult::latest_close)?;
                Some((r.symbol, close))
            })
            .collect()
    }
}

/// Response of the NASDAQ-100 list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexListResponse {
    #[serde(default)]
    pub data: Option<IndexListData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexListData {
    #[serde(default)]
    pub data: Option<IndexListTable>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexListTable {
    #[serde(default)]
    pub rows: Vec<IndexListRow>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexListRow {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_latest_close_skips_nulls() {
        let body = r#"{
            "chart": {
                "result": [{
                    "meta": {"symbol": "AAPL", "regularMarketPrice": 230.1},
                    "indicators": {"quote": [{"close": [227.5, 229.25, null]}]}
                }],
                "error": null
            }
        }"#;

        let parsed: ChartResponse = serde_json::from_str(body).unwrap();
        let result = &parsed.chart.result.unwrap()[0];
        assert_eq!(result.latest_close(), Some(dec!(229.25)));
    }

    #[test]
    fn test_latest_close_falls_back_to_market_price() {
        let body = r#"{"chart": {"result": [{"meta": {"symbol": "MSFT", "regularMarketPrice": 410.5}}]}}"#;

        let parsed: ChartResponse = serde_json::from_str(body).unwrap();
        let result = &parsed.chart.result.unwrap()[0];
        assert_eq!(result.latest_close(), Some(dec!(410.5)));
    }

    #[test]
    fn test_spark_batch_closes() {
        let body = r#"{
            "spark": {
                "result": [
                    {"symbol": "AAPL", "response": [{
                        "meta": {"symbol": "AAPL", "regularMarketPrice": 230.1},
                        "timestamp": [1760000000],
                        "indicators": {"quote": [{"close": [229.25]}]}
                    }]},
                    {"symbol": "MSFT", "response": [{
                        "meta": {"symbol": "MSFT", "regularMarketPrice": 410.5},
                        "indicators": {"quote": [{"close": [null]}]}
                    }]},
                    {"symbol": "ZZZZ", "response": []}
                ],
                "error": null
            }
        }"#;

        let parsed: SparkResponse = serde_json::from_str(body).unwrap();
        let closes = parsed.spark.closes();

        assert_eq!(closes.len(), 2);
        assert_eq!(closes["AAPL"], dec!(229.25));
        assert_eq!(closes["MSFT"], dec!(410.5));
        assert!(!closes.contains_key("ZZZZ"));
    }

    #[test]
    fn test_index_list_rows() {
        let body = r#"{"data": {"data": {"rows": [
            {"symbol": " aapl ", "companyName": "Apple Inc. Common Stock"},
            {"symbol": null, "companyName": "Ghost"}
        ]}}}"#;

        let parsed: IndexListResponse = serde_json::from_str(body).unwrap();
        let rows = parsed.data.unwrap().data.unwrap().rows;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].symbol.as_deref(), Some(" aapl "));
        assert!(rows[1].symbol.is_none());
    }
}
