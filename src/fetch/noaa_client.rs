//! HTTP client for the NOAA Climate Data Online v2 API.
//!
//! Requests are authenticated with a token header and paged with
//! `offset`/`limit` parameters. NOAA counts offsets from one; this client
//! converts to and from the zero-based offsets used by [`PaginatedFetcher`].

use crate::config::PipelineConfig;
use crate::fetch::error::FetchError;
use crate::fetch::paginate::PaginatedFetcher;
use crate::fetch::RecordSource;
use crate::observe::PipelineObserver;
use crate::types::datatype::Datatype;
use crate::types::location::{location_lookup, StationEntry};
use crate::types::page::{Page, PageMetadata};
use crate::types::record::RawRecord;
use async_trait::async_trait;
use chrono::NaiveDate;
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt, TryStreamExt};
use log::{info, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

pub const WEATHER_ENDPOINT: &str = "https://www.ncdc.noaa.gov/cdo-web/api/v2/data";
pub const STATIONS_ENDPOINT: &str = "https://www.ncdc.noaa.gov/cdo-web/api/v2/stations";
/// Global Historical Climatology Network - Daily.
pub const DATASET_ID: &str = "GHCND";
/// Maryland.
pub const LOCATION_ID: &str = "FIPS:24";
pub const DEFAULT_PAGE_LIMIT: u64 = 500;

const TOKEN_HEADER: &str = "token";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    #[serde(default)]
    metadata: Option<ApiMetadata>,
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMetadata {
    resultset: ResultSet,
}

#[derive(Debug, Deserialize)]
struct ResultSet {
    offset: u64,
    count: u64,
    limit: u64,
}

/// Client for the weather data and station endpoints.
pub struct NoaaClient {
    http: Client,
    token: String,
    weather_endpoint: String,
    stations_endpoint: String,
    dataset_id: String,
    location_id: String,
    page_limit: u64,
    fetcher: PaginatedFetcher,
}

impl NoaaClient {
    pub fn new(config: &PipelineConfig) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(concat!("weather_pipeline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FetchError::ClientBuild)?;
        Ok(Self::with_http_client(http, config))
    }

    pub fn with_http_client(http: Client, config: &PipelineConfig) -> Self {
        let fetcher = PaginatedFetcher::new()
            .with_throttle(config.throttle)
            .with_request_timeout(Some(config.request_timeout));
        Self {
            http,
            token: config.token.clone(),
            weather_endpoint: config.weather_endpoint.clone(),
            stations_endpoint: config.stations_endpoint.clone(),
            dataset_id: config.dataset_id.clone(),
            location_id: config.location_id.clone(),
            page_limit: config.page_limit,
            fetcher,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.fetcher = self.fetcher.with_observer(observer);
        self
    }

    /// Streams every observation between `start` and `end` (inclusive) for
    /// the configured dataset, location and datatypes.
    pub fn weather(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Stream<Item = Result<RawRecord, FetchError>> + '_ {
        info!("Downloading weather data from {} to {}", start, end);
        self.fetcher
            .fetch_all(move |offset| self.request_weather(start, end, offset))
    }

    /// Fetches all stations of the configured location as an id → name lookup.
    pub async fn locations(&self) -> Result<HashMap<String, String>, FetchError> {
        info!("Downloading station data for {}", self.location_id);
        let entries: Vec<StationEntry> = self
            .fetcher
            .fetch_all(|offset| self.request_stations(offset))
            .try_collect()
            .await?;
        Ok(location_lookup(entries))
    }

    async fn request_weather(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        offset: u64,
    ) -> Result<Page<RawRecord>, FetchError> {
        let params = self.weather_params(start, end, offset);
        self.request_page(&self.weather_endpoint, &params, offset)
            .await
    }

    async fn request_stations(&self, offset: u64) -> Result<Page<StationEntry>, FetchError> {
        let params = self.station_params(offset);
        self.request_page(&self.stations_endpoint, &params, offset)
            .await
    }

    /// Query parameters of the weather request for the zero-based `offset`.
    fn weather_params(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        offset: u64,
    ) -> Vec<(&'static str, String)> {
        vec![
            ("datasetid", self.dataset_id.clone()),
            ("datatypeid", Datatype::request_ids()),
            ("locationid", self.location_id.clone()),
            ("startdate", start.format(DATE_FORMAT).to_string()),
            ("enddate", end.format(DATE_FORMAT).to_string()),
            ("offset", request_offset(offset).to_string()),
            ("limit", self.page_limit.to_string()),
        ]
    }

    fn station_params(&self, offset: u64) -> Vec<(&'static str, String)> {
        vec![
            ("locationid", self.location_id.clone()),
            ("offset", request_offset(offset).to_string()),
            ("limit", self.page_limit.to_string()),
        ]
    }

    async fn request_page<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
        offset: u64,
    ) -> Result<Page<T>, FetchError> {
        let response = self
            .http
            .get(url)
            .header(TOKEN_HEADER, &self.token)
            .query(params)
            .send()
            .await
            .map_err(|e| FetchError::NetworkRequest(url.to_string(), e))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", url, e);
                return Err(if let Some(status) = e.status() {
                    FetchError::HttpStatus {
                        url: url.to_string(),
                        status,
                        source: e,
                    }
                } else {
                    FetchError::NetworkRequest(url.to_string(), e)
                });
            }
        };

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::ResponseBody(url.to_string(), e))?;
        parse_page(url, &body, offset, self.page_limit)
    }
}

#[async_trait]
impl RecordSource for NoaaClient {
    async fn locations(&self) -> Result<HashMap<String, String>, FetchError> {
        NoaaClient::locations(self).await
    }

    fn records(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> BoxStream<'_, Result<RawRecord, FetchError>> {
        self.weather(start, end).boxed()
    }
}

/// Parses one NOAA response body into a zero-based [`Page`].
///
/// NOAA answers a query without results with an empty object (`{}`), which
/// becomes a terminal page with a count of zero.
/// The API counts offsets from one.
fn request_offset(offset: u64) -> u64 {
    offset.saturating_add(1)
}

fn parse_page<T: DeserializeOwned>(
    url: &str,
    body: &str,
    requested_offset: u64,
    page_limit: u64,
) -> Result<Page<T>, FetchError> {
    let response: ApiResponse<T> =
        serde_json::from_str(body).map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })?;

    match response.metadata {
        Some(metadata) => {
            let resultset = metadata.resultset;
            let offset = resultset.offset.checked_sub(1).ok_or_else(|| {
                FetchError::MalformedResponse {
                    url: url.to_string(),
                    reason: "result set offset is 0, expected one-based offsets".to_string(),
                }
            })?;
            Ok(Page::new(
                PageMetadata::new(offset, resultset.limit, resultset.count),
                response.results,
            ))
        }
        None if response.results.is_empty() => Ok(Page::empty(requested_offset, page_limit)),
        None => Err(FetchError::MalformedResponse {
            url: url.to_string(),
            reason: format!(
                "{} result(s) without result set metadata",
                response.results.len()
            ),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://example.invalid/data";

    #[test]
    fn test_parse_weather_page() -> Result<(), FetchError> {
        let body = r#"{
            "metadata": {"resultset": {"offset": 501, "count": 700, "limit": 500}},
            "results": [
                {"date": "2021-10-01T00:00:00", "datatype": "PRCP", "station": "GHCND:US1MDAA0001", "attributes": ",,N,0700", "value": 5},
                {"date": "2021-10-01T00:00:00", "datatype": "TMIN", "station": "GHCND:USW00093721", "attributes": ",,W,2400", "value": -12}
            ]
        }"#;
        let page: Page<RawRecord> = parse_page(URL, body, 500, 500)?;

        assert_eq!(page.metadata, PageMetadata::new(500, 500, 700));
        assert_eq!(page.results.len(), 2);
        assert_eq!(page.results[1].value, -12.0);
        Ok(())
    }

    #[test]
    fn test_parse_empty_object_is_terminal() -> Result<(), FetchError> {
        let page: Page<RawRecord> = parse_page(URL, "{}", 0, 500)?;
        assert_eq!(page.metadata, PageMetadata::new(0, 500, 0));
        assert!(page.results.is_empty());
        Ok(())
    }

    #[test]
    fn test_parse_results_without_metadata_is_malformed() {
        let body = r#"{"results": [{"id": "S1", "name": "Somewhere"}]}"#;
        let result: Result<Page<StationEntry>, FetchError> = parse_page(URL, body, 0, 500);
        assert!(matches!(result, Err(FetchError::MalformedResponse { .. })));
    }

    #[test]
    fn test_parse_zero_based_offset_is_malformed() {
        let body = r#"{"metadata": {"resultset": {"offset": 0, "count": 1, "limit": 500}}, "results": []}"#;
        let result: Result<Page<StationEntry>, FetchError> = parse_page(URL, body, 0, 500);
        assert!(matches!(result, Err(FetchError::MalformedResponse { .. })));
    }

    #[test]
    fn test_parse_invalid_json() {
        let result: Result<Page<StationEntry>, FetchError> =
            parse_page(URL, "<html>rate limited</html>", 0, 500);
        assert!(matches!(result, Err(FetchError::Decode { .. })));
    }

    #[test]
    fn test_parse_wrong_result_shape() {
        let body = r#"{"metadata": {"resultset": {"offset": 1, "count": 1, "limit": 500}}, "results": [{"unexpected": true}]}"#;
        let result: Result<Page<RawRecord>, FetchError> = parse_page(URL, body, 0, 500);
        assert!(matches!(result, Err(FetchError::Decode { .. })));
    }

    fn param<'a>(params: &'a [(&'static str, String)], name: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    #[test]
    fn test_request_params_use_one_based_offsets() {
        let config = PipelineConfig::builder().token("test-token").build();
        let client = NoaaClient::new(&config).unwrap();
        let start = NaiveDate::from_ymd_opt(2021, 10, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2021, 10, 2).unwrap();

        let weather = client.weather_params(start, end, 500);
        assert_eq!(param(&weather, "offset"), Some("501"));
        assert_eq!(param(&weather, "limit"), Some("500"));
        assert_eq!(param(&weather, "startdate"), Some("2021-10-01"));
        assert_eq!(param(&weather, "enddate"), Some("2021-10-02"));

        let stations = client.station_params(0);
        assert_eq!(param(&stations, "offset"), Some("1"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let config = PipelineConfig::builder()
            .token("test-token")
            .weather_endpoint("http://127.0.0.1:9/data")
            .stations_endpoint("http://127.0.0.1:9/stations")
            .throttle(std::time::Duration::ZERO)
            .build();
        let client = NoaaClient::new(&config).unwrap();

        let result = client.locations().await;
        match result {
            Err(e @ FetchError::NetworkRequest(..)) => assert!(e.is_retryable()),
            other => panic!("expected a network error, got {other:?}"),
        }
    }
}
