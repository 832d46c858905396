//! `DashboardSource` backed by the dashboard service's HTTP JSON API.

use crate::core::config::ApiConfig;
use crate::core::error::FetchError;
use crate::core::model::{
    CompositePayload, CountryMetric, DetailTable, HealthStatus, IndustryMetric, RefreshAck,
    SectorMetric, TariffMeasure, TimePoint,
};
use crate::core::serde_util::records_from_value;
use crate::core::source::DashboardSource;
use crate::providers::util::with_retry;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const GET_RETRIES: usize = 3;
const RETRY_DELAY_MS: u64 = 500;

pub struct HttpDashboardSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDashboardSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("tariffboard/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;
        Ok(HttpDashboardSource {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, FetchError> {
        Self::new(&config.base_url, config.timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GETs `path` and returns the unwrapped payload. Transport failures are
    /// retried; error statuses are not.
    async fn get(&self, path: &str) -> Result<Value, FetchError> {
        let url = self.url(path);
        debug!("Requesting {}", url);

        let response = with_retry(
            || async { self.client.get(&url).send().await },
            GET_RETRIES,
            RETRY_DELAY_MS,
        )
        .await
        .map_err(|source| FetchError::Request {
            url: url.clone(),
            source,
        })?;

        let body = read_body(response, &url).await?;
        Ok(unwrap_envelope(body, &url)?.unwrap_or(Value::Null))
    }

    async fn post(&self, path: &str) -> Result<Value, FetchError> {
        let url = self.url(path);
        debug!("Posting to {}", url);

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.clone(),
                source,
            })?;
        let body = read_body(response, &url).await?;
        check_error_envelope(&body, &url)?;
        Ok(body)
    }

    async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, FetchError> {
        let records = records_from_value(self.get(path).await?);
        debug!(path, count = records.len(), "Fetched records");
        Ok(records)
    }
}

/// Checks the status and parses the body. An empty body reads as `null`.
async fn read_body(response: reqwest::Response, url: &str) -> Result<Value, FetchError> {
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    let text = response.text().await.map_err(|source| FetchError::Request {
        url: url.to_string(),
        source,
    })?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|source| FetchError::Decode {
        url: url.to_string(),
        source,
    })
}

fn check_error_envelope(body: &Value, url: &str) -> Result<(), FetchError> {
    if body.get("status").and_then(Value::as_str) == Some("error") {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(FetchError::Api {
            url: url.to_string(),
            message,
        });
    }
    Ok(())
}

const ENVELOPE_KEYS: [&str; 4] = ["status", "data", "message", "details"];

/// `{"status", "data", "message"}` yields its `data`; any other body is the
/// payload itself. `Ok(None)` means there was no data at all.
fn unwrap_envelope(body: Value, url: &str) -> Result<Option<Value>, FetchError> {
    check_error_envelope(&body, url)?;
    match body {
        Value::Object(mut map)
            if map.contains_key("data") && map.keys().all(|k| ENVELOPE_KEYS.contains(&k.as_str())) =>
        {
            Ok(map.remove("data").filter(|data| !data.is_null()))
        }
        Value::Null => Ok(None),
        other => Ok(Some(other)),
    }
}

#[async_trait]
impl DashboardSource for HttpDashboardSource {
    #[instrument(name = "FetchComposite", skip(self), fields(base_url = %self.base_url))]
    async fn fetch_composite(&self) -> Result<Option<CompositePayload>, FetchError> {
        let url = self.url("/api/dashboard");
        match self.get("/api/dashboard").await? {
            Value::Null => Ok(None),
            value => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| FetchError::Decode { url, source }),
        }
    }

    async fn fetch_heatmap(&self) -> Result<Vec<CountryMetric>, FetchError> {
        self.get_list("/api/heatmap").await
    }

    async fn fetch_sectors(&self) -> Result<Vec<SectorMetric>, FetchError> {
        self.get_list("/api/sectors").await
    }

    async fn fetch_time_series(&self) -> Result<Vec<TimePoint>, FetchError> {
        self.get_list("/api/timeseries").await
    }

    async fn fetch_detail_table(&self) -> Result<DetailTable, FetchError> {
        Ok(DetailTable::from_value(self.get("/api/table").await?))
    }

    async fn fetch_countries(&self) -> Result<Vec<CountryMetric>, FetchError> {
        self.get_list("/api/countries").await
    }

    async fn fetch_industries(&self) -> Result<Vec<IndustryMetric>, FetchError> {
        self.get_list("/api/industries").await
    }

    async fn fetch_measures(&self) -> Result<Vec<TariffMeasure>, FetchError> {
        self.get_list("/api/measures").await
    }

    /// POSTs `/api/update`, falling back to `/api/refresh` on deployments
    /// that only expose the older route.
    #[instrument(name = "TriggerRefresh", skip(self), fields(base_url = %self.base_url))]
    async fn trigger_refresh(&self) -> Result<RefreshAck, FetchError> {
        let body = match self.post("/api/update").await {
            Err(e) if e.is_status(404) => {
                warn!("/api/update not found, trying /api/refresh");
                self.post("/api/refresh").await?
            }
            other => other?,
        };
        Ok(serde_json::from_value(body).unwrap_or_default())
    }

    async fn health(&self) -> Result<HealthStatus, FetchError> {
        let url = self.url("/health");
        let value = self.get("/health").await?;
        serde_json::from_value(value).map_err(|source| FetchError::Decode { url, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount(server: &MockServer, verb: &str, route: &str, status: u16, body: Value) {
        Mock::given(method(verb))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(server)
            .await;
    }

    fn source(server: &MockServer) -> HttpDashboardSource {
        HttpDashboardSource::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_composite_envelope_is_unwrapped() {
        let server = MockServer::start().await;
        let body = json!({
            "status": "success",
            "data": {
                "heatmap_data": [
                    {"country_code": "CHN", "country_name": "China", "value": 12.5},
                    {"country_name": "No code"}
                ],
                "sector_data": [{"sector": "Manufacturing", "percentage": "41.2"}],
                "time_series": [{"year": 2023, "trade_deficit": -1.2, "exports": 2.0}],
                "detail_table": {"countries": [], "industries": [{"industry_code": 331, "industry_name": "Primary Metals"}]},
                "metadata": {"last_updated": "2025-04-01T00:00:00"}
            }
        });
        mount(&server, "GET", "/api/dashboard", 200, body).await;

        let composite = source(&server).fetch_composite().await.unwrap().unwrap();

        let heatmap = composite.heatmap_data.unwrap();
        assert_eq!(heatmap.len(), 1);
        assert_eq!(heatmap[0].value, Some(12.5));
        assert_eq!(composite.sector_data.unwrap()[0].percentage, Some(41.2));
        let series = composite.time_series.unwrap();
        assert_eq!(series[0].year, "2023");
        assert_eq!(series[0].value("exports"), Some(2.0));
        assert_eq!(composite.detail_table.unwrap().industries[0].industry_code, "331");
        assert!(composite.metadata.is_some());
    }

    #[tokio::test]
    async fn test_bare_composite_is_accepted() {
        let server = MockServer::start().await;
        mount(
            &server,
            "GET",
            "/api/dashboard",
            200,
            json!({"heatmap_data": [{"country_code": "MEX"}], "sector_data": null}),
        )
        .await;

        let composite = source(&server).fetch_composite().await.unwrap().unwrap();
        assert_eq!(composite.heatmap_data.unwrap()[0].country_code, "MEX");
        assert!(composite.sector_data.is_none());
        assert!(composite.time_series.is_none());
    }

    #[tokio::test]
    async fn test_null_composite_is_absent() {
        let server = MockServer::start().await;
        mount(&server, "GET", "/api/dashboard", 200, json!({"status": "success", "data": null})).await;

        assert!(source(&server).fetch_composite().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = MockServer::start().await;
        mount(&server, "GET", "/api/sectors", 500, json!({"detail": "boom"})).await;

        let err = source(&server).fetch_sectors().await.unwrap_err();
        assert!(err.is_status(500));
    }

    #[tokio::test]
    async fn test_error_envelope_is_reported() {
        let server = MockServer::start().await;
        mount(
            &server,
            "GET",
            "/api/heatmap",
            200,
            json!({"status": "error", "message": "pipeline not ready"}),
        )
        .await;

        let err = source(&server).fetch_heatmap().await.unwrap_err();
        assert!(matches!(err, FetchError::Api { ref message, .. } if message == "pipeline not ready"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/timeseries"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = source(&server).fetch_time_series().await.unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_flat_detail_table_is_split() {
        let server = MockServer::start().await;
        mount(
            &server,
            "GET",
            "/api/table",
            200,
            json!({"status": "success", "data": [
                {"country_code": "CAN", "effective_tariff": 25},
                {"industry_code": "3361", "industry_name": "Motor Vehicles"}
            ]}),
        )
        .await;

        let table = source(&server).fetch_detail_table().await.unwrap();
        assert_eq!(table.countries.len(), 1);
        assert_eq!(table.industries.len(), 1);
    }

    #[tokio::test]
    async fn test_measures_with_encoded_lists() {
        let server = MockServer::start().await;
        mount(
            &server,
            "GET",
            "/api/measures",
            200,
            json!({"status": "success", "data": [{
                "id": "WH-2025-04",
                "title": "Reciprocal tariffs",
                "affected_countries": "[\"CHN\", \"VNM\"]",
                "affected_industries": ["331"]
            }]}),
        )
        .await;

        let measures = source(&server).fetch_measures().await.unwrap();
        assert_eq!(measures[0].affected_countries, vec!["CHN", "VNM"]);
        assert_eq!(measures[0].affected_industries, vec!["331"]);
    }

    #[tokio::test]
    async fn test_update_falls_back_to_refresh_route() {
        let server = MockServer::start().await;
        mount(&server, "POST", "/api/update", 404, json!({"detail": "Not Found"})).await;
        mount(
            &server,
            "POST",
            "/api/refresh",
            200,
            json!({"status": "success", "message": "Refresh scheduled"}),
        )
        .await;

        let ack = source(&server).trigger_refresh().await.unwrap();
        assert_eq!(ack.message.as_deref(), Some("Refresh scheduled"));
    }

    #[tokio::test]
    async fn test_update_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/update"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let err = source(&server).trigger_refresh().await.unwrap_err();
        assert!(err.is_status(503));
    }

    #[tokio::test]
    async fn test_health() {
        let server = MockServer::start().await;
        mount(
            &server,
            "GET",
            "/health",
            200,
            json!({"status": "healthy", "last_data_refresh": null}),
        )
        .await;

        let health = source(&server).health().await.unwrap();
        assert_eq!(health.status, "healthy");
        assert!(health.last_data_refresh.is_none());
    }

    #[test]
    fn test_unwrap_envelope() {
        let url = "http://test";
        assert_eq!(
            unwrap_envelope(json!({"status": "success", "data": [1]}), url).unwrap(),
            Some(json!([1]))
        );
        assert_eq!(unwrap_envelope(json!({"status": "success", "data": null}), url).unwrap(), None);
        // Payloads that merely contain a `data` key are not envelopes.
        let bare = json!({"status": "ok", "data": 1, "year": "2024"});
        assert_eq!(unwrap_envelope(bare.clone(), url).unwrap(), Some(bare));
        assert!(unwrap_envelope(json!({"status": "error", "message": "x"}), url).is_err());
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let source = HttpDashboardSource::new("http://localhost:8000/", Duration::from_secs(1)).unwrap();
        assert_eq!(source.url("/api/table"), "http://localhost:8000/api/table");
    }
}
