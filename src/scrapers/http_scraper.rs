use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client, ClientBuilder};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::Scraper;
use crate::core::spider::SpiderConfig;
use crate::http::request::HttpRequest;
use crate::http::response::ResponseType;
use crate::HttpResponse;
use crate::{ScraperError, ScraperResult, StatsTracker};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Error)]
pub enum HttpScraperError {
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] header::InvalidHeaderName),
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] header::InvalidHeaderValue),
}

impl From<HttpScraperError> for ScraperError {
    fn from(err: HttpScraperError) -> Self {
        match err {
            HttpScraperError::HttpError(e) => ScraperError::HttpError(e),
            other => ScraperError::ExtractionError(other.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct HttpScraper {
    client: Client,
    header_map: header::HeaderMap,
    timeout: Option<Duration>,
    stats: Arc<StatsTracker>,
}

impl HttpScraper {
    pub fn new() -> Result<Self, HttpScraperError> {
        let mut header_map = header::HeaderMap::new();
        header_map.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static(DEFAULT_USER_AGENT),
        );
        let client = Self::build_client(&header_map, None)?;

        Ok(Self {
            client,
            header_map,
            timeout: None,
            stats: Arc::new(StatsTracker::new()),
        })
    }

    pub fn with_headers(mut self, headers: Vec<(&str, &str)>) -> Result<Self, HttpScraperError> {
        for (key, value) in headers {
            let name = header::HeaderName::from_bytes(key.as_bytes())?;
            let value = header::HeaderValue::from_str(value)?;
            self.header_map.insert(name, value);
        }

        self.client = Self::build_client(&self.header_map, self.timeout)?;
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, HttpScraperError> {
        self.timeout = Some(timeout);
        self.client = Self::build_client(&self.header_map, self.timeout)?;
        Ok(self)
    }

    fn build_client(
        header_map: &header::HeaderMap,
        timeout: Option<Duration>,
    ) -> Result<Client, HttpScraperError> {
        let mut builder = ClientBuilder::new().default_headers(header_map.clone());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(builder.build()?)
    }

    fn extract_headers(response: &reqwest::Response) -> HashMap<String, String> {
        response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|val| (k.to_string(), val.to_string())))
            .collect()
    }

    pub(crate) fn detect_content_type(headers: &HashMap<String, String>, body: &str) -> ResponseType {
        if let Some(content_type) = headers.get("content-type") {
            if content_type.contains("text/html") {
                ResponseType::Html
            } else if content_type.contains("application/json") {
                ResponseType::Json
            } else if content_type.contains("text/") {
                ResponseType::Text
            } else {
                ResponseType::Binary
            }
        } else {
            // Try to detect content type from body
            let trimmed = body.trim_start();
            if trimmed.starts_with('{') || trimmed.starts_with('[') {
                ResponseType::Json
            } else if trimmed.starts_with("<!DOCTYPE")
                || trimmed.starts_with("<!doctype")
                || trimmed.starts_with("<html")
            {
                ResponseType::Html
            } else {
                ResponseType::Text
            }
        }
    }
}

#[async_trait]
impl Scraper for HttpScraper {
    async fn fetch_single(
        &self,
        request: HttpRequest,
        config: &SpiderConfig,
    ) -> ScraperResult<HttpResponse> {
        let method = request.method.clone();
        let mut req = self.client.request(method.clone(), request.url.clone());

        // Spider-wide headers first, request headers override them
        for (key, value) in &config.headers {
            req = req.header(key, value);
        }
        for (key, value) in &request.headers {
            req = req.header(key, value);
        }

        if let Some(body) = request.body.clone() {
            req = req.body(body);
        }

        let start_time = Utc::now();
        let response = req.send().await.map_err(HttpScraperError::from)?;

        let status = response.status().as_u16();
        let headers = Self::extract_headers(&response);
        let raw_body = response.bytes().await.map_err(HttpScraperError::from)?;
        let decoded_body = String::from_utf8_lossy(&raw_body).into_owned();
        let end_time = Utc::now();

        let meta = json!({
            "request": {
                "method": method.as_str(),
            },
            "response": {
                "elapsed": (end_time - start_time).num_milliseconds(),
                "content_length": raw_body.len(),
                "encoding": headers.get("content-encoding").cloned().unwrap_or_default(),
            }
        });

        let response_type = Self::detect_content_type(&headers, &decoded_body);

        Ok(HttpResponse {
            url: request.url.clone(),
            status,
            headers,
            raw_body: raw_body.to_vec(),
            decoded_body,
            timestamp: start_time,
            retry_count: 0,
            retry_history: HashMap::new(),
            meta: Some(meta),
            response_type,
            from_request: Box::new(request),
        })
    }

    fn box_clone(&self) -> Box<dyn Scraper> {
        Box::new(self.clone())
    }

    fn stats(&self) -> &StatsTracker {
        &self.stats
    }

    fn set_stats(&mut self, stats: Arc<StatsTracker>) {
        self.stats = stats;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::retry::{RetryCategory, RetryConfig};
    use crate::core::spider::SpiderCallback;
    use reqwest::Method;
    use url::Url;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> Result<(HttpScraper, MockServer), HttpScraperError> {
        let server = MockServer::start().await;
        let scraper = HttpScraper::new()?;
        Ok((scraper, server))
    }

    fn url_for(server: &MockServer, route: &str) -> Url {
        Url::parse(&server.uri()).unwrap().join(route).unwrap()
    }

    #[tokio::test]
    async fn test_get_request() {
        let (scraper, mock_server) = setup().await.unwrap();

        Mock::given(method("GET"))
            .and(path("/test"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("Hello, World!")
                    .insert_header("content-type", "text/plain"),
            )
            .mount(&mock_server)
            .await;

        let response = scraper
            .fetch(
                HttpRequest::new(url_for(&mock_server, "/test"), SpiderCallback::Bootstrap, 0),
                &SpiderConfig::default(),
            )
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.decoded_body, "Hello, World!");
        assert_eq!(response.response_type, ResponseType::Text);
    }

    #[tokio::test]
    async fn test_html_detection() {
        let (scraper, mock_server) = setup().await.unwrap();

        Mock::given(method("GET"))
            .and(path("/support/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><body>ok</body></html>", "text/html; charset=utf-8"),
            )
            .mount(&mock_server)
            .await;

        let response = scraper
            .fetch(
                HttpRequest::new(
                    url_for(&mock_server, "/support/"),
                    SpiderCallback::Bootstrap,
                    0,
                ),
                &SpiderConfig::default(),
            )
            .await
            .unwrap();

        assert_eq!(response.response_type, ResponseType::Html);
        assert_eq!(response.from_request.url.path(), "/support/");
    }

    #[tokio::test]
    async fn test_post_request() {
        let (scraper, mock_server) = setup().await.unwrap();
        let body = json!({"key": "value"}).to_string();

        Mock::given(method("POST"))
            .and(path("/test"))
            .and(body_string(body.clone()))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({"status": "created"}))
                    .insert_header("content-type", "application/json"),
            )
            .mount(&mock_server)
            .await;

        let request = HttpRequest::new(url_for(&mock_server, "/test"), SpiderCallback::Bootstrap, 0)
            .with_method(Method::POST)
            .with_body(body);
        let response = scraper
            .fetch(request, &SpiderConfig::default())
            .await
            .unwrap();

        assert_eq!(response.status, 201);
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&response.decoded_body).unwrap(),
            json!({"status": "created"})
        );
        assert_eq!(response.response_type, ResponseType::Json);
    }

    #[tokio::test]
    async fn test_error_status_is_returned_not_raised() {
        let (scraper, mock_server) = setup().await.unwrap();

        Mock::given(method("GET"))
            .and(path("/error"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&mock_server)
            .await;

        let response = scraper
            .fetch(
                HttpRequest::new(url_for(&mock_server, "/error"), SpiderCallback::Bootstrap, 0),
                &SpiderConfig::default(),
            )
            .await
            .unwrap();

        assert_eq!(response.status, 404);
        assert!(response.is_error());
        assert_eq!(response.decoded_body, "Not Found");
    }

    #[tokio::test]
    async fn test_server_error_retried_with_firmware_defaults() {
        let (scraper, mock_server) = setup().await.unwrap();

        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&mock_server)
            .await;

        let mut retry_config = RetryConfig::firmware_defaults();
        for category in retry_config.categories.values_mut() {
            category.initial_delay = Duration::from_millis(5);
        }
        let config = SpiderConfig::default().with_retry(retry_config);

        let response = scraper
            .fetch(
                HttpRequest::new(url_for(&mock_server, "/flaky"), SpiderCallback::Bootstrap, 0),
                &config,
            )
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.retry_count, 1);
    }

    fn fast_firmware_retry() -> SpiderConfig {
        let mut retry_config = RetryConfig::firmware_defaults();
        for category in retry_config.categories.values_mut() {
            category.initial_delay = Duration::from_millis(5);
        }
        SpiderConfig::default().with_retry(retry_config)
    }

    #[tokio::test]
    async fn test_timeout_retried_then_reported() {
        let (scraper, mock_server) = setup().await.unwrap();
        let scraper = scraper.with_timeout(Duration::from_millis(100)).unwrap();

        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_millis(500)),
            )
            .expect(3)
            .mount(&mock_server)
            .await;

        let result = scraper
            .fetch(
                HttpRequest::new(url_for(&mock_server, "/slow"), SpiderCallback::Bootstrap, 0),
                &fast_firmware_retry(),
            )
            .await;

        assert!(matches!(result, Err(ref e) if e.is_transport()));
        assert_eq!(scraper.stats().get_stats().retry_count, 2);
        mock_server.verify().await;
    }

    #[tokio::test]
    async fn test_timeout_recovers_on_retry() {
        let (scraper, mock_server) = setup().await.unwrap();
        let scraper = scraper.with_timeout(Duration::from_millis(100)).unwrap();

        Mock::given(method("GET"))
            .and(path("/slow-once"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/slow-once"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&mock_server)
            .await;

        let response = scraper
            .fetch(
                HttpRequest::new(
                    url_for(&mock_server, "/slow-once"),
                    SpiderCallback::Bootstrap,
                    0,
                ),
                &fast_firmware_retry(),
            )
            .await
            .unwrap();

        assert_eq!(response.decoded_body, "ok");
        assert_eq!(response.retry_count, 1);
        assert_eq!(response.retry_history.get(&RetryCategory::Timeout), Some(&1));
    }

    #[tokio::test]
    async fn test_refused_connection_is_transport_error() {
        let scraper = HttpScraper::new().unwrap();
        // nothing listens on the discard port
        let url = Url::parse("http://127.0.0.1:9/").unwrap();

        let result = scraper
            .fetch(
                HttpRequest::new(url, SpiderCallback::Bootstrap, 0),
                &fast_firmware_retry(),
            )
            .await;

        assert!(matches!(result, Err(ref e) if e.is_transport()));
        assert_eq!(scraper.stats().get_stats().retry_count, 2);
    }

    #[tokio::test]
    async fn test_custom_headers() {
        let (scraper, mock_server) = setup().await.unwrap();
        let custom_ua = "FirmwareBot/1.0";
        let scraper = scraper
            .with_headers(vec![("user-agent", custom_ua)])
            .unwrap();

        Mock::given(method("GET"))
            .and(path("/"))
            .and(header("user-agent", custom_ua))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&mock_server)
            .await;

        let response = scraper
            .fetch(
                HttpRequest::new(url_for(&mock_server, "/"), SpiderCallback::Bootstrap, 0),
                &SpiderConfig::default(),
            )
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.decoded_body, "ok");
    }

    #[tokio::test]
    async fn test_invalid_headers() {
        let scraper = HttpScraper::new().unwrap();
        let result = scraper.with_headers(vec![("invalid\0header", "value")]);
        assert!(result.is_err());
    }
}
