use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use crate::core::retry::RetryConfig;
use crate::items::FirmwareRecord;
use crate::{HttpRequest, HttpResponse, ScraperResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpiderCallback {
    Bootstrap,
    ParseItem,
    Custom(String),
}

#[derive(Debug, Clone)]
pub struct SpiderResponse {
    pub response: HttpResponse,
    pub callback: SpiderCallback,
}

#[derive(Debug)]
pub enum ParseResult {
    Continue(Vec<HttpRequest>),
    Yield {
        items: Vec<FirmwareRecord>,
        requests: Vec<HttpRequest>,
    },
    Skip,
    Stop,
}

#[derive(Debug, Clone)]
pub struct SpiderConfig {
    pub max_depth: usize,
    pub max_concurrency: usize,
    /// Minimum spacing between two plain fetches to the same host.
    pub download_delay: Duration,
    pub allow_url_revisit: bool,
    pub headers: Vec<(String, String)>,
    pub retry_config: RetryConfig,
    /// Error statuses that are still handed to the spider.
    pub handle_http_status: Vec<u16>,
}

impl Default for SpiderConfig {
    fn default() -> Self {
        Self {
            max_depth: 16,
            max_concurrency: 16,
            download_delay: Duration::ZERO,
            allow_url_revisit: false,
            headers: Vec::new(),
            retry_config: RetryConfig::default(),
            handle_http_status: Vec::new(),
        }
    }
}

impl SpiderConfig {
    pub fn with_retry(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    pub fn with_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_download_delay(mut self, download_delay: Duration) -> Self {
        self.download_delay = download_delay;
        self
    }

    pub fn with_allow_url_revisit(mut self, allow: bool) -> Self {
        self.allow_url_revisit = allow;
        self
    }

    pub fn with_headers(mut self, headers: Vec<(&str, &str)>) -> Self {
        self.headers = headers
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self
    }

    pub fn with_handle_http_status(mut self, statuses: Vec<u16>) -> Self {
        self.handle_http_status = statuses;
        self
    }

    pub fn handles_status(&self, status: u16) -> bool {
        status < 400 || self.handle_http_status.contains(&status)
    }
}

#[async_trait]
pub trait Spider {
    fn name(&self) -> String;
    fn start_urls(&self) -> Vec<Url>;

    /// Hosts (and their subdomains) the crawler may visit. `None` allows all.
    fn allowed_domains(&self) -> Option<Vec<String>> {
        None
    }

    fn config(&self) -> &SpiderConfig;
    fn set_config(&mut self, config: SpiderConfig);

    fn with_config(mut self, config: SpiderConfig) -> Self
    where
        Self: Sized,
    {
        self.set_config(config);
        self
    }

    fn start_requests(&self) -> Vec<HttpRequest> {
        self.start_urls()
            .into_iter()
            .map(|url| HttpRequest::new(url, SpiderCallback::Bootstrap, 0))
            .collect()
    }

    async fn parse(
        &self,
        response: SpiderResponse,
        url: Url,
        depth: usize,
    ) -> ScraperResult<ParseResult>;
}
