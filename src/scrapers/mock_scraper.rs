use crate::core::spider::SpiderConfig;
use crate::http::ResponseType;
use crate::{HttpRequest, HttpResponse, ScraperResult, StatsTracker};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::sleep;

use super::Scraper;

#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
    pub delay: Option<std::time::Duration>,
}

impl MockResponse {
    pub fn ok(body: &str) -> Self {
        Self::with_status(200, body)
    }

    pub fn with_status(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: None,
        }
    }
}

/// Canned-response scraper. Routed URLs always get their own response,
/// everything else cycles through the unrouted list.
#[derive(Clone)]
pub struct MockScraper {
    responses: Arc<Vec<MockResponse>>,
    routes: Arc<HashMap<String, MockResponse>>,
    current_response: Arc<AtomicUsize>,
    requests: Arc<RwLock<Vec<HttpRequest>>>,
    stats: Arc<StatsTracker>,
}

impl MockScraper {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Arc::new(responses),
            routes: Arc::new(HashMap::new()),
            current_response: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(RwLock::new(Vec::new())),
            stats: Arc::new(StatsTracker::new()),
        }
    }

    pub fn with_routes(mut self, routes: Vec<(&str, MockResponse)>) -> Self {
        self.routes = Arc::new(
            routes
                .into_iter()
                .map(|(url, response)| (url.to_string(), response))
                .collect(),
        );
        self
    }

    /// Every request this scraper (or any of its clones) has served.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.read().clone()
    }

    fn next_response(&self, url: &str) -> MockResponse {
        if let Some(response) = self.routes.get(url) {
            return response.clone();
        }
        if self.responses.is_empty() {
            return MockResponse::with_status(404, "Not Found");
        }
        let index = self.current_response.fetch_add(1, Ordering::SeqCst);
        self.responses[index % self.responses.len()].clone()
    }
}

#[async_trait]
impl Scraper for MockScraper {
    async fn fetch_single(
        &self,
        request: HttpRequest,
        _config: &SpiderConfig,
    ) -> ScraperResult<HttpResponse> {
        self.requests.write().push(request.clone());
        let response = self.next_response(request.url.as_str());

        if let Some(delay) = response.delay {
            sleep(delay).await;
        }

        let response_type = if response.body.trim_start().starts_with('<') {
            ResponseType::Html
        } else {
            ResponseType::Text
        };

        Ok(HttpResponse {
            url: request.url.clone(),
            status: response.status,
            headers: HashMap::new(),
            raw_body: response.body.as_bytes().to_vec(),
            decoded_body: response.body,
            timestamp: Utc::now(),
            retry_count: 0,
            retry_history: HashMap::new(),
            meta: None,
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
