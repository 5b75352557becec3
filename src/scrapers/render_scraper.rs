use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chrono::Utc;
use futures::StreamExt;
use log::{debug, info};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;

use super::release::run_then_release;
use super::Scraper;
use crate::core::spider::SpiderConfig;
use crate::http::{HttpRequest, HttpResponse, ResponseType};
use crate::{ScraperError, ScraperResult, StatsTracker};

/// Fetches pages through a headless Chromium so client-side rendered
/// content is present in the returned body.
///
/// The browser is launched on first use and shared by every clone.
#[derive(Clone)]
pub struct RenderScraper {
    browser: Arc<Mutex<Option<Arc<Browser>>>>,
    executable: Option<PathBuf>,
    timeout: Duration,
    stats: Arc<StatsTracker>,
}

impl RenderScraper {
    pub fn new(executable: Option<PathBuf>, timeout: Duration) -> Self {
        Self {
            browser: Arc::new(Mutex::new(None)),
            executable,
            timeout,
            stats: Arc::new(StatsTracker::new()),
        }
    }

    async fn browser(&self) -> ScraperResult<Arc<Browser>> {
        let mut guard = self.browser.lock().await;
        if let Some(browser) = guard.as_ref() {
            return Ok(Arc::clone(browser));
        }

        let mut builder = BrowserConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-gpu");
        if let Some(executable) = &self.executable {
            builder = builder.chrome_executable(executable);
        }
        let config = builder.build().map_err(ScraperError::RenderError)?;

        info!("Launching headless browser");
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScraperError::RenderError(e.to_string()))?;
        tokio::spawn(async move { while handler.next().await.is_some() {} });

        let browser = Arc::new(browser);
        *guard = Some(Arc::clone(&browser));
        Ok(browser)
    }

    /// Renders into a fresh tab. The tab is closed afterwards even when
    /// navigation fails or runs past the timeout.
    async fn render(&self, request: &HttpRequest) -> ScraperResult<String> {
        let browser = self.browser().await?;
        let page = timeout(self.timeout, browser.new_page("about:blank"))
            .await
            .map_err(|_| ScraperError::RenderError("opening a tab timed out".to_string()))?
            .map_err(|e| ScraperError::RenderError(e.to_string()))?;

        let closer = page.clone();
        let url = request.url.clone();
        let what = format!("rendering {}", url);
        let work = async move {
            page.goto(url.as_str())
                .await
                .map_err(|e| ScraperError::RenderError(e.to_string()))?;
            page.wait_for_navigation()
                .await
                .map_err(|e| ScraperError::RenderError(e.to_string()))?;
            page.content()
                .await
                .map_err(|e| ScraperError::RenderError(e.to_string()))
        };
        let release = async move {
            if let Err(e) = closer.close().await {
                debug!("Failed to close tab: {}", e);
            }
        };

        run_then_release(self.timeout, &what, work, release).await
    }
}

#[async_trait]
impl Scraper for RenderScraper {
    async fn fetch_single(
        &self,
        request: HttpRequest,
        _config: &SpiderConfig,
    ) -> ScraperResult<HttpResponse> {
        let start_time = Utc::now();
        let html = self.render(&request).await?;

        Ok(HttpResponse {
            url: request.url.clone(),
            status: 200,
            headers: HashMap::new(),
            raw_body: html.as_bytes().to_vec(),
            decoded_body: html,
            timestamp: start_time,
            retry_count: 0,
            retry_history: HashMap::new(),
            meta: None,
            response_type: ResponseType::Html,
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
