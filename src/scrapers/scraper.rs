use crate::core::spider::SpiderConfig;
use crate::{HttpRequest, HttpResponse, ScraperResult, StatsTracker};
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, trace, warn};
use std::sync::Arc;
use tokio::time::sleep;

#[async_trait]
pub trait Scraper: Send + Sync {
    async fn fetch_single(
        &self,
        request: HttpRequest,
        config: &SpiderConfig,
    ) -> ScraperResult<HttpResponse>;
    fn box_clone(&self) -> Box<dyn Scraper>;
    fn stats(&self) -> &StatsTracker;
    fn set_stats(&mut self, stats: Arc<StatsTracker>);

    async fn fetch(
        &self,
        request: HttpRequest,
        config: &SpiderConfig,
    ) -> ScraperResult<HttpResponse> {
        let start_time = Utc::now();
        let url = request.url.clone();
        let retry_config = &config.retry_config;

        loop {
            info!("Fetching URL: {}", url);
            let response = match self.fetch_single(request.clone(), config).await {
                Ok(response) => response,
                Err(e) if e.is_transport() => match retry_config.should_retry_transport(&url) {
                    Some((category, delay)) => {
                        self.stats().record_retry(format!("{:?}", category));
                        warn!(
                            "Transport failure for URL: {} ({}), retrying in {:?}",
                            url, e, delay
                        );
                        sleep(delay).await;
                        continue;
                    }
                    None => {
                        retry_config.take_retry_state(&url);
                        return Err(e);
                    }
                },
                Err(e) => {
                    retry_config.take_retry_state(&url);
                    return Err(e);
                }
            };
            debug!(
                "Received response: status={}, body_length={}",
                response.status,
                response.raw_body.len()
            );

            if let Some((category, delay)) =
                retry_config.should_retry(&url, response.status, &response.decoded_body)
            {
                self.stats().record_retry(format!("{:?}", category));
                let state = retry_config.get_retry_state(&url);
                let attempt = state.counts.get(&category).copied().unwrap_or(0);

                warn!(
                    "Retry triggered for URL: {} (category={:?}, attempt={}/{}, delay={:?})",
                    url,
                    category,
                    attempt,
                    retry_config
                        .categories
                        .get(&category)
                        .map(|c| c.max_retries)
                        .unwrap_or(0),
                    delay
                );

                sleep(delay).await;
                continue;
            }

            let state = retry_config.take_retry_state(&url);

            info!(
                "Request completed for URL: {} (total_retries={}, status={})",
                url, state.total_retries, response.status
            );
            debug!("Retry history for {}: {:?}", url, state.counts);
            trace!("Response content length: {} bytes", response.raw_body.len());

            let duration = Utc::now().signed_duration_since(start_time);
            self.stats()
                .record_request(response.status, response.raw_body.len(), duration);

            return Ok(HttpResponse {
                retry_count: state.total_retries,
                retry_history: state.counts,
                ..response
            });
        }
    }
}
