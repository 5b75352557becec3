use crate::core::spider::{ParseResult, SpiderConfig, SpiderResponse};
use crate::core::HostThrottle;
use crate::items::FirmwareRecord;
use crate::pipeline::ItemPipeline;
use crate::stats::StatsTracker;
use crate::{HttpRequest, Scraper, ScraperError};
use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, info, trace, warn};
use parking_lot::RwLock;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use url::Url;

use crate::{ScraperResult, Spider};

type CrawlTask = JoinHandle<(Url, ScraperResult<ParseResult>)>;

pub struct Crawler {
    scraper: Box<dyn Scraper>,
    renderer: Option<Box<dyn Scraper>>,
    pipeline: Option<Arc<dyn ItemPipeline>>,
    visited_urls: Arc<RwLock<HashSet<String>>>,
    stats: Arc<StatsTracker>,
    throttle: Arc<HostThrottle>,
}

impl Crawler {
    pub fn new(scraper: Box<dyn Scraper>) -> Self {
        info!("Initializing crawler");
        let stats = Arc::new(StatsTracker::new());
        let mut scraper = scraper;
        scraper.set_stats(Arc::clone(&stats));

        Self {
            scraper,
            renderer: None,
            pipeline: None,
            visited_urls: Arc::new(RwLock::new(HashSet::new())),
            stats,
            throttle: Arc::new(HostThrottle::new()),
        }
    }

    /// Scraper used for requests flagged with `render`.
    pub fn with_renderer(mut self, renderer: Box<dyn Scraper>) -> Self {
        let mut renderer = renderer;
        renderer.set_stats(Arc::clone(&self.stats));
        self.renderer = Some(renderer);
        self
    }

    pub fn with_pipeline<P: ItemPipeline + 'static>(mut self, pipeline: P) -> Self {
        let mut pipeline = pipeline;
        pipeline.set_stats(Arc::clone(&self.stats));
        pipeline.set_throttle(Arc::clone(&self.throttle));
        self.pipeline = Some(Arc::new(pipeline));
        self
    }

    pub fn stats(&self) -> Arc<StatsTracker> {
        Arc::clone(&self.stats)
    }

    pub async fn run<S: Spider + Send + Sync + 'static>(&self, spider: S) -> ScraperResult<()> {
        let spider = Arc::new(spider);
        let max_concurrency = spider.config().max_concurrency.max(1);
        let mut futures: FuturesUnordered<CrawlTask> = FuturesUnordered::new();
        let mut pending: VecDeque<HttpRequest> = VecDeque::new();
        let mut item_tasks: Vec<JoinHandle<ScraperResult<()>>> = Vec::new();

        info!("Starting spider: {}", spider.name());
        debug!("Max depth: {}", spider.config().max_depth);

        self.enqueue(spider.start_requests(), spider.as_ref(), &mut pending);

        loop {
            while futures.len() < max_concurrency {
                let Some(request) = pending.pop_front() else {
                    break;
                };
                futures.push(self.process_request(request, Arc::clone(&spider)));
            }
            if futures.len() >= max_concurrency && !pending.is_empty() {
                debug!(
                    "Reached concurrent request limit {}, {} requests waiting",
                    max_concurrency,
                    pending.len()
                );
            }

            let Some(result) = futures.next().await else {
                break;
            };

            match result {
                Ok((_, Ok(parse_result))) => match parse_result {
                    ParseResult::Continue(new_requests) => {
                        self.enqueue(new_requests, spider.as_ref(), &mut pending);
                    }
                    ParseResult::Yield { items, requests } => {
                        for item in items {
                            item_tasks.extend(self.process_item(item));
                        }
                        self.enqueue(requests, spider.as_ref(), &mut pending);
                    }
                    ParseResult::Skip => {
                        debug!("Skipping current URL");
                    }
                    ParseResult::Stop => {
                        info!("Spider requested stop");
                        futures.iter().for_each(|task| task.abort());
                        break;
                    }
                },
                Ok((url, Err(error))) => self.record_error(&url, &error),
                Err(e) => warn!("Task error: {}", e),
            }
        }

        for task in item_tasks {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("Pipeline failed to process item: {}", e);
                    self.stats.increment_pipeline_errors();
                }
                Err(e) => warn!("Pipeline task error: {}", e),
            }
        }

        info!(
            "Spider {} completed. Total URLs processed: {}",
            spider.name(),
            self.visited_urls.read().len()
        );
        self.stats.finish();
        self.stats.print_summary();
        Ok(())
    }

    fn record_error(&self, url: &Url, error: &ScraperError) {
        match error {
            ScraperError::MalformedDate { .. } | ScraperError::ExtractionError(_) => {
                warn!("Parsing error for {}: {}", url, error);
                self.stats.increment_parsing_errors();
            }
            _ => {
                warn!("Failed to process {}: {}", url, error);
                self.stats.increment_fetch_errors();
            }
        }
    }

    fn enqueue<S: Spider>(
        &self,
        requests: Vec<HttpRequest>,
        spider: &S,
        pending: &mut VecDeque<HttpRequest>,
    ) {
        let config = spider.config();
        let allowed_domains = spider.allowed_domains();

        for request in requests {
            if request.depth >= config.max_depth {
                debug!("Skipping URL {} - max depth reached", request.url);
                continue;
            }

            if let Some(domains) = &allowed_domains {
                if !is_allowed_host(&request.url, domains) {
                    debug!("Skipping URL {} - offsite", request.url);
                    continue;
                }
            }

            let url_str = request.url.to_string();
            if !config.allow_url_revisit && !self.visited_urls.write().insert(url_str.clone()) {
                debug!("Skipping URL {} - already visited", url_str);
                continue;
            }

            info!("Queueing URL: {} at depth {}", url_str, request.depth);
            if let Some(meta) = &request.meta {
                trace!("Request metadata: {:?}", meta);
            }
            pending.push_back(request);
        }
    }

    fn process_request<S: Spider + Send + Sync + 'static>(
        &self,
        request: HttpRequest,
        spider: Arc<S>,
    ) -> CrawlTask {
        let scraper = match (&self.renderer, request.render) {
            (Some(renderer), true) => renderer.box_clone(),
            (None, true) => {
                warn!(
                    "No renderer configured, fetching {} without rendering",
                    request.url
                );
                self.scraper.box_clone()
            }
            _ => self.scraper.box_clone(),
        };
        let throttle = Arc::clone(&self.throttle);
        let config = spider.config().clone();

        spawn(async move {
            let url = request.url.clone();

            if let Some(delay) = request.delay {
                sleep(delay).await;
            }
            if !request.render {
                let wait = throttle.reserve(url.host_str().unwrap_or_default(), config.download_delay);
                if !wait.is_zero() {
                    trace!("Throttling {} for {:?}", url, wait);
                    sleep(wait).await;
                }
            }

            let result = fetch_and_parse(scraper, request, &config, spider).await;
            (url, result)
        })
    }

    fn process_item(&self, item: FirmwareRecord) -> Option<JoinHandle<ScraperResult<()>>> {
        self.stats.increment_items_scraped();
        debug!(
            "Scraped {} {:?} {:?}",
            item.vendor(),
            item.device_name(),
            item.firmware_version()
        );

        let Some(pipeline) = &self.pipeline else {
            debug!("No item pipeline configured, dropping {:?}", item.file_urls());
            return None;
        };
        let pipeline = Arc::clone(pipeline);
        Some(spawn(async move { pipeline.process_item(item).await }))
    }
}

async fn fetch_and_parse<S: Spider + Send + Sync>(
    scraper: Box<dyn Scraper>,
    request: HttpRequest,
    config: &SpiderConfig,
    spider: Arc<S>,
) -> ScraperResult<ParseResult> {
    let url = request.url.clone();
    let response = scraper.fetch(request.clone(), config).await?;
    if !config.handles_status(response.status) {
        debug!("Ignoring response {} for {}", response.status, url);
        return Ok(ParseResult::Skip);
    }

    let spider_response = SpiderResponse {
        response,
        callback: request.callback,
    };
    spider.parse(spider_response, url, request.depth).await
}

/// True when the host equals one of `domains` or is a subdomain of one.
fn is_allowed_host(url: &Url, domains: &[String]) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    domains.iter().any(|domain| {
        host == domain
            || host
                .strip_suffix(domain.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_hosts() {
        let domains = vec!["asus.com".to_string()];
        let allowed = |url: &str| is_allowed_host(&Url::parse(url).unwrap(), &domains);

        assert!(allowed("https://asus.com/"));
        assert!(allowed("https://www.asus.com/networking/"));
        assert!(!allowed("https://notasus.com/"));
        assert!(!allowed("https://example.org/asus.com"));
    }
}
