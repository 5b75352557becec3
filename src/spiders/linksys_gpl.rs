use async_trait::async_trait;
use log::{debug, error, info};
use scraper::{Html, Selector};
use url::Url;

use super::html::{selector, text_nodes};
use crate::core::retry::RetryConfig;
use crate::core::spider::{ParseResult, SpiderCallback, SpiderConfig, SpiderResponse};
use crate::items::{FirmwareMeta, FirmwareRecord};
use crate::{ScraperResult, Spider};

const VENDOR: &str = "Linksys";
const START_URL: &str = "https://www.linksys.com/de/support-article?articleNum=114663";

/// One GPL download row, expanded per device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GplRow {
    pub device: String,
    pub version: String,
    pub link: String,
}

/// Reads the Linksys GPL code centre table. Rows with three cells open a
/// device group; two-cell rows add further versions to the current group.
pub struct LinksysGplSpider {
    config: SpiderConfig,
    whitelist: Option<Vec<String>>,
    rows: Selector,
    cells: Selector,
    links: Selector,
}

impl LinksysGplSpider {
    pub fn new() -> ScraperResult<Self> {
        Ok(Self {
            config: Self::default_config(),
            whitelist: Some(vec!["EA7500".to_string()]),
            rows: selector("table > thead > tr")?,
            cells: selector("td")?,
            links: selector("a[href]")?,
        })
    }

    pub fn default_config() -> SpiderConfig {
        SpiderConfig::default()
            .with_handle_http_status(vec![404])
            .with_retry(RetryConfig::firmware_defaults())
    }

    /// Restrict to devices whose name contains one of `whitelist`; `None`
    /// keeps every row.
    pub fn with_whitelist(mut self, whitelist: Option<Vec<String>>) -> Self {
        self.whitelist = whitelist;
        self
    }

    pub fn extract_rows(&self, document: &Html) -> Vec<GplRow> {
        let mut rows = Vec::new();
        let mut devices: Vec<String> = Vec::new();

        // the first header row holds the column titles
        for row in document.select(&self.rows).skip(1) {
            let cells: Vec<_> = row.select(&self.cells).collect();
            let offset = match cells.len() {
                3 => {
                    devices = text_nodes(cells[0]);
                    1
                }
                2 => 0,
                other => {
                    debug!("Skipping GPL row with {} cells", other);
                    continue;
                }
            };

            let version = cells[offset].text().collect::<String>().trim().to_string();
            let link = cells[offset + 1]
                .select(&self.links)
                .filter_map(|a| a.value().attr("href"))
                .collect::<String>()
                .trim()
                .to_string();

            rows.extend(devices.iter().map(|device| GplRow {
                device: device.clone(),
                version: version.clone(),
                link: link.clone(),
            }));
        }
        rows
    }

    pub fn is_whitelisted(&self, device: &str) -> bool {
        match &self.whitelist {
            Some(allowed) => allowed.iter().any(|name| device.contains(name.as_str())),
            None => true,
        }
    }

    pub fn prepare_record(&self, row: &GplRow, page_url: &Url) -> Option<FirmwareRecord> {
        let file_url = match page_url.join(&row.link) {
            Ok(url) if !row.link.is_empty() => Some(url),
            _ => {
                debug!("No usable GPL link for {} {}", row.device, row.version);
                None
            }
        };

        FirmwareMeta {
            vendor: VENDOR.to_string(),
            device_name: Some(row.device.clone()),
            firmware_version: Some(row.version.clone()).filter(|v| !v.is_empty()),
            file_urls: file_url.map(|url| vec![url]),
            ..Default::default()
        }
        .into_record()
    }

    fn handle(&self, response: SpiderResponse, url: Url) -> ScraperResult<ParseResult> {
        if let SpiderCallback::Custom(ref name) = response.callback {
            error!("Unhandled custom callback: {}", name);
            return Ok(ParseResult::Skip);
        }

        let document = Html::parse_document(&response.response.decoded_body);
        let items: Vec<_> = self
            .extract_rows(&document)
            .iter()
            .filter(|row| self.is_whitelisted(&row.device))
            .filter_map(|row| self.prepare_record(row, &url))
            .collect();
        info!("Found {} GPL archives on {}", items.len(), url);

        Ok(ParseResult::Yield {
            items,
            requests: Vec::new(),
        })
    }
}

#[async_trait]
impl Spider for LinksysGplSpider {
    fn name(&self) -> String {
        "linksys_gpl".to_string()
    }

    fn start_urls(&self) -> Vec<Url> {
        Url::parse(START_URL).into_iter().collect()
    }

    fn allowed_domains(&self) -> Option<Vec<String>> {
        Some(vec![
            "www.linksys.com".to_string(),
            "downloads.linksys.com".to_string(),
        ])
    }

    fn config(&self) -> &SpiderConfig {
        &self.config
    }

    fn set_config(&mut self, config: SpiderConfig) {
        self.config = config;
    }

    async fn parse(
        &self,
        spider_response: SpiderResponse,
        url: Url,
        _depth: usize,
    ) -> ScraperResult<ParseResult> {
        self.handle(spider_response, url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"<html><body><table><thead>
<tr><td>Model</td><td>Version</td><td>Download</td></tr>
<tr><td>EA7500<br>EA7500v2</td><td> 1.1.0 </td><td><a href="https://downloads.linksys.com/gpl/EA7500_v1.1.0.tgz">GPL</a></td></tr>
<tr><td>1.2.0</td><td><a href="https://downloads.linksys.com/gpl/EA7500_v1.2.0.tgz">GPL</a></td></tr>
<tr><td>WRT3200ACM</td><td>2.0</td><td><a href="/gpl/WRT3200ACM.tgz">GPL</a></td></tr>
<tr><td>only one cell</td></tr>
</thead></table></body></html>"#;

    fn page_url() -> Url {
        Url::parse(START_URL).unwrap()
    }

    #[test]
    fn test_rows_expand_device_groups() {
        let spider = LinksysGplSpider::new().unwrap();
        let rows = spider.extract_rows(&Html::parse_document(TABLE));

        assert_eq!(rows.len(), 5);
        assert_eq!(
            rows[0],
            GplRow {
                device: "EA7500".to_string(),
                version: "1.1.0".to_string(),
                link: "https://downloads.linksys.com/gpl/EA7500_v1.1.0.tgz".to_string(),
            }
        );
        assert_eq!(rows[1].device, "EA7500v2");
        assert_eq!(rows[2].device, "EA7500");
        assert_eq!(rows[2].version, "1.2.0");
        assert_eq!(rows[4].device, "WRT3200ACM");
    }

    #[test]
    fn test_whitelist_filters_devices() {
        let spider = LinksysGplSpider::new().unwrap();
        assert!(spider.is_whitelisted("EA7500v2"));
        assert!(!spider.is_whitelisted("WRT3200ACM"));

        let open = LinksysGplSpider::new().unwrap().with_whitelist(None);
        assert!(open.is_whitelisted("WRT3200ACM"));
    }

    #[test]
    fn test_relative_links_are_resolved() {
        let spider = LinksysGplSpider::new().unwrap();
        let row = GplRow {
            device: "WRT3200ACM".to_string(),
            version: "2.0".to_string(),
            link: "/gpl/WRT3200ACM.tgz".to_string(),
        };

        let record = spider.prepare_record(&row, &page_url()).unwrap();
        assert_eq!(
            record.file_urls()[0].as_str(),
            "https://www.linksys.com/gpl/WRT3200ACM.tgz"
        );
        assert_eq!(record.device_class(), None);
        assert_eq!(record.release_date(), None);
    }

    #[test]
    fn test_row_without_link_has_no_record() {
        let spider = LinksysGplSpider::new().unwrap();
        let row = GplRow {
            device: "EA7500".to_string(),
            version: "1.0".to_string(),
            link: String::new(),
        };
        assert!(spider.prepare_record(&row, &page_url()).is_none());
    }
}
