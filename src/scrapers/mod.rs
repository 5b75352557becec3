pub mod http_scraper;
pub mod mock_scraper;
#[cfg(feature = "render")]
pub mod render_scraper;

mod release;
mod scraper;
pub use http_scraper::HttpScraper;
pub use mock_scraper::{MockResponse, MockScraper};
#[cfg(feature = "render")]
pub use render_scraper::RenderScraper;
pub use scraper::Scraper;
