use crate::storage::base::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Extraction error: {0}")]
    ExtractionError(String),

    #[error("Malformed release date {value:?}: {source}")]
    MalformedDate {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Render error: {0}")]
    RenderError(String),

    #[error("Download error for {url}: {reason}")]
    DownloadError { url: String, reason: String },

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
}

pub type ScraperResult<T> = Result<T, ScraperError>;

impl ScraperError {
    /// The request never produced a response: refused connection or timeout.
    pub fn is_transport(&self) -> bool {
        match self {
            ScraperError::HttpError(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}
