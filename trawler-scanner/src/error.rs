use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid seed URL: {0}")]
    Validation(String),

    #[error("Fetching {url} returned HTTP {status}")]
    Fetch { url: String, status: u16 },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Parse error for {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error("Could not resolve link '{href}': {reason}")]
    LinkResolution { href: String, reason: String },

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("Other error: {0}")]
    Other(String),
}

impl ScanError {
    /// Errors that abort a whole crawl rather than a single page.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScanError::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
