//! Error types for rendering and scraping.

use thiserror::Error;

pub type RenderResult<T> = std::result::Result<T, RenderError>;

/// Failures surfaced by a rendering engine.
///
/// `Timeout` is kept distinct from every other navigation fault because the
/// scrapers treat it as recoverable: they carry on with whatever DOM state
/// the page reached.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("navigation to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("page query failed: {0}")]
    Query(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("renderer unavailable: {0}")]
    Unavailable(String),
}

impl RenderError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RenderError::Timeout { .. })
    }
}

impl From<reqwest::Error> for RenderError {
    fn from(err: reqwest::Error) -> Self {
        RenderError::Http(err.to_string())
    }
}

/// Failure of a whole scraper or enrichment task.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("invalid search parameters: {0}")]
    InvalidParams(String),
}
