use thiserror::Error;

/// Errors raised while fetching, rendering or extracting pages.
///
/// Most of these are recovered inside a batch and only show up in the logs.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The rendering runtime (WebDriver) could not be started or reached
    #[error("render session unavailable: {0}")]
    RenderInit(String),

    /// A page did not finish loading in time
    #[error("navigation to {url} timed out after {timeout_ms}ms")]
    NavigationTimeout { url: String, timeout_ms: u64 },

    /// The browser reported an error while navigating or reading the page
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// Non-success HTTP status from the fallback fetcher
    #[error("HTTP {status} fetching {url}")]
    Http { url: String, status: u16 },

    /// Transport level HTTP failure
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// An operation needed the current page but nothing has been loaded
    #[error("no page loaded in session")]
    NoPageLoaded,

    /// The document does not look like a venue profile
    #[error("profile not found in document")]
    ProfileNotFound,

    /// None of the whole-catalog candidate URLs produced listings
    #[error("no catalog URL yielded listings (tried {tried})")]
    CatalogExhausted { tried: usize },

    /// The invocation parameters are out of range
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Errors reported by a result sink for one sub-batch.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sink serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sink rejected records: {reason}")]
    Rejected { reason: String },
}

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
