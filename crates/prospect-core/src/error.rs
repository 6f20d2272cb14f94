use thiserror::Error;

/// Application-wide error types for Prospect.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed (search page, lead website, verifier).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Quality scorer (LLM) call failed.
    #[error("Scorer error (HTTP {status_code}): {message}")]
    ScorerError {
        message: String,
        status_code: u16,
        retryable: bool,
    },

    /// Email verifier call failed or returned an unusable body.
    #[error("Verifier error: {0}")]
    VerifierError(String),

    /// A page or API body could not be parsed into the expected shape.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A lead website or endpoint could not be turned into an absolute http(s) URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The scan request itself is unusable (empty query, zero limit).
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// CSV export failed.
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}
