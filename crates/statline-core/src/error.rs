use std::time::Duration;

use thiserror::Error;

use crate::models::RunContext;

/// Failures reported by a [`DocumentRetriever`](crate::traits::DocumentRetriever).
///
/// None of these are retried by the retriever itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetrievalError {
    /// The readiness selector never appeared within the timeout.
    #[error("Timed out after {}s waiting for {url}", .after.as_secs_f32())]
    Timeout { url: String, after: Duration },

    /// Network, DNS, or HTTP failure while navigating.
    #[error("Navigation to {url} failed: {message}")]
    NavigationFailed { url: String, message: String },

    /// The page loaded but the readiness selector is absent.
    #[error("Page {url} loaded without ready selector '{selector}'")]
    EmptyDocument { url: String, selector: String },
}

impl RetrievalError {
    pub fn url(&self) -> &str {
        match self {
            RetrievalError::Timeout { url, .. }
            | RetrievalError::NavigationFailed { url, .. }
            | RetrievalError::EmptyDocument { url, .. } => url,
        }
    }
}

/// A scraped table header no longer matches the layout its parser expects.
///
/// `index` is the first diverging column. An empty `expected` means the page
/// has an extra trailing column; an empty `actual` means a column is missing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "Schema drift in '{table}' at column {index} ({url} {selector}): expected {expected:?}, found {actual:?}"
)]
pub struct SchemaDriftError {
    pub table: String,
    pub index: usize,
    pub expected: String,
    pub actual: String,
    pub url: String,
    pub selector: String,
}

/// A scraped cell could not be coerced to its declared type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cannot convert field '{field}' from {raw:?}: {message}")]
pub struct FieldConversionError {
    pub field: String,
    pub raw: String,
    pub message: String,
}

/// Application-wide error types for statline.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    SchemaDrift(#[from] SchemaDriftError),

    #[error(transparent)]
    FieldConversion(#[from] FieldConversionError),

    /// An element the parser relies on is not in the document.
    #[error("Missing element '{selector}' in {url}")]
    MissingElement { url: String, selector: String },

    /// A CSS selector failed to parse.
    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The run was cancelled before this unit finished.
    #[error("Cancelled before completion")]
    Cancelled,

    /// The scraper panicked while processing a unit.
    #[error("Scraper panicked: {0}")]
    WorkerPanic(String),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if resubmitting the same unit could plausibly succeed.
    ///
    /// Schema drift and conversion failures are deterministic for a given page,
    /// so they are never retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Retrieval(RetrievalError::Timeout { .. })
            | AppError::Retrieval(RetrievalError::NavigationFailed { .. })
            | AppError::Cancelled => true,
            _ => false,
        }
    }
}

/// The aggregated outcome of an event-data run that had at least one failing unit.
///
/// Carries the first error observed (in result arrival order) together with the
/// context of the unit that produced it.
#[derive(Error, Debug)]
#[error("{failed} of {total} units failed; first failure at {}: {source}", .context.url)]
pub struct RunError {
    pub total: usize,
    pub failed: usize,
    pub context: RunContext,
    #[source]
    pub source: AppError,
}
