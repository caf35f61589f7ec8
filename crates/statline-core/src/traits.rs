use std::future::Future;

use crate::document::Document;
use crate::error::{AppError, RetrievalError};
use crate::models::{Envelope, Feed, HeaderProfile, Provider, RunContext};

/// Fetches a rendered page and waits until it is ready to be parsed.
///
/// Implementations are configured with a timeout at construction. The
/// navigation context must be released on every exit path, and a timeout must
/// never yield a partially populated document.
pub trait DocumentRetriever: Send + Sync + Clone {
    fn retrieve(
        &self,
        url: &str,
        headers: &HeaderProfile,
        ready_selector: &str,
    ) -> impl Future<Output = Result<Document, RetrievalError>> + Send;
}

/// Result of one matchup discovery pass.
#[derive(Debug)]
pub struct MatchupScrape<U> {
    pub units: Vec<U>,
    /// Units intentionally excluded (e.g. exhibition games).
    pub skipped: usize,
    /// Units that could not be parsed and were dropped.
    pub errors: usize,
    /// A hard failure; the whole pass is discarded when set.
    pub error: Option<AppError>,
}

impl<U> MatchupScrape<U> {
    pub fn new(units: Vec<U>) -> Self {
        Self {
            units,
            skipped: 0,
            errors: 0,
            error: None,
        }
    }

    pub fn failed(error: impl Into<AppError>) -> Self {
        Self {
            units: Vec::new(),
            skipped: 0,
            errors: 0,
            error: Some(error.into()),
        }
    }
}

/// Discovers the units of work for one time window with a single fetch.
pub trait MatchupScraper: Send + Sync {
    type Unit: Send + 'static;

    fn feed(&self) -> Feed;

    fn provider(&self) -> Provider;

    fn scrape(&self) -> impl Future<Output = MatchupScrape<Self::Unit>> + Send;
}

/// Fetches and parses one unit of work into typed records.
pub trait EventDataScraper: Send + Sync + 'static {
    type Unit: Send + Sync + 'static;
    type Record: Send + 'static;

    fn feed(&self) -> Feed;

    fn provider(&self) -> Provider;

    /// Builds the unit's attribution context. Must be pure: no clock reads,
    /// no I/O, same output for the same unit.
    fn construct_context(&self, unit: &Self::Unit) -> RunContext;

    /// Performs one fetch + parse. Failures are returned inside the envelope.
    fn scrape(&self, unit: &Self::Unit) -> impl Future<Output = Envelope<Self::Record>> + Send;
}
