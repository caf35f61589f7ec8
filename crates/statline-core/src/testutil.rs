//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};

use crate::document::Document;
use crate::error::{AppError, RetrievalError};
use crate::models::{Envelope, Feed, HeaderProfile, Matchup, Provider, RunContext};
use crate::runner::{RunReporter, RunnerEvent};
use crate::traits::{DocumentRetriever, EventDataScraper, MatchupScrape, MatchupScraper};

/// A matchup with a predictable URL, for tests.
pub fn matchup(event_id: &str) -> Matchup {
    Matchup {
        event_id: event_id.to_string(),
        home_team: "BOS".to_string(),
        away_team: "DAL".to_string(),
        url: format!("https://example.com/boxscores/{event_id}.html"),
        starts_at: Utc
            .with_ymd_and_hms(2024, 1, 10, 0, 0, 0)
            .single()
            .unwrap_or_default(),
    }
}

// ---------------------------------------------------------------------------
// MockRetriever
// ---------------------------------------------------------------------------

/// Mock retriever that returns configurable responses.
#[derive(Clone)]
pub struct MockRetriever {
    /// Queue of responses. Each call pops the first element.
    /// If empty, returns a default document.
    responses: Arc<Mutex<Vec<Result<String, RetrievalError>>>>,
    /// Every `(url, ready_selector)` requested, in call order.
    pub requests: Arc<Mutex<Vec<(String, String)>>>,
    /// User agent seen on the last request.
    pub last_user_agent: Arc<Mutex<Option<String>>>,
}

impl MockRetriever {
    pub fn new(html: &str) -> Self {
        Self::with_responses(vec![Ok(html.to_string())])
    }

    pub fn with_error(error: RetrievalError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<String, RetrievalError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requests: Arc::new(Mutex::new(Vec::new())),
            last_user_agent: Arc::new(Mutex::new(None)),
        }
    }
}

impl DocumentRetriever for MockRetriever {
    async fn retrieve(
        &self,
        url: &str,
        headers: &HeaderProfile,
        ready_selector: &str,
    ) -> Result<Document, RetrievalError> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), ready_selector.to_string()));
        *self.last_user_agent.lock().unwrap() = headers.user_agent().map(str::to_string);

        let next = {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok("<html><body>default</body></html>".to_string())
            } else {
                responses.remove(0)
            }
        };
        next.map(|html| Document::new(url, html))
    }
}

// ---------------------------------------------------------------------------
// MockMatchupScraper
// ---------------------------------------------------------------------------

/// Mock matchup scraper returning the same units on every call.
#[derive(Clone)]
pub struct MockMatchupScraper {
    units: Vec<Matchup>,
    skipped: usize,
    errors: usize,
    error: Arc<Mutex<Option<AppError>>>,
    pub calls: Arc<AtomicUsize>,
}

impl MockMatchupScraper {
    pub fn new(units: Vec<Matchup>) -> Self {
        Self {
            units,
            skipped: 0,
            errors: 0,
            error: Arc::new(Mutex::new(None)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_counts(mut self, skipped: usize, errors: usize) -> Self {
        self.skipped = skipped;
        self.errors = errors;
        self
    }

    /// The next scrape reports a hard error.
    pub fn with_error(self, error: AppError) -> Self {
        *self.error.lock().unwrap() = Some(error);
        self
    }
}

impl MatchupScraper for MockMatchupScraper {
    type Unit = Matchup;

    fn feed(&self) -> Feed {
        Feed::Schedule
    }

    fn provider(&self) -> Provider {
        Provider::BasketballReference
    }

    async fn scrape(&self) -> MatchupScrape<Matchup> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        MatchupScrape {
            units: self.units.clone(),
            skipped: self.skipped,
            errors: self.errors,
            error: self.error.lock().unwrap().take(),
        }
    }
}

// ---------------------------------------------------------------------------
// MockEventScraper
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehaviour {
    Records(usize),
    Fail,
    Panic,
}

/// A unit of work for [`MockEventScraper`].
#[derive(Debug, Clone)]
pub struct MockUnit {
    pub id: String,
    pub behaviour: MockBehaviour,
    pub delay: Duration,
}

impl MockUnit {
    pub fn ok(id: &str, records: usize) -> Self {
        Self {
            id: id.to_string(),
            behaviour: MockBehaviour::Records(records),
            delay: Duration::ZERO,
        }
    }

    pub fn failing(id: &str) -> Self {
        Self {
            behaviour: MockBehaviour::Fail,
            ..Self::ok(id, 0)
        }
    }

    pub fn panicking(id: &str) -> Self {
        Self {
            behaviour: MockBehaviour::Panic,
            ..Self::ok(id, 0)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Mock event-data scraper. Each unit yields `(unit_id, index)` records.
#[derive(Clone, Default)]
pub struct MockEventScraper {
    /// Unit ids in the order scraping began.
    pub started: Arc<Mutex<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    /// Highest number of units scraped at once.
    pub peak_in_flight: Arc<AtomicUsize>,
}

impl MockEventScraper {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventDataScraper for MockEventScraper {
    type Unit = MockUnit;
    type Record = (String, usize);

    fn feed(&self) -> Feed {
        Feed::PlayerBoxScore
    }

    fn provider(&self) -> Provider {
        Provider::BasketballReference
    }

    fn construct_context(&self, unit: &MockUnit) -> RunContext {
        RunContext {
            event_id: unit.id.clone(),
            home_team: "HOME".to_string(),
            away_team: "AWAY".to_string(),
            url: format!("https://example.com/events/{}", unit.id),
            pulled_at: None,
        }
    }

    async fn scrape(&self, unit: &MockUnit) -> Envelope<(String, usize)> {
        let context = self.construct_context(unit).pulled_now();
        self.started.lock().unwrap().push(unit.id.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if !unit.delay.is_zero() {
            tokio::time::sleep(unit.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match unit.behaviour {
            MockBehaviour::Records(n) => {
                Envelope::records(context, (0..n).map(|i| (unit.id.clone(), i)).collect())
            }
            MockBehaviour::Fail => {
                Envelope::failed(context, AppError::Generic(format!("{} failed", unit.id)))
            }
            MockBehaviour::Panic => panic!("boom in {}", unit.id),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Reporter that records the kind of every event it receives.
#[derive(Clone, Default)]
pub struct RecordingReporter {
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingReporter {
    pub fn kinds(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl RunReporter for RecordingReporter {
    fn report(&self, event: RunnerEvent<'_>) {
        let kind = match event {
            RunnerEvent::MatchupsStarted { .. } => "matchups_started",
            RunnerEvent::MatchupsScraped { .. } => "matchups_scraped",
            RunnerEvent::MatchupsFailed { .. } => "matchups_failed",
            RunnerEvent::RunStarted { .. } => "run_started",
            RunnerEvent::UnitStarted { .. } => "unit_started",
            RunnerEvent::UnitCompleted { .. } => "unit_completed",
            RunnerEvent::UnitFailed { .. } => "unit_failed",
            RunnerEvent::DeadlineExceeded { .. } => "deadline_exceeded",
            RunnerEvent::RunFinished { .. } => "run_finished",
        };
        self.events.lock().unwrap().push(kind.to_string());
    }
}
