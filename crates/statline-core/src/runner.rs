//! The two-stage pipeline: matchup discovery, then concurrent event-data scraping.
//!
//! ```text
//! MatchupRunner(MatchupScraper) -> [unit..] -> EventDataRunner(EventDataScraper) -> [record..]
//! ```
//!
//! The event-data runner is a bounded worker pool. Units are pushed onto a
//! work queue sized to the worker count (the submitter waits when it is full),
//! each worker turns one unit into one [`Envelope`], and envelopes are drained
//! in arrival order once every worker has exited.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::RunnerConfig;
use crate::error::{AppError, RunError};
use crate::models::{Envelope, Feed, Provider};
use crate::traits::{EventDataScraper, MatchupScrape, MatchupScraper};

/// Events emitted by the runners for monitoring/logging.
#[derive(Debug, Clone)]
pub enum RunnerEvent<'a> {
    MatchupsStarted {
        runner: &'a str,
        feed: Feed,
        provider: Provider,
    },
    MatchupsScraped {
        runner: &'a str,
        feed: Feed,
        provider: Provider,
        units: usize,
        skipped: usize,
        errors: usize,
        elapsed: Duration,
    },
    MatchupsFailed {
        runner: &'a str,
        feed: Feed,
        provider: Provider,
        error: &'a AppError,
        elapsed: Duration,
    },
    RunStarted {
        runner: &'a str,
        run_id: Uuid,
        feed: Feed,
        provider: Provider,
        units: usize,
        workers: usize,
    },
    UnitStarted {
        worker: usize,
        url: &'a str,
    },
    UnitCompleted {
        worker: usize,
        url: &'a str,
        records: usize,
        elapsed: Duration,
    },
    UnitFailed {
        worker: usize,
        url: &'a str,
        error: &'a AppError,
        elapsed: Duration,
    },
    DeadlineExceeded {
        runner: &'a str,
        run_id: Uuid,
        after: Duration,
    },
    RunFinished {
        runner: &'a str,
        run_id: Uuid,
        records: usize,
        failed: usize,
        elapsed: Duration,
    },
}

/// Trait for receiving runner events (decoupled logging).
pub trait RunReporter: Send + Sync {
    fn report(&self, event: RunnerEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRunReporter;

impl RunReporter for TracingRunReporter {
    fn report(&self, event: RunnerEvent<'_>) {
        match event {
            RunnerEvent::MatchupsStarted {
                runner,
                feed,
                provider,
            } => {
                tracing::info!(%runner, %feed, %provider, "Discovering matchups");
            }
            RunnerEvent::MatchupsScraped {
                runner,
                feed,
                provider,
                units,
                skipped,
                errors,
                elapsed,
            } => {
                if skipped > 0 || errors > 0 {
                    tracing::warn!(%runner, %feed, %provider, %skipped, %errors, "Matchups skipped or dropped");
                }
                tracing::info!(%runner, %feed, %provider, %units, ?elapsed, "Matchups discovered");
            }
            RunnerEvent::MatchupsFailed {
                runner,
                feed,
                provider,
                error,
                elapsed,
            } => {
                tracing::error!(%runner, %feed, %provider, %error, ?elapsed, "Matchup discovery failed");
            }
            RunnerEvent::RunStarted {
                runner,
                run_id,
                feed,
                provider,
                units,
                workers,
            } => {
                tracing::info!(%runner, %run_id, %feed, %provider, %units, %workers, "Run started");
            }
            RunnerEvent::UnitStarted { worker, url } => {
                tracing::debug!(%worker, %url, "Scraping unit");
            }
            RunnerEvent::UnitCompleted {
                worker,
                url,
                records,
                elapsed,
            } => {
                tracing::info!(%worker, %url, %records, ?elapsed, "Unit completed");
            }
            RunnerEvent::UnitFailed {
                worker,
                url,
                error,
                elapsed,
            } => {
                tracing::warn!(%worker, %url, %error, ?elapsed, "Unit failed");
            }
            RunnerEvent::DeadlineExceeded {
                runner,
                run_id,
                after,
            } => {
                tracing::warn!(%runner, %run_id, ?after, "Run deadline exceeded, cancelling");
            }
            RunnerEvent::RunFinished {
                runner,
                run_id,
                records,
                failed,
                elapsed,
            } => {
                if failed > 0 {
                    tracing::warn!(%runner, %run_id, %records, %failed, ?elapsed, "Run finished with failures");
                } else {
                    tracing::info!(%runner, %run_id, %records, ?elapsed, "Run finished");
                }
            }
        }
    }
}

/// Runs a matchup scraper exactly once.
pub struct MatchupRunner<M: MatchupScraper> {
    scraper: M,
    config: RunnerConfig,
    reporter: Arc<dyn RunReporter>,
}

impl<M: MatchupScraper> MatchupRunner<M> {
    pub fn new(scraper: M, config: RunnerConfig) -> Self {
        Self {
            scraper,
            config,
            reporter: Arc::new(TracingRunReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: impl RunReporter + 'static) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    /// Scrapes once and returns the units in scraper order.
    ///
    /// Skip and error counts are only reported; the run fails only when the
    /// scraper sets a hard error.
    pub async fn run(&self) -> Result<Vec<M::Unit>, AppError> {
        let runner = self.config.name.as_str();
        let feed = self.scraper.feed();
        let provider = self.scraper.provider();

        self.reporter.report(RunnerEvent::MatchupsStarted {
            runner,
            feed,
            provider,
        });

        let started = Instant::now();
        let MatchupScrape {
            units,
            skipped,
            errors,
            error,
        } = self.scraper.scrape().await;
        let elapsed = started.elapsed();

        if let Some(error) = error {
            self.reporter.report(RunnerEvent::MatchupsFailed {
                runner,
                feed,
                provider,
                error: &error,
                elapsed,
            });
            return Err(error);
        }

        self.reporter.report(RunnerEvent::MatchupsScraped {
            runner,
            feed,
            provider,
            units: units.len(),
            skipped,
            errors,
            elapsed,
        });

        Ok(units)
    }
}

/// Records collected by an event-data run, plus the first failure if any.
///
/// Records from failing units are absent; everything else is kept.
#[derive(Debug)]
pub struct RunOutcome<R> {
    pub records: Vec<R>,
    pub total: usize,
    pub failed: usize,
    pub error: Option<RunError>,
}

impl<R> RunOutcome<R> {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Discards partial results when any unit failed.
    pub fn into_result(self) -> Result<Vec<R>, RunError> {
        match self.error {
            None => Ok(self.records),
            Some(error) => Err(error),
        }
    }
}

/// Fans units out over a bounded worker pool and fans records back in.
pub struct EventDataRunner<S: EventDataScraper> {
    scraper: Arc<S>,
    config: RunnerConfig,
    reporter: Arc<dyn RunReporter>,
}

impl<S: EventDataScraper> EventDataRunner<S> {
    pub fn new(scraper: S, config: RunnerConfig) -> Self {
        Self {
            scraper: Arc::new(scraper),
            config,
            reporter: Arc::new(TracingRunReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: impl RunReporter + 'static) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    pub async fn run(&self, units: Vec<S::Unit>) -> RunOutcome<S::Record> {
        self.run_until(units, CancellationToken::new()).await
    }

    /// Like [`run`](Self::run), but stops early once `cancel` fires.
    ///
    /// Units still in flight or not yet started resolve to
    /// [`AppError::Cancelled`] envelopes, so every unit is accounted for.
    /// In-flight scrape futures are dropped, not awaited, so scrapers must
    /// release what they hold (tabs, sessions) from `Drop`.
    pub async fn run_until(
        &self,
        units: Vec<S::Unit>,
        cancel: CancellationToken,
    ) -> RunOutcome<S::Record> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("event_data_run", runner = %self.config.name, %run_id);
        self.execute(units, cancel.child_token(), run_id)
            .instrument(span)
            .await
    }

    async fn execute(
        &self,
        units: Vec<S::Unit>,
        cancel: CancellationToken,
        run_id: Uuid,
    ) -> RunOutcome<S::Record> {
        let runner = self.config.name.as_str();
        let total = units.len();
        let workers = self.config.worker_count();
        let started = Instant::now();

        self.reporter.report(RunnerEvent::RunStarted {
            runner,
            run_id,
            feed: self.scraper.feed(),
            provider: self.scraper.provider(),
            units: total,
            workers,
        });

        let deadline = self.config.run_timeout.map(|after| {
            let cancel = cancel.clone();
            let reporter = Arc::clone(&self.reporter);
            let runner = self.config.name.clone();
            tokio::spawn(async move {
                tokio::time::sleep(after).await;
                reporter.report(RunnerEvent::DeadlineExceeded {
                    runner: &runner,
                    run_id,
                    after,
                });
                cancel.cancel();
            })
        });

        let (work_tx, work_rx) = mpsc::channel::<S::Unit>(workers);
        let work_rx = Arc::new(Mutex::new(work_rx));
        let (result_tx, mut result_rx) = mpsc::channel::<Envelope<S::Record>>(total.max(1));

        let mut pool = JoinSet::new();
        for worker in 0..workers {
            let scraper = Arc::clone(&self.scraper);
            let reporter = Arc::clone(&self.reporter);
            let work_rx = Arc::clone(&work_rx);
            let result_tx = result_tx.clone();
            let cancel = cancel.clone();
            pool.spawn(
                async move {
                    loop {
                        let next = work_rx.lock().await.recv().await;
                        let Some(unit) = next else { break };
                        let envelope =
                            process_unit(scraper.as_ref(), &unit, &cancel, reporter.as_ref(), worker)
                                .await;
                        if result_tx.send(envelope).await.is_err() {
                            break;
                        }
                    }
                }
                .in_current_span(),
            );
        }
        drop(result_tx);

        // Submit, waiting whenever the queue is full.
        let mut unsubmitted = Vec::new();
        let mut pending = units.into_iter();
        for unit in pending.by_ref() {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    unsubmitted.push(unit);
                    break;
                }
                permit = work_tx.reserve() => match permit {
                    Ok(permit) => permit.send(unit),
                    Err(_) => {
                        unsubmitted.push(unit);
                        break;
                    }
                },
            }
        }
        unsubmitted.extend(pending);
        drop(work_tx);

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Runner worker aborted");
            }
        }
        if let Some(handle) = deadline {
            handle.abort();
        }

        let mut envelopes = Vec::with_capacity(total);
        while let Some(envelope) = result_rx.recv().await {
            envelopes.push(envelope);
        }
        for unit in unsubmitted {
            let error = if cancel.is_cancelled() {
                AppError::Cancelled
            } else {
                AppError::Generic("worker pool closed before unit was submitted".into())
            };
            envelopes.push(Envelope::failed(self.scraper.construct_context(&unit), error));
        }

        let outcome = collate(envelopes, total);

        self.reporter.report(RunnerEvent::RunFinished {
            runner,
            run_id,
            records: outcome.records.len(),
            failed: outcome.failed,
            elapsed: started.elapsed(),
        });

        outcome
    }
}

async fn process_unit<S: EventDataScraper>(
    scraper: &S,
    unit: &S::Unit,
    cancel: &CancellationToken,
    reporter: &dyn RunReporter,
    worker: usize,
) -> Envelope<S::Record> {
    let context = scraper.construct_context(unit);
    if cancel.is_cancelled() {
        return Envelope::failed(context, AppError::Cancelled);
    }

    reporter.report(RunnerEvent::UnitStarted {
        worker,
        url: &context.url,
    });
    let started = Instant::now();

    let envelope = tokio::select! {
        biased;
        () = cancel.cancelled() => Envelope::failed(context.clone(), AppError::Cancelled),
        outcome = AssertUnwindSafe(scraper.scrape(unit)).catch_unwind() => match outcome {
            Ok(envelope) => envelope,
            Err(payload) => Envelope::failed(
                context.clone(),
                AppError::WorkerPanic(panic_message(payload.as_ref())),
            ),
        },
    };

    let elapsed = started.elapsed();
    match envelope.error() {
        None => reporter.report(RunnerEvent::UnitCompleted {
            worker,
            url: &context.url,
            records: envelope.len(),
            elapsed,
        }),
        Some(error) => reporter.report(RunnerEvent::UnitFailed {
            worker,
            url: &context.url,
            error,
            elapsed,
        }),
    }

    envelope
}

/// Concatenates batches in arrival order and keeps the first error.
fn collate<R>(envelopes: Vec<Envelope<R>>, total: usize) -> RunOutcome<R> {
    let mut records = Vec::new();
    let mut failed = 0;
    let mut first_failure = None;

    for envelope in envelopes {
        match envelope.into_parts() {
            (_, Ok(batch)) => records.extend(batch),
            (context, Err(error)) => {
                failed += 1;
                if first_failure.is_none() {
                    first_failure = Some((context, error));
                }
            }
        }
    }

    let error = first_failure.map(|(context, source)| RunError {
        total,
        failed,
        context,
        source,
    });

    RunOutcome {
        records,
        total,
        failed,
        error,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::models::RunContext;
    use crate::testutil::*;

    fn ids(records: &[(String, usize)]) -> Vec<String> {
        records.iter().map(|(id, i)| format!("{id}{i}")).collect()
    }

    /// Asserts that each unit's records appear as one contiguous, ordered run.
    fn assert_contiguous(records: &[(String, usize)], unit: &str, count: usize) {
        let start = records
            .iter()
            .position(|(id, _)| id == unit)
            .unwrap_or_else(|| panic!("no records for {unit}"));
        for i in 0..count {
            assert_eq!(records[start + i], (unit.to_string(), i));
        }
        assert_eq!(records.iter().filter(|(id, _)| id == unit).count(), count);
    }

    #[tokio::test]
    async fn concurrency_one_preserves_submission_order() {
        let runner = EventDataRunner::new(
            MockEventScraper::new(),
            RunnerConfig::new("test").with_concurrency(1),
        );
        let units = vec![
            MockUnit::ok("a", 2).with_delay(Duration::from_millis(20)),
            MockUnit::ok("b", 3),
            MockUnit::ok("c", 1).with_delay(Duration::from_millis(5)),
        ];

        let outcome = runner.run(units).await;

        assert!(outcome.is_ok());
        assert_eq!(ids(&outcome.records), ["a0", "a1", "b0", "b1", "b2", "c0"]);
    }

    #[tokio::test]
    async fn concurrency_two_keeps_each_batch_contiguous() {
        let runner = EventDataRunner::new(
            MockEventScraper::new(),
            RunnerConfig::new("test").with_concurrency(2),
        );
        let units = vec![
            MockUnit::ok("a", 3).with_delay(Duration::from_millis(50)),
            MockUnit::ok("b", 2),
        ];

        let outcome = runner.run(units).await;

        assert!(outcome.is_ok());
        assert_eq!(outcome.records.len(), 5);
        assert_contiguous(&outcome.records, "a", 3);
        assert_contiguous(&outcome.records, "b", 2);
        // The fast unit arrives first.
        assert_eq!(outcome.records[0].0, "b");
    }

    #[tokio::test]
    async fn one_failing_unit_keeps_other_records() {
        let runner = EventDataRunner::new(
            MockEventScraper::new(),
            RunnerConfig::new("test").with_concurrency(3),
        );
        let units = vec![
            MockUnit::ok("a", 2),
            MockUnit::failing("b"),
            MockUnit::ok("c", 1),
        ];

        let outcome = runner.run(units).await;

        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.total, 3);
        assert_eq!(outcome.failed, 1);
        let error = outcome.error.expect("run error");
        assert_eq!(error.context.url, "https://example.com/events/b");
        assert_eq!(error.context.event_id, "b");
        assert!(matches!(error.source, AppError::Generic(_)));
    }

    #[tokio::test]
    async fn first_error_follows_arrival_order() {
        let runner = EventDataRunner::new(
            MockEventScraper::new(),
            RunnerConfig::new("test").with_concurrency(1),
        );
        let units = vec![
            MockUnit::ok("a", 1),
            MockUnit::failing("b"),
            MockUnit::ok("c", 1),
            MockUnit::failing("d"),
        ];

        let outcome = runner.run(units).await;

        assert_eq!(ids(&outcome.records), ["a0", "c0"]);
        assert_eq!(outcome.failed, 2);
        let error = outcome.error.unwrap();
        assert_eq!(error.context.event_id, "b");
        assert_eq!(error.failed, 2);
        assert_eq!(error.total, 4);
    }

    #[tokio::test]
    async fn into_result_discards_partial_records_on_failure() {
        let runner = EventDataRunner::new(MockEventScraper::new(), RunnerConfig::new("test"));
        let err = runner
            .run(vec![MockUnit::ok("a", 1), MockUnit::failing("b")])
            .await
            .into_result()
            .unwrap_err();
        assert_eq!(err.failed, 1);
    }

    #[tokio::test]
    async fn zero_concurrency_uses_available_parallelism() {
        let runner = EventDataRunner::new(
            MockEventScraper::new(),
            RunnerConfig::new("test").with_concurrency(0),
        );
        let units = (0..6).map(|i| MockUnit::ok(&format!("u{i}"), 1)).collect();

        let outcome = runner.run(units).await;

        assert!(outcome.is_ok());
        assert_eq!(outcome.records.len(), 6);
    }

    #[tokio::test]
    async fn empty_input_produces_empty_outcome() {
        let runner = EventDataRunner::new(MockEventScraper::new(), RunnerConfig::new("test"));
        let outcome = runner.run(Vec::new()).await;
        assert!(outcome.is_ok());
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.total, 0);
    }

    #[tokio::test]
    async fn worker_pool_is_bounded() {
        let scraper = MockEventScraper::new();
        let peak = Arc::clone(&scraper.peak_in_flight);
        let runner = EventDataRunner::new(scraper, RunnerConfig::new("test").with_concurrency(3));
        let units = (0..9)
            .map(|i| MockUnit::ok(&format!("u{i}"), 1).with_delay(Duration::from_millis(15)))
            .collect();

        let outcome = runner.run(units).await;

        assert_eq!(outcome.records.len(), 9);
        let peak = peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak in-flight was {peak}");
        assert!(peak >= 2, "expected units to overlap, peak was {peak}");
    }

    #[tokio::test]
    async fn panicking_scraper_fails_only_its_unit() {
        let runner = EventDataRunner::new(
            MockEventScraper::new(),
            RunnerConfig::new("test").with_concurrency(1),
        );
        let units = vec![
            MockUnit::ok("a", 1),
            MockUnit::panicking("b"),
            MockUnit::ok("c", 2),
        ];

        let outcome = runner.run(units).await;

        assert_eq!(ids(&outcome.records), ["a0", "c0", "c1"]);
        let error = outcome.error.unwrap();
        assert_eq!(error.context.event_id, "b");
        match error.source {
            AppError::WorkerPanic(msg) => assert!(msg.contains("boom")),
            other => panic!("expected WorkerPanic, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn pre_cancelled_run_accounts_for_every_unit() {
        let scraper = MockEventScraper::new();
        let started = Arc::clone(&scraper.started);
        let runner = EventDataRunner::new(scraper, RunnerConfig::new("test").with_concurrency(2));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = runner
            .run_until(
                vec![MockUnit::ok("a", 1), MockUnit::ok("b", 1), MockUnit::ok("c", 1)],
                cancel,
            )
            .await;

        assert!(outcome.records.is_empty());
        assert_eq!(outcome.failed, 3);
        assert!(matches!(outcome.error.unwrap().source, AppError::Cancelled));
        assert!(started.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn run_timeout_cancels_remaining_work() {
        let runner = EventDataRunner::new(
            MockEventScraper::new(),
            RunnerConfig::new("test")
                .with_concurrency(2)
                .with_run_timeout(Duration::from_millis(50)),
        );
        let units = vec![
            MockUnit::ok("fast", 1),
            MockUnit::ok("slow1", 1).with_delay(Duration::from_secs(60)),
            MockUnit::ok("slow2", 1).with_delay(Duration::from_secs(60)),
            MockUnit::ok("slow3", 1).with_delay(Duration::from_secs(60)),
        ];

        let outcome = runner.run(units).await;

        assert_eq!(ids(&outcome.records), ["fast0"]);
        assert_eq!(outcome.failed, 3);
        assert!(matches!(outcome.error.unwrap().source, AppError::Cancelled));
    }

    /// Sets its flag when dropped, the way a tab guard closes its page.
    struct Release(Arc<AtomicBool>);

    impl Drop for Release {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    /// Holds a [`Release`] guard across a long render.
    #[derive(Default)]
    struct GuardedScraper {
        released: Arc<AtomicBool>,
    }

    impl EventDataScraper for GuardedScraper {
        type Unit = String;
        type Record = String;

        fn feed(&self) -> Feed {
            Feed::PlayerBoxScore
        }

        fn provider(&self) -> Provider {
            Provider::BasketballReference
        }

        fn construct_context(&self, unit: &String) -> RunContext {
            RunContext {
                event_id: unit.clone(),
                home_team: "BOS".into(),
                away_team: "DAL".into(),
                url: format!("https://example.com/events/{unit}"),
                pulled_at: None,
            }
        }

        async fn scrape(&self, unit: &String) -> Envelope<String> {
            let _tab = Release(Arc::clone(&self.released));
            tokio::time::sleep(Duration::from_secs(10)).await;
            Envelope::records(self.construct_context(unit), vec![unit.clone()])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_scrape_releases_held_resources() {
        let scraper = GuardedScraper::default();
        let released = Arc::clone(&scraper.released);
        let runner = EventDataRunner::new(
            scraper,
            RunnerConfig::new("test")
                .with_concurrency(1)
                .with_run_timeout(Duration::from_millis(50)),
        );

        let outcome = runner.run(vec!["g1".to_string()]).await;

        assert_eq!(outcome.failed, 1);
        let error = outcome.error.unwrap();
        assert_eq!(error.context.event_id, "g1");
        assert!(matches!(error.source, AppError::Cancelled));
        assert!(
            released.load(Ordering::SeqCst),
            "in-flight scrape still held its resources after the run returned"
        );
    }

    #[tokio::test]
    async fn reporter_sees_run_lifecycle() {
        let reporter = RecordingReporter::default();
        let runner = EventDataRunner::new(
            MockEventScraper::new(),
            RunnerConfig::new("test").with_concurrency(1),
        )
        .with_reporter(reporter.clone());

        runner
            .run(vec![MockUnit::ok("a", 2), MockUnit::failing("b")])
            .await;

        assert_eq!(
            reporter.kinds(),
            [
                "run_started",
                "unit_started",
                "unit_completed",
                "unit_started",
                "unit_failed",
                "run_finished",
            ]
        );
    }

    #[test]
    fn construct_context_is_pure() {
        let scraper = MockEventScraper::new();
        let unit = MockUnit::ok("a", 1);
        let first: RunContext = scraper.construct_context(&unit);
        let second = scraper.construct_context(&unit);
        assert_eq!(first, second);
    }

    #[test]
    fn collate_keeps_batches_whole() {
        let ctx = |id: &str| RunContext {
            event_id: id.into(),
            home_team: "H".into(),
            away_team: "A".into(),
            url: format!("https://example.com/{id}"),
            pulled_at: None,
        };
        let outcome = collate(
            vec![
                Envelope::records(ctx("x"), vec![1, 2]),
                Envelope::failed(ctx("y"), AppError::Generic("bad".into())),
                Envelope::records(ctx("z"), vec![]),
                Envelope::records(ctx("w"), vec![3]),
            ],
            4,
        );
        assert_eq!(outcome.records, [1, 2, 3]);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.error.unwrap().context.event_id, "y");
    }

    #[tokio::test]
    async fn matchup_runner_returns_units_in_scraper_order() {
        let scraper = MockMatchupScraper::new(vec![matchup("g1"), matchup("g2"), matchup("g3")]);
        let calls = Arc::clone(&scraper.calls);
        let runner = MatchupRunner::new(scraper, RunnerConfig::new("schedule"));

        let units = runner.run().await.unwrap();

        let ids: Vec<_> = units.iter().map(|m| m.event_id.as_str()).collect();
        assert_eq!(ids, ["g1", "g2", "g3"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn matchup_runner_is_idempotent_for_unchanged_source() {
        let runner = MatchupRunner::new(
            MockMatchupScraper::new(vec![matchup("g1"), matchup("g2")]),
            RunnerConfig::new("schedule"),
        );

        let first = runner.run().await.unwrap();
        let second = runner.run().await.unwrap();

        assert_eq!(first.len(), second.len());
        let first_ids: Vec<_> = first.iter().map(|m| &m.event_id).collect();
        let second_ids: Vec<_> = second.iter().map(|m| &m.event_id).collect();
        assert_eq!(first_ids, second_ids);
    }

    #[tokio::test]
    async fn matchup_runner_tolerates_skips_without_hard_error() {
        let reporter = RecordingReporter::default();
        let runner = MatchupRunner::new(
            MockMatchupScraper::new(vec![matchup("g1")]).with_counts(2, 1),
            RunnerConfig::new("schedule"),
        )
        .with_reporter(reporter.clone());

        let units = runner.run().await.unwrap();

        assert_eq!(units.len(), 1);
        assert_eq!(reporter.kinds(), ["matchups_started", "matchups_scraped"]);
    }

    #[tokio::test]
    async fn matchup_runner_fails_on_hard_error() {
        let runner = MatchupRunner::new(
            MockMatchupScraper::new(vec![matchup("g1")])
                .with_error(AppError::Generic("schedule page gone".into())),
            RunnerConfig::new("schedule"),
        );

        let err = runner.run().await.unwrap_err();

        assert!(matches!(err, AppError::Generic(_)));
    }
}
