use std::num::NonZeroUsize;
use std::time::Duration;

use crate::error::AppError;

/// Upper bound on event-data workers.
pub const MAX_CONCURRENCY: usize = 256;

/// Configuration shared by both runners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Identity used only for log attribution.
    pub name: String,
    /// Worker count for the event-data runner. `0` means "available parallelism".
    pub concurrency: usize,
    /// Cancels all remaining work once elapsed. `None` disables the deadline.
    pub run_timeout: Option<Duration>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            name: "statline".to_string(),
            concurrency: 0,
            run_timeout: None,
        }
    }
}

impl RunnerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_run_timeout(mut self, run_timeout: Duration) -> Self {
        self.run_timeout = Some(run_timeout);
        self
    }

    /// Number of workers to start, resolving `0` to the available parallelism.
    /// Never more than [`MAX_CONCURRENCY`].
    pub fn worker_count(&self) -> usize {
        let workers = if self.concurrency > 0 {
            self.concurrency
        } else {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        };
        workers.min(MAX_CONCURRENCY)
    }

    /// Read configuration from environment variables.
    ///
    /// - `STATLINE_CONCURRENCY` (optional, defaults to 0 = available parallelism)
    /// - `STATLINE_RUN_TIMEOUT_SECS` (optional, must be at least 1)
    pub fn from_env(name: impl Into<String>) -> Result<Self, AppError> {
        Self::from_lookup(name, |key| std::env::var(key).ok())
    }

    fn from_lookup(
        name: impl Into<String>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, AppError> {
        let concurrency = match lookup("STATLINE_CONCURRENCY") {
            None => 0,
            Some(raw) => parse_concurrency(&raw).map_err(|e| {
                AppError::ConfigError(format!("Invalid STATLINE_CONCURRENCY '{raw}': {e}"))
            })?,
        };

        let run_timeout = match lookup("STATLINE_RUN_TIMEOUT_SECS") {
            None => None,
            Some(raw) => Some(positive_secs("STATLINE_RUN_TIMEOUT_SECS", &raw)?),
        };

        Ok(Self {
            name: name.into(),
            concurrency,
            run_timeout,
        })
    }
}

/// Configuration for document retrievers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrieverConfig {
    /// Upper bound on a single retrieval, navigation through readiness.
    pub timeout: Duration,
    /// Log per-stage timings and document sizes.
    pub debug: bool,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            debug: false,
        }
    }
}

impl RetrieverConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Read configuration from environment variables.
    ///
    /// - `STATLINE_RETRIEVE_TIMEOUT_SECS` (optional, defaults to 30)
    /// - `STATLINE_DEBUG_TRACE` (optional, `1`/`true`/`yes` to enable)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let timeout = match lookup("STATLINE_RETRIEVE_TIMEOUT_SECS") {
            None => Duration::from_secs(30),
            Some(raw) => positive_secs("STATLINE_RETRIEVE_TIMEOUT_SECS", &raw)?,
        };

        let debug = match lookup("STATLINE_DEBUG_TRACE") {
            None => false,
            Some(raw) => match raw.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                _ => {
                    return Err(AppError::ConfigError(format!(
                        "Invalid STATLINE_DEBUG_TRACE '{raw}': expected true or false"
                    )));
                }
            },
        };

        Ok(Self { timeout, debug })
    }
}

/// Parses a worker count in `0..=MAX_CONCURRENCY` (0 = available parallelism).
pub fn parse_concurrency(raw: &str) -> Result<usize, String> {
    let value: usize = raw
        .trim()
        .parse()
        .map_err(|_| "must be a non-negative integer".to_string())?;
    if value > MAX_CONCURRENCY {
        return Err(format!("must be at most {MAX_CONCURRENCY}"));
    }
    Ok(value)
}

fn positive_secs(key: &str, raw: &str) -> Result<Duration, AppError> {
    let secs: u64 = raw.trim().parse().map_err(|_| {
        AppError::ConfigError(format!("Invalid {key} '{raw}': must be a positive integer"))
    })?;
    if secs == 0 {
        return Err(AppError::ConfigError(format!("{key} must be at least 1")));
    }
    Ok(Duration::from_secs(secs))
}
