use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// The logical dataset a scraper serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feed {
    /// Matchup discovery for a date.
    Schedule,
    /// One row per player per game.
    PlayerBoxScore,
    /// One row per team per game.
    TeamTotals,
}

impl Feed {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feed::Schedule => "schedule",
            Feed::PlayerBoxScore => "player_box_score",
            Feed::TeamTotals => "team_totals",
        }
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Feed {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "schedule" => Ok(Feed::Schedule),
            "player_box_score" => Ok(Feed::PlayerBoxScore),
            "team_totals" => Ok(Feed::TeamTotals),
            _ => Err(format!("Unknown feed: {}", s)),
        }
    }
}

/// The external site a scraper targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    BasketballReference,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::BasketballReference => "basketball_reference",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "basketball_reference" | "bref" => Ok(Provider::BasketballReference),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// One schedulable event discovered by a matchup scraper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matchup {
    /// Provider-specific event identifier (e.g. "202401100BOS")
    pub event_id: String,
    pub home_team: String,
    pub away_team: String,
    /// Canonical detail page for the event
    pub url: String,
    pub starts_at: DateTime<Utc>,
}

/// Attribution metadata attached to every per-unit result, success or failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    pub event_id: String,
    pub home_team: String,
    pub away_team: String,
    pub url: String,
    /// Wall-clock time the fetch began; `None` until stamped by the scraper.
    pub pulled_at: Option<DateTime<Utc>>,
}

impl RunContext {
    /// Builds an unstamped context from a matchup. Pure.
    pub fn for_matchup(matchup: &Matchup) -> Self {
        Self {
            event_id: matchup.event_id.clone(),
            home_team: matchup.home_team.clone(),
            away_team: matchup.away_team.clone(),
            url: matchup.url.clone(),
            pulled_at: None,
        }
    }

    /// Stamps the pull time with the current wall clock.
    pub fn pulled_now(self) -> Self {
        self.pulled_at(Utc::now())
    }

    pub fn pulled_at(mut self, at: DateTime<Utc>) -> Self {
        self.pulled_at = Some(at);
        self
    }
}

/// The per-unit result of an event-data scrape.
///
/// Exactly one envelope is produced per unit of work. Both variants carry the
/// unit's [`RunContext`] so failures stay attributable.
#[derive(Debug)]
pub enum Envelope<R> {
    Records { context: RunContext, records: Vec<R> },
    Failed { context: RunContext, error: AppError },
}

impl<R> Envelope<R> {
    pub fn records(context: RunContext, records: Vec<R>) -> Self {
        Envelope::Records { context, records }
    }

    pub fn failed(context: RunContext, error: impl Into<AppError>) -> Self {
        Envelope::Failed {
            context,
            error: error.into(),
        }
    }

    /// Wraps a parse result, keeping the context on both paths.
    pub fn from_result(context: RunContext, result: Result<Vec<R>, AppError>) -> Self {
        match result {
            Ok(records) => Envelope::records(context, records),
            Err(error) => Envelope::failed(context, error),
        }
    }

    pub fn context(&self) -> &RunContext {
        match self {
            Envelope::Records { context, .. } | Envelope::Failed { context, .. } => context,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Envelope::Failed { .. })
    }

    /// Number of records carried; zero for a failed envelope.
    pub fn len(&self) -> usize {
        match self {
            Envelope::Records { records, .. } => records.len(),
            Envelope::Failed { .. } => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn error(&self) -> Option<&AppError> {
        match self {
            Envelope::Records { .. } => None,
            Envelope::Failed { error, .. } => Some(error),
        }
    }

    pub fn into_parts(self) -> (RunContext, Result<Vec<R>, AppError>) {
        match self {
            Envelope::Records { context, records } => (context, Ok(records)),
            Envelope::Failed { context, error } => (context, Err(error)),
        }
    }
}

/// An ordered request header set used to look like a regular browser.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderProfile {
    headers: Vec<(String, String)>,
}

impl HeaderProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// A current desktop Chrome on Windows.
    pub fn desktop_chrome() -> Self {
        Self::new()
            .with(
                "User-Agent",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
            )
            .with(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            )
            .with("Accept-Language", "en-US,en;q=0.9")
            .with("Cache-Control", "no-cache")
            .with("Upgrade-Insecure-Requests", "1")
    }

    /// Sets a header, replacing any existing value (case-insensitive name match).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(slot) => slot.1 = value,
            None => self.headers.push((name, value)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.get("User-Agent")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn matchup() -> Matchup {
        Matchup {
            event_id: "202401100BOS".into(),
            home_team: "BOS".into(),
            away_team: "DAL".into(),
            url: "https://www.basketball-reference.com/boxscores/202401100BOS.html".into(),
            starts_at: Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_context_for_matchup_is_deterministic() {
        let m = matchup();
        let a = RunContext::for_matchup(&m);
        let b = RunContext::for_matchup(&m);
        assert_eq!(a, b);
        assert_eq!(a.url, m.url);
        assert!(a.pulled_at.is_none());
    }

    #[test]
    fn test_pulled_at_stamps_only_timestamp() {
        let m = matchup();
        let at = Utc.with_ymd_and_hms(2024, 1, 11, 8, 30, 0).unwrap();
        let ctx = RunContext::for_matchup(&m).pulled_at(at);
        assert_eq!(ctx.pulled_at, Some(at));
        assert_eq!(ctx.event_id, "202401100BOS");
    }

    #[test]
    fn test_matchup_serializes_flat() {
        let value = serde_json::to_value(matchup()).unwrap();
        assert_eq!(value["event_id"], "202401100BOS");
        assert_eq!(value["home_team"], "BOS");
        assert!(value["starts_at"].as_str().unwrap().starts_with("2024-01-10T"));
        assert_eq!(serde_json::to_value(Feed::PlayerBoxScore).unwrap(), "player_box_score");
    }

    #[test]
    fn test_feed_round_trips_through_str() {
        for feed in [Feed::Schedule, Feed::PlayerBoxScore, Feed::TeamTotals] {
            assert_eq!(feed.as_str().parse::<Feed>().unwrap(), feed);
        }
        assert!("batting".parse::<Feed>().is_err());
    }

    #[test]
    fn test_provider_accepts_aliases() {
        assert_eq!(
            "basketball-reference".parse::<Provider>().unwrap(),
            Provider::BasketballReference
        );
        assert_eq!("bref".parse::<Provider>().unwrap(), Provider::BasketballReference);
    }

    #[test]
    fn test_envelope_keeps_context_on_failure() {
        let ctx = RunContext::for_matchup(&matchup());
        let env: Envelope<u32> = Envelope::failed(ctx.clone(), AppError::Cancelled);
        assert!(env.is_failed());
        assert!(env.is_empty());
        assert_eq!(env.context(), &ctx);
        let (back, result) = env.into_parts();
        assert_eq!(back, ctx);
        assert!(matches!(result, Err(AppError::Cancelled)));
    }

    #[test]
    fn test_header_profile_replaces_case_insensitively() {
        let profile = HeaderProfile::desktop_chrome().with("user-agent", "statline-test");
        assert_eq!(profile.user_agent(), Some("statline-test"));
        assert_eq!(
            profile.iter().filter(|(n, _)| n.eq_ignore_ascii_case("user-agent")).count(),
            1
        );
    }
}
