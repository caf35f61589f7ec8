use chrono::{Datelike, NaiveDate, NaiveTime};
use scraper::ElementRef;
use statline_core::document::{Document, selector};
use statline_core::error::AppError;
use statline_core::models::{Feed, HeaderProfile, Matchup, Provider};
use statline_core::traits::{DocumentRetriever, MatchupScrape, MatchupScraper};
use url::Url;

use super::{BASE_URL, team_code};

/// Present on every schedule page, with or without games.
const READY_SELECTOR: &str = "#content";

/// Lists the games played on one day from the `/boxscores/` index page.
///
/// Every game summary yields one [`Matchup`] whose URL is the game's box
/// score page. Summaries without two franchise teams (all-star games) are
/// skipped; summaries missing their box-score link are counted as errors.
#[derive(Clone)]
pub struct ScheduleScraper<R> {
    retriever: R,
    date: NaiveDate,
    headers: HeaderProfile,
    base_url: String,
}

impl<R: DocumentRetriever> ScheduleScraper<R> {
    pub fn new(retriever: R, date: NaiveDate) -> Self {
        Self {
            retriever,
            date,
            headers: HeaderProfile::desktop_chrome(),
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderProfile) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// `{base}/boxscores/?month=M&day=D&year=Y`
    pub fn schedule_url(&self) -> Result<Url, AppError> {
        let mut url = Url::parse(&self.base_url)
            .and_then(|base| base.join("/boxscores/"))
            .map_err(|e| AppError::ConfigError(format!("Invalid base URL '{}': {e}", self.base_url)))?;
        url.query_pairs_mut()
            .append_pair("month", &self.date.month().to_string())
            .append_pair("day", &self.date.day().to_string())
            .append_pair("year", &self.date.year().to_string());
        Ok(url)
    }
}

impl<R: DocumentRetriever> MatchupScraper for ScheduleScraper<R> {
    type Unit = Matchup;

    fn feed(&self) -> Feed {
        Feed::Schedule
    }

    fn provider(&self) -> Provider {
        Provider::BasketballReference
    }

    async fn scrape(&self) -> MatchupScrape<Matchup> {
        let url = match self.schedule_url() {
            Ok(url) => url,
            Err(e) => return MatchupScrape::failed(e),
        };

        let document = match self
            .retriever
            .retrieve(url.as_str(), &self.headers, READY_SELECTOR)
            .await
        {
            Ok(document) => document,
            Err(e) => return MatchupScrape::failed(e),
        };

        parse_schedule(&document, self.date).unwrap_or_else(MatchupScrape::failed)
    }
}

/// Parses a schedule page into matchups starting on `date`.
pub(crate) fn parse_schedule(
    document: &Document,
    date: NaiveDate,
) -> Result<MatchupScrape<Matchup>, AppError> {
    let html = document.parse();
    let summaries = selector("div.game_summary")?;
    let page_url = Url::parse(document.url())
        .map_err(|e| AppError::Generic(format!("Invalid document URL '{}': {e}", document.url())))?;
    let starts_at = date.and_time(NaiveTime::MIN).and_utc();

    let mut scrape = MatchupScrape::new(Vec::new());
    for summary in html.select(&summaries) {
        match parse_summary(summary, &page_url) {
            Ok(Some((event_id, away_team, home_team, url))) => scrape.units.push(Matchup {
                event_id,
                home_team,
                away_team,
                url,
                starts_at,
            }),
            Ok(None) => scrape.skipped += 1,
            Err(e) => {
                tracing::warn!(url = %document.url(), error = %e, "Dropping unparseable game summary");
                scrape.errors += 1;
            }
        }
    }

    tracing::debug!(
        url = %document.url(),
        games = scrape.units.len(),
        skipped = scrape.skipped,
        errors = scrape.errors,
        "Parsed schedule"
    );
    Ok(scrape)
}

/// `(event_id, away, home, box score url)`, or `None` for a non-franchise game.
type Summary = (String, String, String, String);

fn parse_summary(summary: ElementRef<'_>, page_url: &Url) -> Result<Option<Summary>, AppError> {
    let rows_sel = selector("table.teams tr")?;
    let cell_sel = selector("td")?;
    let link_sel = selector("td a")?;
    let game_sel = selector("td.gamelink a")?;
    let missing = |what: &str| AppError::MissingElement {
        url: page_url.to_string(),
        selector: format!("div.game_summary {what}"),
    };

    // First row is the visitor, second the home side.
    let rows: Vec<ElementRef<'_>> = summary
        .select(&rows_sel)
        .filter(|row| row.select(&cell_sel).next().is_some())
        .collect();
    let [away_row, home_row] = rows.as_slice() else {
        return Err(missing("table.teams tr"));
    };

    let team_of = |row: &ElementRef<'_>| {
        row.select(&link_sel)
            .filter_map(|a| a.value().attr("href"))
            .find_map(team_code)
    };
    let (Some(away), Some(home)) = (team_of(away_row), team_of(home_row)) else {
        return Ok(None);
    };

    let href = summary
        .select(&game_sel)
        .next()
        .and_then(|a| a.value().attr("href"))
        .ok_or_else(|| missing("td.gamelink a"))?;
    let event_id = href
        .rsplit('/')
        .next()
        .and_then(|file| file.strip_suffix(".html"))
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| missing("td.gamelink a[href$='.html']"))?
        .to_string();
    let url = page_url
        .join(href)
        .map_err(|e| AppError::Generic(format!("Invalid box score link '{href}': {e}")))?;

    Ok(Some((event_id, away, home, url.to_string())))
}

#[cfg(test)]
mod tests {
    use statline_core::error::RetrievalError;
    use statline_core::runner::MatchupRunner;
    use statline_core::testutil::MockRetriever;
    use statline_core::RunnerConfig;

    use super::*;

    fn summary(away: &str, home: &str, event_id: &str) -> String {
        format!(
            r#"<div class="game_summary expanded nohover">
                <table class="teams"><tbody>
                  <tr class="loser"><td><a href="/teams/{away}/2024.html">{away}</a></td>
                    <td class="right">101</td>
                    <td class="right gamelink"><a href="/boxscores/{event_id}.html">Final</a></td></tr>
                  <tr class="winner"><td><a href="/teams/{home}/2024.html">{home}</a></td>
                    <td class="right">119</td><td class="right">&nbsp;</td></tr>
                </tbody></table>
              </div>"#
        )
    }

    fn page(summaries: &[String]) -> String {
        format!(
            r#"<html><body><div id="content"><div class="game_summaries">{}</div></div></body></html>"#,
            summaries.concat()
        )
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
    }

    #[test]
    fn test_schedule_url() {
        let scraper = ScheduleScraper::new(MockRetriever::new(""), date());
        assert_eq!(
            scraper.schedule_url().unwrap().as_str(),
            "https://www.basketball-reference.com/boxscores/?month=1&day=10&year=2024"
        );

        let err = ScheduleScraper::new(MockRetriever::new(""), date())
            .with_base_url("not a url")
            .schedule_url()
            .unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn test_parses_games_in_page_order() {
        let html = page(&[
            summary("DAL", "BOS", "202401100BOS"),
            summary("PHO", "NYK", "202401100NYK"),
        ]);
        let doc = Document::new(
            "https://www.basketball-reference.com/boxscores/?month=1&day=10&year=2024",
            html,
        );

        let scrape = parse_schedule(&doc, date()).unwrap();

        assert_eq!(scrape.units.len(), 2);
        assert_eq!(scrape.skipped, 0);
        assert_eq!(scrape.errors, 0);
        let first = &scrape.units[0];
        assert_eq!(first.event_id, "202401100BOS");
        assert_eq!(first.away_team, "DAL");
        assert_eq!(first.home_team, "BOS");
        assert_eq!(
            first.url,
            "https://www.basketball-reference.com/boxscores/202401100BOS.html"
        );
        assert_eq!(first.starts_at.date_naive(), date());
        assert_eq!(scrape.units[1].event_id, "202401100NYK");
    }

    #[test]
    fn test_counts_skipped_and_malformed_summaries() {
        let all_star = r#"<div class="game_summary">
            <table class="teams"><tbody>
              <tr><td><a href="/allstar/NBA_2024.html">East</a></td><td>211</td>
                <td class="gamelink"><a href="/boxscores/202402180EAST.html">Final</a></td></tr>
              <tr><td><a href="/allstar/NBA_2024.html">West</a></td><td>186</td></tr>
            </tbody></table></div>"#
            .to_string();
        let no_link = r#"<div class="game_summary">
            <table class="teams"><tbody>
              <tr><td><a href="/teams/MIA/2024.html">MIA</a></td><td>99</td></tr>
              <tr><td><a href="/teams/ORL/2024.html">ORL</a></td><td>103</td></tr>
            </tbody></table></div>"#
            .to_string();
        let one_row = r#"<div class="game_summary">
            <table class="teams"><tbody>
              <tr><td><a href="/teams/MIA/2024.html">MIA</a></td><td>99</td></tr>
            </tbody></table></div>"#
            .to_string();
        let html = page(&[
            summary("DAL", "BOS", "202401100BOS"),
            all_star,
            no_link,
            one_row,
        ]);
        let doc = Document::new("https://www.basketball-reference.com/boxscores/", html);

        let scrape = parse_schedule(&doc, date()).unwrap();

        assert_eq!(scrape.units.len(), 1);
        assert_eq!(scrape.skipped, 1);
        assert_eq!(scrape.errors, 2);
        assert!(scrape.error.is_none());
    }

    #[test]
    fn test_day_without_games_is_empty() {
        let doc = Document::new(
            "https://www.basketball-reference.com/boxscores/",
            page(&[]),
        );

        let scrape = parse_schedule(&doc, date()).unwrap();

        assert!(scrape.units.is_empty());
        assert_eq!(scrape.skipped + scrape.errors, 0);
    }

    #[tokio::test]
    async fn test_scrape_requests_schedule_page() {
        let retriever = MockRetriever::new(&page(&[summary("DAL", "BOS", "202401100BOS")]));
        let scraper = ScheduleScraper::new(retriever.clone(), date())
            .with_base_url("https://mirror.example.com");

        let scrape = scraper.scrape().await;

        assert_eq!(scrape.units.len(), 1);
        assert_eq!(
            scrape.units[0].url,
            "https://mirror.example.com/boxscores/202401100BOS.html"
        );
        let requests = retriever.requests.lock().unwrap();
        assert_eq!(
            requests[0],
            (
                "https://mirror.example.com/boxscores/?month=1&day=10&year=2024".to_string(),
                READY_SELECTOR.to_string()
            )
        );
        assert!(retriever.last_user_agent.lock().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_retrieval_failure_is_hard_error() {
        let retriever = MockRetriever::with_error(RetrievalError::Timeout {
            url: "https://www.basketball-reference.com/boxscores/".into(),
            after: std::time::Duration::from_secs(30),
        });
        let scrape = ScheduleScraper::new(retriever, date()).scrape().await;

        assert!(scrape.units.is_empty());
        assert!(matches!(scrape.error, Some(AppError::Retrieval(_))));
    }

    #[tokio::test]
    async fn test_runner_returns_same_matchups_on_repeat_runs() {
        let html = page(&[
            summary("DAL", "BOS", "202401100BOS"),
            summary("PHO", "NYK", "202401100NYK"),
        ]);
        let retriever = MockRetriever::with_responses(vec![Ok(html.clone()), Ok(html)]);
        let runner = MatchupRunner::new(
            ScheduleScraper::new(retriever, date()),
            RunnerConfig::default(),
        );

        let first = runner.run().await.unwrap();
        let second = runner.run().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }
}
