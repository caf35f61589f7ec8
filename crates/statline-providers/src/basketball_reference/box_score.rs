//! Box score pages: `table#box-{TEAM}-game-basic`, one per side.
//!
//! Each table has a header row naming the starters block, the starter rows,
//! a `tr.thead` separator naming the reserves block, then the reserve rows.
//! Players who did not play carry a `reason` cell instead of stats and are
//! skipped. The `tfoot` row holds the team totals.

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use statline_core::document::{Document, element_text, selector};
use statline_core::error::{AppError, FieldConversionError};
use statline_core::models::{Envelope, Feed, HeaderProfile, Matchup, Provider, RunContext};
use statline_core::schema::{HeaderOrigin, check_header_row};
use statline_core::traits::{DocumentRetriever, EventDataScraper};
use statline_core::util::{parse_clock_seconds, parse_field, parse_optional_field, parse_signed_field};

use super::layout::{self, BoxScoreLayout};

const READY_SELECTOR: &str = "table[id$='-game-basic']";

/// One player's line from the basic box score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerBoxScore {
    pub event_id: String,
    pub pulled_at: DateTime<Utc>,
    pub team: String,
    pub opponent: String,
    pub home: bool,
    pub player: String,
    /// Provider player id (e.g. "tatumja01"), when the row links to one
    pub player_id: Option<String>,
    pub starter: bool,
    pub seconds_played: u32,
    pub fg: u16,
    pub fga: u16,
    pub fg3: u16,
    pub fg3a: u16,
    pub ft: u16,
    pub fta: u16,
    pub orb: u16,
    pub drb: u16,
    pub trb: u16,
    pub ast: u16,
    pub stl: u16,
    pub blk: u16,
    pub tov: u16,
    pub pf: u16,
    pub pts: u16,
    pub game_score: Option<f32>,
    pub plus_minus: Option<i32>,
}

/// A team's totals row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamTotals {
    pub event_id: String,
    pub pulled_at: DateTime<Utc>,
    pub team: String,
    pub opponent: String,
    pub home: bool,
    pub seconds_played: u32,
    pub fg: u16,
    pub fga: u16,
    pub fg3: u16,
    pub fg3a: u16,
    pub ft: u16,
    pub fta: u16,
    pub orb: u16,
    pub drb: u16,
    pub trb: u16,
    pub ast: u16,
    pub stl: u16,
    pub blk: u16,
    pub tov: u16,
    pub pf: u16,
    pub pts: u16,
}

/// Which side of a matchup a table belongs to.
#[derive(Debug, Clone, Copy)]
struct Side<'a> {
    team: &'a str,
    opponent: &'a str,
    home: bool,
}

impl<'a> Side<'a> {
    fn both(matchup: &'a Matchup) -> [Side<'a>; 2] {
        [
            Side {
                team: &matchup.away_team,
                opponent: &matchup.home_team,
                home: false,
            },
            Side {
                team: &matchup.home_team,
                opponent: &matchup.away_team,
                home: true,
            },
        ]
    }

    fn table_selector(&self) -> String {
        format!("table#box-{}-game-basic", self.team)
    }
}

/// The stat cells of one row, addressed by column offset.
struct StatRow<'a> {
    cells: Vec<ElementRef<'a>>,
    labels: &'static [&'static str],
}

impl<'a> StatRow<'a> {
    fn new(row: ElementRef<'a>, labels: &'static [&'static str]) -> Result<Self, AppError> {
        let cell_sel = selector("th, td")?;
        let cells: Vec<_> = row.select(&cell_sel).collect();
        if cells.len() != labels.len() {
            return Err(FieldConversionError {
                field: "row".to_string(),
                raw: element_text(row),
                message: format!("expected {} cells, found {}", labels.len(), cells.len()),
            }
            .into());
        }
        Ok(Self { cells, labels })
    }

    fn text(&self, column: usize) -> String {
        element_text(self.cells[column])
    }

    fn count(&self, column: usize) -> Result<u16, FieldConversionError> {
        parse_field(self.labels[column], &self.text(column))
    }

    fn seconds(&self) -> Result<u32, FieldConversionError> {
        parse_clock_seconds(self.labels[layout::MP], &self.text(layout::MP))
    }
}

/// Counting stats shared by player lines and team totals.
struct Counting {
    fg: u16,
    fga: u16,
    fg3: u16,
    fg3a: u16,
    ft: u16,
    fta: u16,
    orb: u16,
    drb: u16,
    trb: u16,
    ast: u16,
    stl: u16,
    blk: u16,
    tov: u16,
    pf: u16,
    pts: u16,
}

impl Counting {
    fn read(row: &StatRow<'_>) -> Result<Self, FieldConversionError> {
        Ok(Self {
            fg: row.count(layout::FG)?,
            fga: row.count(layout::FGA)?,
            fg3: row.count(layout::FG3)?,
            fg3a: row.count(layout::FG3A)?,
            ft: row.count(layout::FT)?,
            fta: row.count(layout::FTA)?,
            orb: row.count(layout::ORB)?,
            drb: row.count(layout::DRB)?,
            trb: row.count(layout::TRB)?,
            ast: row.count(layout::AST)?,
            stl: row.count(layout::STL)?,
            blk: row.count(layout::BLK)?,
            tov: row.count(layout::TOV)?,
            pf: row.count(layout::PF)?,
            pts: row.count(layout::PTS)?,
        })
    }
}

fn find_table<'h>(html: &'h Html, url: &str, side: &Side<'_>) -> Result<ElementRef<'h>, AppError> {
    let css = side.table_selector();
    let sel = selector(&css)?;
    html.select(&sel)
        .next()
        .ok_or(AppError::MissingElement {
            url: url.to_string(),
            selector: css,
        })
}

/// Validates the starters header of `table` against the layout.
fn check_starters_header(
    table: ElementRef<'_>,
    url: &str,
    side: &Side<'_>,
    layout: &BoxScoreLayout,
) -> Result<(), AppError> {
    let header_sel = selector("thead tr:not(.over_header)")?;
    let css = format!("{} thead tr:not(.over_header)", side.table_selector());
    let header = table
        .select(&header_sel)
        .next()
        .ok_or_else(|| AppError::MissingElement {
            url: url.to_string(),
            selector: css.clone(),
        })?;
    check_header_row(&layout.starters, header, &HeaderOrigin::new(url, css))
}

/// Parses every player who logged stats in one team's table, starters first.
fn parse_player_table(
    table: ElementRef<'_>,
    url: &str,
    event_id: &str,
    side: &Side<'_>,
    pulled_at: DateTime<Utc>,
    layout: &BoxScoreLayout,
) -> Result<Vec<PlayerBoxScore>, AppError> {
    check_starters_header(table, url, side, layout)?;

    let row_sel = selector("tbody tr")?;
    let reason_sel = selector("td[data-stat='reason']")?;
    let link_sel = selector("a[href]")?;

    let mut records = Vec::new();
    let mut starter = true;
    for row in table.select(&row_sel) {
        if row.value().classes().any(|class| class == "thead") {
            let origin = HeaderOrigin::new(url, format!("{} tbody tr.thead", side.table_selector()));
            check_header_row(&layout.reserves, row, &origin)?;
            starter = false;
            continue;
        }

        if row.select(&reason_sel).next().is_some() {
            tracing::trace!(%url, team = side.team, "Skipping player without stats");
            continue;
        }

        let labels = if starter {
            layout.starters.columns
        } else {
            layout.reserves.columns
        };
        let stats = StatRow::new(row, labels)?;
        let name_cell = stats.cells[layout::PLAYER];
        let player_id = name_cell
            .value()
            .attr("data-append-csv")
            .map(str::to_string)
            .or_else(|| {
                name_cell
                    .select(&link_sel)
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .and_then(player_id_from_href)
            });
        let counting = Counting::read(&stats)?;

        records.push(PlayerBoxScore {
            event_id: event_id.to_string(),
            pulled_at,
            team: side.team.to_string(),
            opponent: side.opponent.to_string(),
            home: side.home,
            player: stats.text(layout::PLAYER),
            player_id,
            starter,
            seconds_played: stats.seconds()?,
            fg: counting.fg,
            fga: counting.fga,
            fg3: counting.fg3,
            fg3a: counting.fg3a,
            ft: counting.ft,
            fta: counting.fta,
            orb: counting.orb,
            drb: counting.drb,
            trb: counting.trb,
            ast: counting.ast,
            stl: counting.stl,
            blk: counting.blk,
            tov: counting.tov,
            pf: counting.pf,
            pts: counting.pts,
            game_score: parse_optional_field(labels[layout::GMSC], &stats.text(layout::GMSC))?,
            plus_minus: parse_signed_field(
                labels[layout::PLUS_MINUS],
                &stats.text(layout::PLUS_MINUS),
            )?,
        });
    }

    Ok(records)
}

/// `/players/t/tatumja01.html` -> `tatumja01`
fn player_id_from_href(href: &str) -> Option<String> {
    href.rsplit('/')
        .next()?
        .strip_suffix(".html")
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Parses both teams' player lines, away side first.
fn parse_player_box_scores(
    document: &Document,
    matchup: &Matchup,
    pulled_at: DateTime<Utc>,
    layout: &BoxScoreLayout,
) -> Result<Vec<PlayerBoxScore>, AppError> {
    let html = document.parse();
    let mut records = Vec::new();
    for side in Side::both(matchup) {
        let table = find_table(&html, document.url(), &side)?;
        records.extend(parse_player_table(
            table,
            document.url(),
            &matchup.event_id,
            &side,
            pulled_at,
            layout,
        )?);
    }
    Ok(records)
}

/// Parses both teams' totals rows, away side first.
fn parse_team_totals(
    document: &Document,
    matchup: &Matchup,
    pulled_at: DateTime<Utc>,
    layout: &BoxScoreLayout,
) -> Result<Vec<TeamTotals>, AppError> {
    let html = document.parse();
    let totals_sel = selector("tfoot tr")?;

    let mut records = Vec::with_capacity(2);
    for side in Side::both(matchup) {
        let table = find_table(&html, document.url(), &side)?;
        check_starters_header(table, document.url(), &side, layout)?;

        let row = table
            .select(&totals_sel)
            .next()
            .ok_or_else(|| AppError::MissingElement {
                url: document.url().to_string(),
                selector: format!("{} tfoot tr", side.table_selector()),
            })?;
        let stats = StatRow::new(row, layout.starters.columns)?;
        let counting = Counting::read(&stats)?;

        records.push(TeamTotals {
            event_id: matchup.event_id.clone(),
            pulled_at,
            team: side.team.to_string(),
            opponent: side.opponent.to_string(),
            home: side.home,
            seconds_played: stats.seconds()?,
            fg: counting.fg,
            fga: counting.fga,
            fg3: counting.fg3,
            fg3a: counting.fg3a,
            ft: counting.ft,
            fta: counting.fta,
            orb: counting.orb,
            drb: counting.drb,
            trb: counting.trb,
            ast: counting.ast,
            stl: counting.stl,
            blk: counting.blk,
            tov: counting.tov,
            pf: counting.pf,
            pts: counting.pts,
        });
    }
    Ok(records)
}

macro_rules! box_score_scraper {
    ($(#[$doc:meta])* $name:ident, $record:ty, $feed:expr, $parse:path) => {
        $(#[$doc])*
        #[derive(Clone)]
        pub struct $name<R> {
            retriever: R,
            headers: HeaderProfile,
            layout: BoxScoreLayout,
        }

        impl<R: DocumentRetriever> $name<R> {
            pub fn new(retriever: R) -> Self {
                Self {
                    retriever,
                    headers: HeaderProfile::desktop_chrome(),
                    layout: BoxScoreLayout::default(),
                }
            }

            pub fn with_headers(mut self, headers: HeaderProfile) -> Self {
                self.headers = headers;
                self
            }

            pub fn with_layout(mut self, layout: BoxScoreLayout) -> Self {
                self.layout = layout;
                self
            }
        }

        impl<R: DocumentRetriever + 'static> EventDataScraper for $name<R> {
            type Unit = Matchup;
            type Record = $record;

            fn feed(&self) -> Feed {
                $feed
            }

            fn provider(&self) -> Provider {
                Provider::BasketballReference
            }

            fn construct_context(&self, unit: &Matchup) -> RunContext {
                RunContext::for_matchup(unit)
            }

            async fn scrape(&self, unit: &Matchup) -> Envelope<$record> {
                let pulled_at = Utc::now();
                let context = self.construct_context(unit).pulled_at(pulled_at);

                let document = match self
                    .retriever
                    .retrieve(&unit.url, &self.headers, READY_SELECTOR)
                    .await
                {
                    Ok(document) => document,
                    Err(e) => return Envelope::failed(context, e),
                };

                Envelope::from_result(context, $parse(&document, unit, pulled_at, &self.layout))
            }
        }
    };
}

box_score_scraper!(
    /// Player lines for both teams of a game.
    PlayerBoxScoreScraper,
    PlayerBoxScore,
    Feed::PlayerBoxScore,
    parse_player_box_scores
);

box_score_scraper!(
    /// Team totals for both teams of a game.
    TeamTotalsScraper,
    TeamTotals,
    Feed::TeamTotals,
    parse_team_totals
);
