//! basketball-reference.com: daily schedule pages and per-game box scores.

mod box_score;
mod layout;
mod schedule;

pub use box_score::{PlayerBoxScore, PlayerBoxScoreScraper, TeamTotals, TeamTotalsScraper};
pub use layout::{BoxScoreLayout, RESERVES, STARTERS};
pub use schedule::ScheduleScraper;

pub const BASE_URL: &str = "https://www.basketball-reference.com";

/// Extracts the team code from a franchise link (`/teams/BOS/2024.html` -> `BOS`).
///
/// Returns `None` for anything that is not a franchise link, such as the
/// all-star "teams".
pub(crate) fn team_code(href: &str) -> Option<String> {
    let code = href.strip_prefix("/teams/")?.split('/').next()?;
    let valid = code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
    valid.then(|| code.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_code() {
        assert_eq!(team_code("/teams/BOS/2024.html").as_deref(), Some("BOS"));
        assert_eq!(team_code("/teams/PHO/2024.html").as_deref(), Some("PHO"));
        assert_eq!(team_code("/allstar/NBA_2024.html"), None);
        assert_eq!(team_code("/teams/lebron/2024.html"), None);
    }
}
