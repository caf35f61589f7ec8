use statline_core::schema::ExpectedHeaders;

/// Header row of the starters block in a "Basic Box Score Stats" table.
pub const STARTERS: ExpectedHeaders = ExpectedHeaders::new(
    "starters",
    &[
        "Starters", "MP", "FG", "FGA", "FG%", "3P", "3PA", "3P%", "FT", "FTA", "FT%", "ORB", "DRB",
        "TRB", "AST", "STL", "BLK", "TOV", "PF", "PTS", "GmSc", "+/-",
    ],
);

/// Separator row opening the reserves block of the same table.
pub const RESERVES: ExpectedHeaders = ExpectedHeaders::new(
    "reserves",
    &[
        "Reserves", "MP", "FG", "FGA", "FG%", "3P", "3PA", "3P%", "FT", "FTA", "FT%", "ORB", "DRB",
        "TRB", "AST", "STL", "BLK", "TOV", "PF", "PTS", "GmSc", "+/-",
    ],
);

// Column offsets shared by both blocks and the team totals row.
pub(crate) const PLAYER: usize = 0;
pub(crate) const MP: usize = 1;
pub(crate) const FG: usize = 2;
pub(crate) const FGA: usize = 3;
pub(crate) const FG3: usize = 5;
pub(crate) const FG3A: usize = 6;
pub(crate) const FT: usize = 8;
pub(crate) const FTA: usize = 9;
pub(crate) const ORB: usize = 11;
pub(crate) const DRB: usize = 12;
pub(crate) const TRB: usize = 13;
pub(crate) const AST: usize = 14;
pub(crate) const STL: usize = 15;
pub(crate) const BLK: usize = 16;
pub(crate) const TOV: usize = 17;
pub(crate) const PF: usize = 18;
pub(crate) const PTS: usize = 19;
pub(crate) const GMSC: usize = 20;
pub(crate) const PLUS_MINUS: usize = 21;

/// The header layouts a box-score parser validates before reading rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxScoreLayout {
    pub starters: ExpectedHeaders,
    pub reserves: ExpectedHeaders,
}

impl Default for BoxScoreLayout {
    fn default() -> Self {
        Self {
            starters: STARTERS,
            reserves: RESERVES,
        }
    }
}
