pub mod config;
pub mod document;
pub mod error;
pub mod models;
pub mod runner;
pub mod schema;
pub mod traits;
pub mod util;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use config::{RetrieverConfig, RunnerConfig};
pub use document::Document;
pub use error::{AppError, FieldConversionError, RetrievalError, RunError, SchemaDriftError};
pub use models::{Envelope, Feed, HeaderProfile, Matchup, Provider, RunContext};
pub use runner::{EventDataRunner, MatchupRunner, RunOutcome};
pub use schema::{ExpectedHeaders, HeaderOrigin, check_headers};
pub use traits::{DocumentRetriever, EventDataScraper, MatchupScrape, MatchupScraper};
