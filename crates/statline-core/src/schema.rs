//! Schema drift guard.
//!
//! Every table parser extracts fields by column position. Before any row is
//! read, the scraped header cells are compared against the layout the parser
//! was written for; the first positional mismatch aborts the parse with a
//! [`SchemaDriftError`] instead of silently mis-assigning columns.
//!
//! Pages with several header blocks (a "Starters" header and a later
//! "Reserves" separator row, for instance) check each block on its own.

use scraper::ElementRef;

use crate::document::{element_text, selector};
use crate::error::{AppError, SchemaDriftError};
use crate::util::clean_text;

/// A named, ordered list of column labels a parser depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedHeaders {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

impl ExpectedHeaders {
    pub const fn new(name: &'static str, columns: &'static [&'static str]) -> Self {
        Self { name, columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of a label, for parsers that want to name their offsets.
    pub fn position(&self, label: &str) -> Option<usize> {
        self.columns.iter().position(|c| *c == label)
    }

    pub fn check<I, S>(&self, actual: I, origin: &HeaderOrigin) -> Result<(), SchemaDriftError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        check_headers(self, actual, origin)
    }
}

/// Where a header row was scraped from, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderOrigin {
    pub url: String,
    pub selector: String,
}

impl HeaderOrigin {
    pub fn new(url: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            selector: selector.into(),
        }
    }
}

/// Compares scraped header labels against `expected`, position by position.
///
/// Stops at the first differing position; later cells are never read. A
/// column missing from `actual` or an extra trailing column in `actual` is
/// reported the same way, with the absent side as an empty label.
pub fn check_headers<I, S>(
    expected: &ExpectedHeaders,
    actual: I,
    origin: &HeaderOrigin,
) -> Result<(), SchemaDriftError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let drift = |index: usize, expected_label: &str, actual_label: String| SchemaDriftError {
        table: expected.name.to_string(),
        index,
        expected: expected_label.to_string(),
        actual: actual_label,
        url: origin.url.clone(),
        selector: origin.selector.clone(),
    };

    let mut actual = actual.into_iter();
    for (index, want) in expected.columns.iter().copied().enumerate() {
        match actual.next() {
            Some(label) => {
                let got = clean_text(label.as_ref());
                if got != want {
                    return Err(drift(index, want, got));
                }
            }
            None => return Err(drift(index, want, String::new())),
        }
    }

    if let Some(extra) = actual.next() {
        return Err(drift(
            expected.columns.len(),
            "",
            clean_text(extra.as_ref()),
        ));
    }

    Ok(())
}

/// Runs [`check_headers`] over the `th`/`td` cells of a scraped row, in
/// document order.
pub fn check_header_row(
    expected: &ExpectedHeaders,
    row: ElementRef<'_>,
    origin: &HeaderOrigin,
) -> Result<(), AppError> {
    let cells = selector("th, td")?;
    check_headers(expected, row.select(&cells).map(element_text), origin)?;
    Ok(())
}
