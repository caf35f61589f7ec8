use scraper::{ElementRef, Html, Selector};

use crate::error::AppError;
use crate::util::clean_text;

/// A fully rendered page, serialized to HTML.
///
/// The markup is kept as a `String` so a document can be moved between
/// tasks; call [`Document::parse`] to get a queryable tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    url: String,
    html: String,
}

impl Document {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn len(&self) -> usize {
        self.html.len()
    }

    pub fn is_empty(&self) -> bool {
        self.html.is_empty()
    }

    pub fn parse(&self) -> Html {
        Html::parse_document(&self.html)
    }

    /// Returns true if `css` matches at least one element.
    pub fn contains(&self, css: &str) -> Result<bool, AppError> {
        let sel = selector(css)?;
        Ok(self.parse().select(&sel).next().is_some())
    }
}

/// Parses a CSS selector, mapping failures into [`AppError::InvalidSelector`].
pub fn selector(css: &str) -> Result<Selector, AppError> {
    Selector::parse(css).map_err(|e| AppError::InvalidSelector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}

/// Whitespace-normalized text content of an element.
pub fn element_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<String>())
}

/// Text of the first descendant matching `sel`, if any.
pub fn select_text(element: ElementRef<'_>, sel: &Selector) -> Option<String> {
    element.select(sel).next().map(element_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_selector() {
        let doc = Document::new(
            "https://example.com",
            "<html><body><div id=\"content\"><p>hi</p></div></body></html>",
        );
        assert!(doc.contains("#content p").unwrap());
        assert!(!doc.contains("table").unwrap());
    }

    #[test]
    fn test_invalid_selector_is_reported() {
        let err = selector("div[").unwrap_err();
        assert!(matches!(err, AppError::InvalidSelector { .. }));
    }

    #[test]
    fn test_element_text_normalizes_whitespace() {
        let html = Html::parse_fragment("<div>  Jayson\n   <b>Tatum</b>\u{a0}</div>");
        let div = selector("div").unwrap();
        let cell = html.select(&div).next().unwrap();
        assert_eq!(element_text(cell), "Jayson Tatum");
    }
}
