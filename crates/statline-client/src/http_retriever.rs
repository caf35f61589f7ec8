use std::time::Instant;

use reqwest::Client;
use statline_core::config::RetrieverConfig;
use statline_core::document::Document;
use statline_core::error::{AppError, RetrievalError};
use statline_core::models::HeaderProfile;
use statline_core::traits::DocumentRetriever;
use url::Url;

/// Document retriever for server-rendered pages, using reqwest.
///
/// The page is considered ready when its body contains an element matching
/// the readiness selector; a page that loads without it is reported as
/// [`RetrievalError::EmptyDocument`]. Nothing is retried.
#[derive(Clone)]
pub struct HttpRetriever {
    client: Client,
    config: RetrieverConfig,
}

impl HttpRetriever {
    pub fn new() -> Result<Self, AppError> {
        Self::with_config(RetrieverConfig::default())
    }

    pub fn with_config(config: RetrieverConfig) -> Result<Self, AppError> {
        Self::build(config, false)
    }

    /// Like [`with_config`](Self::with_config), but ignores any system proxy
    /// settings (`HTTP_PROXY` and friends).
    pub fn direct(config: RetrieverConfig) -> Result<Self, AppError> {
        Self::build(config, true)
    }

    fn build(config: RetrieverConfig, no_proxy: bool) -> Result<Self, AppError> {
        let mut builder = Client::builder().timeout(config.timeout);
        if no_proxy {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn classify(&self, url: &str, e: reqwest::Error) -> RetrievalError {
        if e.is_timeout() {
            RetrievalError::Timeout {
                url: url.to_string(),
                after: self.config.timeout,
            }
        } else if e.is_connect() {
            RetrievalError::NavigationFailed {
                url: url.to_string(),
                message: format!("Connection failed: {e}"),
            }
        } else {
            RetrievalError::NavigationFailed {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    }
}

impl DocumentRetriever for HttpRetriever {
    async fn retrieve(
        &self,
        url: &str,
        headers: &HeaderProfile,
        ready_selector: &str,
    ) -> Result<Document, RetrievalError> {
        let parsed = parse_http_url(url)?;
        let started = Instant::now();

        let mut request = self.client.get(parsed);
        for (name, value) in headers.iter() {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(|e| self.classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RetrievalError::NavigationFailed {
                url: url.to_string(),
                message: format!("HTTP {}", status.as_u16()),
            });
        }

        let html = response.text().await.map_err(|e| self.classify(url, e))?;
        let document = Document::new(url, html);

        if self.config.debug {
            tracing::info!(
                %url,
                bytes = document.len(),
                elapsed = ?started.elapsed(),
                "Fetched page"
            );
        }

        match document.contains(ready_selector) {
            Ok(true) => Ok(document),
            Ok(false) => Err(RetrievalError::EmptyDocument {
                url: url.to_string(),
                selector: ready_selector.to_string(),
            }),
            Err(e) => {
                tracing::warn!(%url, error = %e, "Unusable ready selector");
                Err(RetrievalError::EmptyDocument {
                    url: url.to_string(),
                    selector: ready_selector.to_string(),
                })
            }
        }
    }
}

/// Only `http` and `https` URLs are navigable.
fn parse_http_url(url: &str) -> Result<Url, RetrievalError> {
    let parsed = Url::parse(url).map_err(|e| RetrievalError::NavigationFailed {
        url: url.to_string(),
        message: format!("Invalid URL: {e}"),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(RetrievalError::NavigationFailed {
            url: url.to_string(),
            message: format!("URL scheme '{scheme}' is not allowed (only http/https)"),
        }),
    }
}
