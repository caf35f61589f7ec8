use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use statline_core::config::RetrieverConfig;
use statline_core::document::{Document, selector};
use statline_core::error::{AppError, RetrievalError};
use statline_core::models::HeaderProfile;
use statline_core::traits::DocumentRetriever;

/// How often the DOM is probed for the readiness selector.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Headless-browser retriever using Chromium via the Chrome DevTools Protocol.
///
/// Unlike [`super::HttpRetriever`], this renders JavaScript before returning
/// the HTML, which box-score pages that fill their tables client-side need.
///
/// A single Chromium process is shared across all clones of this struct;
/// each [`DocumentRetriever::retrieve`] call opens a new tab, waits for the
/// readiness selector, grabs the rendered HTML, and closes the tab whether
/// or not the wait succeeded.
///
/// # Example
///
/// ```rust,no_run
/// use statline_client::BrowserRetriever;
/// use statline_core::config::RetrieverConfig;
/// use statline_core::models::HeaderProfile;
/// use statline_core::traits::DocumentRetriever;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let retriever = BrowserRetriever::launch(RetrieverConfig::default()).await?;
/// let doc = retriever
///     .retrieve("https://example.com", &HeaderProfile::desktop_chrome(), "h1")
///     .await?;
/// println!("{} bytes", doc.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BrowserRetriever {
    browser: Arc<Browser>,
    config: RetrieverConfig,
}

impl BrowserRetriever {
    /// Launches a headless Chromium browser.
    ///
    /// Requires a Chromium / Chrome binary reachable via `$PATH`, `CHROME_BIN`,
    /// or the default locations checked by `chromiumoxide`.
    pub async fn launch(config: RetrieverConfig) -> Result<Self, AppError> {
        let mut builder = BrowserConfig::builder();
        builder = builder.no_sandbox().disable_default_args();

        // The snap wrapper at /snap/bin/chromium drops unknown flags, so look
        // for the real binary first.
        if let Some(bin) = Self::find_chrome_binary() {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        let browser_config = builder
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--no-first-run")
            .build()
            .map_err(|e| AppError::ConfigError(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| AppError::Generic(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        Ok(Self {
            browser: Arc::new(browser),
            config,
        })
    }

    fn find_chrome_binary() -> Option<PathBuf> {
        let candidates: &[&str] = &[
            "/snap/chromium/current/usr/lib/chromium-browser/chrome",
            "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
        ];

        if let Ok(p) = std::env::var("CHROME_BIN") {
            let path = PathBuf::from(&p);
            if path.exists() {
                return Some(path);
            }
        }

        candidates.iter().map(PathBuf::from).find(|p| p.exists())
    }

    /// Opens a tab into `tab`, navigates it and blocks until `ready_selector`
    /// is in the DOM. Unbounded on its own; the caller wraps it in the
    /// configured timeout and closes the tab.
    async fn render(
        &self,
        tab: &mut Tab,
        url: &str,
        headers: &HeaderProfile,
        ready_selector: &str,
    ) -> Result<String, RetrievalError> {
        let failed = |e: CdpError| RetrievalError::NavigationFailed {
            url: url.to_string(),
            message: e.to_string(),
        };
        let stage = Instant::now();

        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| RetrievalError::NavigationFailed {
                url: url.to_string(),
                message: format!("Failed to open tab: {e}"),
            })?;
        let page = tab.page.insert(page);

        if let Some(ua) = headers.user_agent() {
            page.set_user_agent(ua).await.map_err(failed)?;
        }
        let extra: serde_json::Map<String, serde_json::Value> = headers
            .iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case("user-agent"))
            .map(|(name, value)| (name.to_string(), serde_json::Value::from(value)))
            .collect();
        if !extra.is_empty() {
            page.execute(SetExtraHttpHeadersParams::new(Headers::new(
                serde_json::Value::Object(extra),
            )))
            .await
            .map_err(failed)?;
        }

        page.goto(url).await.map_err(failed)?;
        if self.config.debug {
            tracing::info!(%url, elapsed = ?stage.elapsed(), "Navigation finished");
        }

        // Chromium lands on its own error page for DNS/TLS failures it renders itself.
        if let Ok(Some(landed)) = page.url().await {
            if landed.starts_with("chrome-error://") {
                return Err(RetrievalError::EmptyDocument {
                    url: url.to_string(),
                    selector: ready_selector.to_string(),
                });
            }
        }

        while page.find_element(ready_selector).await.is_err() {
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
        if self.config.debug {
            tracing::info!(%url, %ready_selector, elapsed = ?stage.elapsed(), "Ready selector found");
        }

        page.content().await.map_err(failed)
    }
}

impl DocumentRetriever for BrowserRetriever {
    async fn retrieve(
        &self,
        url: &str,
        headers: &HeaderProfile,
        ready_selector: &str,
    ) -> Result<Document, RetrievalError> {
        check_ready_selector(url, ready_selector)?;
        let timeout = self.config.timeout;

        let mut tab = Tab::default();
        let rendered =
            tokio::time::timeout(timeout, self.render(&mut tab, url, headers, ready_selector))
                .await;
        tab.close(url).await;

        let html = match rendered {
            Ok(inner) => inner?,
            Err(_) => {
                return Err(RetrievalError::Timeout {
                    url: url.to_string(),
                    after: timeout,
                });
            }
        };

        if self.config.debug {
            tracing::info!(%url, bytes = html.len(), "Rendered page");
        }

        Ok(Document::new(url, html))
    }
}

/// The tab opened for one retrieval.
///
/// [`Tab::close`] is the normal exit. If the retrieval future is dropped
/// before reaching it (the run was cancelled), `Drop` hands the page to a
/// background task that closes it.
#[derive(Default)]
struct Tab {
    page: Option<Page>,
}

impl Tab {
    async fn close(&mut self, url: &str) {
        let Some(page) = self.page.clone() else {
            return;
        };
        if let Err(e) = page.close().await {
            tracing::debug!(%url, error = %e, "Failed to close tab");
        }
        self.page = None;
    }
}

impl Drop for Tab {
    fn drop(&mut self) {
        let Some(page) = self.page.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = page.close().await {
                        tracing::debug!(error = %e, "Failed to close abandoned tab");
                    }
                });
            }
            Err(_) => tracing::warn!("No runtime left to close abandoned tab"),
        }
    }
}

/// A selector CDP cannot evaluate would otherwise poll until the timeout.
fn check_ready_selector(url: &str, ready_selector: &str) -> Result<(), RetrievalError> {
    selector(ready_selector).map(drop).map_err(|e| {
        tracing::warn!(%url, error = %e, "Unusable ready selector");
        RetrievalError::EmptyDocument {
            url: url.to_string(),
            selector: ready_selector.to_string(),
        }
    })
}
