/// Smoke-test for `BrowserRetriever`.
///
/// Launches a headless Chromium, retrieves <https://example.com> once its
/// `<h1>` is present, and verifies the rendered HTML.
///
/// Run with:
///   cargo run -p statline-client --example browser_smoke --features browser
use statline_client::BrowserRetriever;
use statline_core::config::RetrieverConfig;
use statline_core::models::HeaderProfile;
use statline_core::traits::DocumentRetriever;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    println!("Launching headless browser…");
    let retriever =
        BrowserRetriever::launch(RetrieverConfig::default().with_debug(true)).await?;

    let url = "https://example.com";
    println!("Retrieving {url} …");
    let doc = retriever
        .retrieve(url, &HeaderProfile::desktop_chrome(), "h1")
        .await?;

    assert!(
        doc.html().contains("<h1>Example Domain</h1>"),
        "Expected <h1> not found in rendered HTML"
    );

    println!("OK: got {} bytes of rendered HTML", doc.len());
    Ok(())
}
