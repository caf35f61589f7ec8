#[cfg(feature = "browser")]
pub mod browser_retriever;
pub mod http_retriever;

#[cfg(feature = "browser")]
pub use browser_retriever::BrowserRetriever;
pub use http_retriever::HttpRetriever;
