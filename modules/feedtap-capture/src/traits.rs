// Collaborator seams for the capture pipeline.
//
// BrowserSession: the automated browser driving the profile page and
// recording the network traffic it generates.
// ProfileScraper: best-effort static profile chrome (intro tiles, followers).
//
// Both sit behind traits so the pipeline runs against ScriptedBrowser and
// ReplayBrowser without a live browser.

use anyhow::Result;
use async_trait::async_trait;
use feedtap_common::RawExchange;

#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Load a page. Traffic from the load lands in the exchange buffer.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// One discrete scroll step. The page may or may not fetch more content.
    async fn scroll(&self) -> Result<()>;

    /// Current rendered HTML.
    async fn page_source(&self) -> Result<String>;

    /// Snapshot of the exchange buffer in arrival order. The buffer keeps
    /// growing in the background; a snapshot reflects whatever has landed.
    async fn exchanges(&self) -> Result<Vec<RawExchange>>;

    /// Drop buffered exchanges. Only eventually effective; callers recheck.
    async fn clear_exchanges(&self) -> Result<()>;
}

#[async_trait]
pub trait ProfileScraper: Send + Sync {
    /// Visible profile summary lines, followed by the follower count when the
    /// target is a page.
    async fn profile_summary(&self, target_id: &str, page_source: &str) -> Result<Vec<String>>;
}
