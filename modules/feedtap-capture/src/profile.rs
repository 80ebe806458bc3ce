// Static profile scraper: reads the intro tiles out of the rendered profile
// HTML and, for pages, the follower count from the page plugin.

use std::sync::LazyLock;

use anyhow::Result;
use async_trait::async_trait;
use plugin_page_client::PluginPageClient;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::traits::ProfileScraper;

static TILES_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"div[data-pagelet="ProfileTilesFeed_0"]"#).expect("valid selector")
});

/// Leading tile texts that are section headings, not profile facts.
const HEADING_TEXTS: usize = 2;

/// Summary entries marking the target as a page rather than a personal account.
const PAGE_MARKERS: &[&str] = &["Page", "粉絲專頁"];

pub struct HtmlProfileScraper {
    plugin: Option<PluginPageClient>,
    profile_base_url: String,
}

impl HtmlProfileScraper {
    pub fn new(profile_base_url: impl Into<String>, plugin: Option<PluginPageClient>) -> Self {
        Self {
            plugin,
            profile_base_url: profile_base_url.into(),
        }
    }
}

#[async_trait]
impl ProfileScraper for HtmlProfileScraper {
    async fn profile_summary(&self, target_id: &str, page_source: &str) -> Result<Vec<String>> {
        let mut summary = profile_tiles(page_source)
            .ok_or_else(|| anyhow::anyhow!("no profile tiles block in page source"))?;

        if is_page(&summary) {
            if let Some(plugin) = &self.plugin {
                let profile_url = format!("{}{}", self.profile_base_url, target_id);
                match plugin.followers(&profile_url).await {
                    Ok(followers) => summary.push(followers),
                    Err(e) => warn!(target_id, error = %e, "profile: follower lookup failed"),
                }
            }
        }

        debug!(target_id, lines = summary.len(), "profile: summary scraped");
        Ok(summary)
    }
}

/// Text lines of the profile tiles block, headings dropped.
pub fn profile_tiles(html: &str) -> Option<Vec<String>> {
    let document = Html::parse_document(html);
    let tiles = document.select(&TILES_SELECTOR).next()?;

    Some(
        visible_text(tiles)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .skip(HEADING_TEXTS)
            .map(str::to_string)
            .collect(),
    )
}

pub fn is_page(summary: &[String]) -> bool {
    summary.iter().any(|line| {
        PAGE_MARKERS
            .iter()
            .any(|m| line == m || line.starts_with(&format!("{m} ·")))
    })
}

/// Text nodes under `root` in document order, minus script and style bodies.
fn visible_text<'a>(root: ElementRef<'a>) -> impl Iterator<Item = &'a str> {
    root.descendants().filter_map(|node| {
        let text = node.value().as_text()?;
        let hidden = node
            .ancestors()
            .filter_map(|a| a.value().as_element())
            .any(|e| matches!(e.name(), "script" | "style" | "noscript"));
        (!hidden).then_some(&**text)
    })
}
