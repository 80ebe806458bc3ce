pub mod error;

pub use error::{PluginPageError, Result};

use std::sync::LazyLock;
use std::time::Duration;

use scraper::{Html, Selector};

const DEFAULT_BASE_URL: &str = "https://www.facebook.com";

/// The plugin renders the follower line inside `<div class="_1drq">`.
static FOLLOWERS_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div._1drq").expect("valid selector"));

pub struct PluginPageClient {
    client: reqwest::Client,
    base_url: String,
}

impl PluginPageClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build the embeddable page-plugin URL for a profile.
    pub fn plugin_url(&self, profile_url: &str) -> Result<url::Url> {
        let mut url = url::Url::parse(&format!("{}/plugins/page.php", self.base_url))?;
        url.query_pairs_mut()
            .append_pair("href", profile_url)
            .append_pair("tabs", "timeline")
            .append_pair("width", "340")
            .append_pair("height", "500")
            .append_pair("small_header", "false")
            .append_pair("adapt_container_width", "true")
            .append_pair("hide_cover", "false")
            .append_pair("show_facepile", "true");
        Ok(url)
    }

    /// Fetch the plugin page for a profile and return its follower line as
    /// displayed, e.g. "12,345 followers".
    pub async fn followers(&self, profile_url: &str) -> Result<String> {
        let url = self.plugin_url(profile_url)?;
        tracing::debug!(%url, "plugin page: fetching followers");

        let resp = self.client.get(url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(PluginPageError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let html = resp.text().await?;
        parse_followers(&html)
            .ok_or_else(|| PluginPageError::Parse("no follower element in plugin page".into()))
    }
}

/// Extract the text of the follower element from plugin page HTML.
pub fn parse_followers(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let element = document.select(&FOLLOWERS_SELECTOR).next()?;
    let text = element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ");
    (!text.is_empty()).then_some(text)
}
