use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use feedtap_common::RawExchange;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::info;

use crate::traits::BrowserSession;

/// One line of a recorded capture file. Bodies are stored as text.
#[derive(Debug, Deserialize)]
struct RecordedExchange {
    url: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default = "default_available")]
    response_available: bool,
}

fn default_available() -> bool {
    true
}

impl From<RecordedExchange> for RawExchange {
    fn from(r: RecordedExchange) -> Self {
        RawExchange {
            url: r.url,
            response_body: r.body.map(String::into_bytes),
            response_available: r.response_available,
        }
    }
}

#[derive(Debug, Default)]
struct Cursor {
    /// First recorded exchange still in the buffer.
    window_start: usize,
    /// One past the last revealed exchange.
    revealed: usize,
}

/// Replays a recorded capture as if a live browser were scrolling. No network.
///
/// `navigate` and each `scroll` reveal the next `batch_size` recorded
/// exchanges, and `clear_exchanges` drops whatever has been revealed so far.
/// Navigation never rewinds: after a clear, the next target picks up where
/// the recording left off and cleared traffic stays out of its buffer.
pub struct ReplayBrowser {
    recorded: Vec<RawExchange>,
    page_source: String,
    batch_size: usize,
    cursor: Mutex<Cursor>,
}

impl ReplayBrowser {
    pub fn new(recorded: Vec<RawExchange>, page_source: String, batch_size: usize) -> Self {
        Self {
            recorded,
            page_source,
            batch_size: batch_size.max(1),
            cursor: Mutex::new(Cursor::default()),
        }
    }

    /// Load a JSON-lines capture file.
    pub fn from_file(path: &Path, page_source: String, batch_size: usize) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read capture file {}", path.display()))?;
        let recorded = parse_capture(&text)
            .with_context(|| format!("Invalid capture file {}", path.display()))?;
        info!(path = %path.display(), exchanges = recorded.len(), "replay: capture loaded");
        Ok(Self::new(recorded, page_source, batch_size))
    }

    pub fn len(&self) -> usize {
        self.recorded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recorded.is_empty()
    }

    fn reveal(&self, cursor: &mut Cursor) {
        cursor.revealed = (cursor.revealed + self.batch_size).min(self.recorded.len());
    }
}

/// Parse JSON lines into exchanges. Blank lines are ignored.
pub fn parse_capture(text: &str) -> Result<Vec<RawExchange>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str::<RecordedExchange>(line)
                .map(RawExchange::from)
                .with_context(|| format!("line {}", i + 1))
        })
        .collect()
}

#[async_trait]
impl BrowserSession for ReplayBrowser {
    async fn navigate(&self, _url: &str) -> Result<()> {
        let mut cursor = self.cursor.lock().await;
        self.reveal(&mut cursor);
        Ok(())
    }

    async fn scroll(&self) -> Result<()> {
        let mut cursor = self.cursor.lock().await;
        self.reveal(&mut cursor);
        Ok(())
    }

    async fn page_source(&self) -> Result<String> {
        Ok(self.page_source.clone())
    }

    async fn exchanges(&self) -> Result<Vec<RawExchange>> {
        let cursor = self.cursor.lock().await;
        Ok(self.recorded[cursor.window_start..cursor.revealed].to_vec())
    }

    async fn clear_exchanges(&self) -> Result<()> {
        let mut cursor = self.cursor.lock().await;
        cursor.window_start = cursor.revealed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CAPTURE: &str = r#"
{"url": "https://www.facebook.com/api/graphql/", "body": "{\"data\":{}}"}
{"url": "https://www.facebook.com/ajax/route/", "body": "x"}

{"url": "https://www.facebook.com/api/graphql/", "response_available": false}
"#;

    #[test]
    fn parses_lines_and_defaults() {
        let exchanges = parse_capture(CAPTURE).unwrap();
        assert_eq!(exchanges.len(), 3);
        assert_eq!(exchanges[0].body(), Some(&b"{\"data\":{}}"[..]));
        assert!(exchanges[2].response_body.is_none());
        assert!(!exchanges[2].response_available);
    }

    #[test]
    fn bad_line_reports_its_number() {
        let err = parse_capture("{\"url\": \"a\"}\nnot json").unwrap_err();
        assert_eq!(err.to_string(), "line 2");
    }

    #[tokio::test]
    async fn scroll_reveals_batches_and_clear_drops_window() {
        let browser = ReplayBrowser::new(parse_capture(CAPTURE).unwrap(), String::new(), 2);

        assert!(browser.exchanges().await.unwrap().is_empty());
        browser.navigate("https://www.facebook.com/x").await.unwrap();
        assert_eq!(browser.exchanges().await.unwrap().len(), 2);

        browser.scroll().await.unwrap();
        browser.scroll().await.unwrap();
        assert_eq!(browser.exchanges().await.unwrap().len(), 3);

        browser.clear_exchanges().await.unwrap();
        assert!(browser.exchanges().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn navigate_after_clear_keeps_cleared_traffic_out() {
        let browser = ReplayBrowser::new(parse_capture(CAPTURE).unwrap(), String::new(), 2);
        browser.navigate("https://www.facebook.com/a").await.unwrap();
        browser.clear_exchanges().await.unwrap();

        browser.navigate("https://www.facebook.com/b").await.unwrap();

        let exchanges = browser.exchanges().await.unwrap();
        assert_eq!(exchanges.len(), 1);
        assert!(!exchanges[0].response_available);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CAPTURE.as_bytes()).unwrap();
        let browser = ReplayBrowser::from_file(file.path(), String::new(), 5).unwrap();
        assert_eq!(browser.len(), 3);
    }
}
