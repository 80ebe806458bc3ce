// Test doubles and fixtures for the capture pipeline.
//
// - ScriptedBrowser (BrowserSession): exchange buffer grows by one scripted
//   batch per scroll; clears can be made to fail a set number of times.
// - StaticProfileScraper (ProfileScraper): canned summary or canned failure.
// - GraphQL fixture builders producing the envelope shapes the extractor reads.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feedtap_common::RawExchange;
use serde_json::{json, Value};

use crate::traits::{BrowserSession, ProfileScraper};

pub const GRAPHQL_URL: &str = "https://www.facebook.com/api/graphql/";

// ---------------------------------------------------------------------------
// ScriptedBrowser
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ScriptState {
    buffer: Vec<RawExchange>,
    on_navigate: Vec<RawExchange>,
    scroll_batches: VecDeque<Vec<RawExchange>>,
    repeat_last_batch: bool,
    sticky_clears: u32,
    page_source: String,
    failing_reads: HashSet<u32>,
    navigations: Vec<String>,
    scrolls: u32,
    clears: u32,
    reads: u32,
}

/// Scripted browser. Builder pattern: `.preloaded()`, `.on_navigate()`,
/// `.on_scroll()`, `.repeat_last_batch()`, `.sticky_clears()`,
/// `.with_page_source()`, `.failing_reads()`.
#[derive(Default)]
pub struct ScriptedBrowser {
    state: Mutex<ScriptState>,
}

impl ScriptedBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Traffic already in the buffer before the session starts.
    pub fn preloaded(self, exchanges: Vec<RawExchange>) -> Self {
        self.state.lock().unwrap().buffer = exchanges;
        self
    }

    /// Traffic appended by every `navigate`.
    pub fn on_navigate(self, exchanges: Vec<RawExchange>) -> Self {
        self.state.lock().unwrap().on_navigate = exchanges;
        self
    }

    /// Traffic appended by the next unscripted scroll. Scrolls past the script
    /// append nothing unless `repeat_last_batch` is set.
    pub fn on_scroll(self, exchanges: Vec<RawExchange>) -> Self {
        self.state.lock().unwrap().scroll_batches.push_back(exchanges);
        self
    }

    /// Keep re-appending the final batch, like a feed re-requesting its last page.
    pub fn repeat_last_batch(self) -> Self {
        self.state.lock().unwrap().repeat_last_batch = true;
        self
    }

    /// The first `n` clears leave the buffer untouched.
    pub fn sticky_clears(self, n: u32) -> Self {
        self.state.lock().unwrap().sticky_clears = n;
        self
    }

    pub fn with_page_source(self, html: &str) -> Self {
        self.state.lock().unwrap().page_source = html.to_string();
        self
    }

    /// The listed `exchanges()` calls (1-based, counted across the browser's
    /// lifetime) fail instead of returning the buffer.
    pub fn failing_reads(self, calls: impl IntoIterator<Item = u32>) -> Self {
        self.state.lock().unwrap().failing_reads.extend(calls);
        self
    }

    pub fn scroll_count(&self) -> u32 {
        self.state.lock().unwrap().scrolls
    }

    pub fn clear_count(&self) -> u32 {
        self.state.lock().unwrap().clears
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }
}

#[async_trait]
impl BrowserSession for ScriptedBrowser {
    async fn navigate(&self, url: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.navigations.push(url.to_string());
        let loaded = state.on_navigate.clone();
        state.buffer.extend(loaded);
        Ok(())
    }

    async fn scroll(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.scrolls += 1;
        let batch = if state.scroll_batches.len() > 1 || !state.repeat_last_batch {
            state.scroll_batches.pop_front()
        } else {
            state.scroll_batches.front().cloned()
        };
        if let Some(batch) = batch {
            state.buffer.extend(batch);
        }
        Ok(())
    }

    async fn page_source(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().page_source.clone())
    }

    async fn exchanges(&self) -> Result<Vec<RawExchange>> {
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        if state.failing_reads.contains(&state.reads) {
            bail!("ScriptedBrowser: scripted read failure on call {}", state.reads);
        }
        Ok(state.buffer.clone())
    }

    async fn clear_exchanges(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.clears += 1;
        if state.sticky_clears > 0 {
            state.sticky_clears -= 1;
        } else {
            state.buffer.clear();
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StaticProfileScraper
// ---------------------------------------------------------------------------

pub struct StaticProfileScraper {
    summary: Option<Vec<String>>,
}

impl StaticProfileScraper {
    pub fn new(summary: &[&str]) -> Self {
        Self {
            summary: Some(summary.iter().map(|s| s.to_string()).collect()),
        }
    }

    pub fn failing() -> Self {
        Self { summary: None }
    }
}

#[async_trait]
impl ProfileScraper for StaticProfileScraper {
    async fn profile_summary(&self, _target_id: &str, _page_source: &str) -> Result<Vec<String>> {
        match &self.summary {
            Some(summary) => Ok(summary.clone()),
            None => bail!("StaticProfileScraper: scripted failure"),
        }
    }
}

// ---------------------------------------------------------------------------
// GraphQL fixtures
// ---------------------------------------------------------------------------

/// Epoch seconds exactly `days` days before `now`.
pub fn days_ago(now: DateTime<Utc>, days: i64) -> i64 {
    now.timestamp() - days * 86_400
}

/// A timeline story with the nesting the live feed uses.
pub fn story_node(post_id: &str, creation_time: i64) -> Value {
    json!({
        "__typename": "Story",
        "post_id": post_id,
        "comet_sections": {
            "content": {"story": {"message": {"text": format!("caption for {post_id}")}}},
            "context_layout": {"story": {"comet_sections": {"metadata": [
                {"__typename": "CometFeedStoryMinimizedTimestampStrategy",
                 "story": {"creation_time": creation_time}}
            ]}}},
            "feedback": {"story": {"feedback_context": {"feedback_target_with_context": {
                "id": format!("feedback:{post_id}"),
                "subscription_target_id": post_id,
                "reaction_count": {"count": 10},
                "share_count": {"count": 2},
                "comment_rendering_instance": {"comments": {"total_count": 4}},
                "video_view_count": null,
                "top_reactions": {"edges": [
                    {"reaction_count": 7, "node": {"localized_name": "Like"}},
                    {"reaction_count": 3, "node": {"localized_name": "Love"}}
                ]}
            }}}}
        },
        "owning_profile": {"__typename": "User", "id": "100001"}
    })
}

/// A timeline page envelope holding the given stories as edges.
pub fn feed_envelope(stories: Vec<Value>) -> Value {
    let edges: Vec<Value> = stories
        .into_iter()
        .map(|node| json!({"node": node, "cursor": "c"}))
        .collect();
    json!({"data": {"node": {
        "__typename": "User",
        "id": "100001",
        "timeline_list_feed_units": {"edges": edges, "page_info": {"has_next_page": true}}
    }}})
}

/// A deferred single-story envelope.
pub fn single_post_envelope(post_id: &str, creation_time: i64) -> Value {
    json!({
        "label": "ProfileCometTimelineFeed_user$stream$ProfileCometTimelineFeed_user_timeline_list_feed_units",
        "path": ["node", "timeline_list_feed_units", "edges", 1],
        "data": {"node": story_node(post_id, creation_time)}
    })
}

/// A GraphQL exchange whose body carries the documents newline-joined.
pub fn graphql_exchange(documents: &[Value]) -> RawExchange {
    let body = documents
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join("\n");
    RawExchange::with_body(GRAPHQL_URL, body.into_bytes())
}

/// Unrelated traffic of the kind that dominates a real capture.
pub fn noise_exchange() -> RawExchange {
    RawExchange::with_body(
        "https://www.facebook.com/ajax/bulk-route-definitions/",
        br#"for (;;);{"payload":{}}"#.to_vec(),
    )
}
