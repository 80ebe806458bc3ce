use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

// --- Captured traffic ---

/// One network exchange intercepted by the browser while the profile page
/// scrolls. Appended by the browser, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawExchange {
    pub url: String,
    #[serde(default)]
    pub response_body: Option<Vec<u8>>,
    #[serde(default)]
    pub response_available: bool,
}

impl RawExchange {
    /// An exchange whose response has landed.
    pub fn with_body(url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            url: url.into(),
            response_body: Some(body.into()),
            response_available: true,
        }
    }

    /// An exchange still waiting on its response.
    pub fn pending(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            response_body: None,
            response_available: false,
        }
    }

    /// Response body if the response is available and non-empty.
    pub fn body(&self) -> Option<&[u8]> {
        if !self.response_available {
            return None;
        }
        self.response_body.as_deref().filter(|b| !b.is_empty())
    }
}

// --- Normalized posts ---

/// How a post surfaced on the crawled timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostContext {
    /// Authored directly on the timeline.
    Organic,
    /// Re-share wrapping another story.
    Shared,
}

impl PostContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostContext::Organic => "organic",
            PostContext::Shared => "shared",
        }
    }
}

impl std::fmt::Display for PostContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a post's reaction breakdown, in the order the API ranked it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    #[serde(rename = "type")]
    pub kind: String,
    pub count: u64,
}

/// A post extracted from captured traffic. `post_id` is unique per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    pub post_id: String,
    /// Epoch seconds.
    pub creation_time: i64,
    pub caption: String,
    pub reaction_count: u64,
    pub comment_count: u64,
    pub share_count: u64,
    pub top_reactions: Vec<Reaction>,
    /// `None` when the post carries no video, as opposed to a video with zero views.
    pub video_view_count: Option<u64>,
    pub context: PostContext,
    /// Profile the post belongs to; differs from the crawled target on re-shares.
    pub owning_profile: Option<String>,
}

impl PostRecord {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.creation_time, 0).single()
    }
}

// --- Session outcome ---

/// Why the scroll loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The oldest post seen is at least `days_limit` days old.
    DaysLimit,
    /// The oldest-post estimate stopped moving across consecutive checks.
    Plateau,
    /// The hard scroll ceiling was reached.
    ScrollCeiling,
}
