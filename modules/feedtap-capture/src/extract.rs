// Record classifier & extractor: envelope → normalized PostRecords.
//
// Envelopes fall into a closed set of recognized shapes. New GraphQL payload
// shapes are added as `EnvelopeShape` variants, nothing else branches on keys.
// Per-record failures are values (`RecordOutcome::Skipped`), never errors.

use feedtap_common::{PostContext, PostRecord, Reaction};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::envelope::Envelope;
use crate::walk::{as_id, find_feedback, find_key};

/// Connection fields holding a timeline page of stories.
/// Personal timelines use the first, page timelines the second.
const FEED_CONNECTIONS: &[&str] = &["timeline_list_feed_units", "timeline_feed_units"];

/// Why a candidate post was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("edge carries no story node")]
    MissingNode,

    #[error("story has no post id")]
    MissingPostId,

    #[error("story has no creation time")]
    MissingCreationTime,

    #[error("field {field} is not {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    FeedPage,
    SinglePost,
}

/// The recognized envelope shapes.
#[derive(Debug, Clone, Copy)]
pub enum EnvelopeShape<'a> {
    /// A timeline page: one edge per candidate story.
    FeedPage { edges: &'a [Value] },
    /// A single story, usually a lazily loaded feedback subtree.
    SinglePost { story: &'a Value },
}

impl<'a> EnvelopeShape<'a> {
    /// Classify an envelope. `None` means unrelated traffic, the common case.
    pub fn classify(envelope: &'a Envelope) -> Option<Self> {
        let node = data_node(envelope)?;

        for connection in FEED_CONNECTIONS {
            if let Some(edges) = node
                .get(*connection)
                .and_then(|c| c.get("edges"))
                .and_then(Value::as_array)
            {
                return Some(EnvelopeShape::FeedPage { edges });
            }
        }

        find_feedback(node).map(|_| EnvelopeShape::SinglePost { story: node })
    }

    pub fn kind(&self) -> ShapeKind {
        match self {
            EnvelopeShape::FeedPage { .. } => ShapeKind::FeedPage,
            EnvelopeShape::SinglePost { .. } => ShapeKind::SinglePost,
        }
    }

    pub fn extract(&self) -> Extraction {
        match self {
            EnvelopeShape::FeedPage { edges } => {
                Extraction::Feed(edges.iter().map(extract_edge).collect())
            }
            EnvelopeShape::SinglePost { story } => Extraction::Single(extract_story(story)),
        }
    }
}

/// `data.node`, the root every recognized shape hangs off.
pub(crate) fn data_node(envelope: &Envelope) -> Option<&Value> {
    envelope.pointer("/data/node").filter(|n| n.is_object())
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Extracted(PostRecord),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Feed(Vec<RecordOutcome>),
    Single(RecordOutcome),
}

impl Extraction {
    pub fn outcomes(self) -> Vec<RecordOutcome> {
        match self {
            Extraction::Feed(outcomes) => outcomes,
            Extraction::Single(outcome) => vec![outcome],
        }
    }

    /// Successfully extracted records, skips discarded.
    pub fn records(self) -> Vec<PostRecord> {
        self.outcomes()
            .into_iter()
            .filter_map(|o| match o {
                RecordOutcome::Extracted(record) => Some(record),
                RecordOutcome::Skipped(_) => None,
            })
            .collect()
    }
}

/// Classify an envelope and extract whatever posts it carries.
pub fn classify_and_extract(envelope: &Envelope) -> Option<Extraction> {
    EnvelopeShape::classify(envelope).map(|shape| shape.extract())
}

fn extract_edge(edge: &Value) -> RecordOutcome {
    match edge.get("node").filter(|n| n.is_object()) {
        Some(story) => extract_story(story),
        None => RecordOutcome::Skipped(SkipReason::MissingNode),
    }
}

fn extract_story(story: &Value) -> RecordOutcome {
    match story_record(story) {
        Ok(record) => RecordOutcome::Extracted(record),
        Err(reason) => RecordOutcome::Skipped(reason),
    }
}

fn story_record(story: &Value) -> Result<PostRecord, SkipReason> {
    let feedback = find_feedback(story);

    let post_id = match find_key(story, "post_id").filter(|v| !v.is_null()) {
        Some(v) => as_id(v).ok_or(SkipReason::InvalidField {
            field: "post_id",
            expected: "an id",
        })?,
        None => feedback
            .and_then(|f| f.get("subscription_target_id"))
            .and_then(as_id)
            .ok_or(SkipReason::MissingPostId)?,
    };

    let creation_time = match find_key(story, "creation_time").filter(|v| !v.is_null()) {
        Some(v) => v.as_i64().ok_or(SkipReason::InvalidField {
            field: "creation_time",
            expected: "an integer",
        })?,
        None => return Err(SkipReason::MissingCreationTime),
    };

    let caption = match find_key(story, "message").and_then(|m| m.get("text")) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(_) => {
            return Err(SkipReason::InvalidField {
                field: "message.text",
                expected: "a string",
            })
        }
    };

    let owning_profile = find_key(story, "owning_profile")
        .and_then(|p| p.get("id"))
        .and_then(as_id);

    let context = match find_key(story, "attached_story") {
        Some(v) if !v.is_null() => PostContext::Shared,
        _ => PostContext::Organic,
    };

    let counters = match feedback {
        Some(f) => Counters::from_feedback(f)?,
        None => Counters::default(),
    };

    Ok(PostRecord {
        post_id,
        creation_time,
        caption,
        reaction_count: counters.reactions,
        comment_count: counters.comments,
        share_count: counters.shares,
        top_reactions: counters.top_reactions,
        video_view_count: counters.video_views,
        context,
        owning_profile,
    })
}

#[derive(Debug, Default)]
struct Counters {
    reactions: u64,
    comments: u64,
    shares: u64,
    top_reactions: Vec<Reaction>,
    video_views: Option<u64>,
}

impl Counters {
    fn from_feedback(feedback: &Value) -> Result<Self, SkipReason> {
        Ok(Self {
            reactions: count_at(feedback, "/reaction_count/count", "reaction_count.count")?
                .unwrap_or(0),
            comments: count_at(
                feedback,
                "/comment_rendering_instance/comments/total_count",
                "comment_rendering_instance.comments.total_count",
            )?
            .unwrap_or(0),
            shares: count_at(feedback, "/share_count/count", "share_count.count")?.unwrap_or(0),
            top_reactions: top_reactions(feedback)?,
            video_views: count_at(feedback, "/video_view_count", "video_view_count")?,
        })
    }
}

/// Absent or null counters are `None`; a present non-integer is a skip.
fn count_at(
    feedback: &Value,
    pointer: &str,
    field: &'static str,
) -> Result<Option<u64>, SkipReason> {
    match feedback.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_u64().map(Some).ok_or(SkipReason::InvalidField {
            field,
            expected: "a non-negative integer",
        }),
    }
}

/// Reaction breakdown in API order (already ranked by popularity).
fn top_reactions(feedback: &Value) -> Result<Vec<Reaction>, SkipReason> {
    let edges = match feedback.pointer("/top_reactions/edges") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(edges)) => edges,
        Some(_) => {
            return Err(SkipReason::InvalidField {
                field: "top_reactions.edges",
                expected: "an array",
            })
        }
    };

    Ok(edges
        .iter()
        .filter_map(|edge| {
            let kind = edge
                .pointer("/node/localized_name")
                .or_else(|| edge.pointer("/node/reaction_type"))
                .and_then(Value::as_str);
            let count = edge.get("reaction_count").and_then(Value::as_u64);
            match (kind, count) {
                (Some(kind), Some(count)) => Some(Reaction {
                    kind: kind.to_string(),
                    count,
                }),
                _ => {
                    debug!(?edge, "extract: ignoring unreadable reaction entry");
                    None
                }
            }
        })
        .collect())
}

// ---------------------------------------------------------------------------
// ExtractionReport
// ---------------------------------------------------------------------------

/// Tally of one extraction pass over captured traffic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionReport {
    pub envelopes: usize,
    pub unrelated: usize,
    pub feed_pages: usize,
    pub single_posts: usize,
    pub extracted: usize,
    pub skipped: Vec<SkipReason>,
}

impl ExtractionReport {
    /// Classify and extract one envelope, recording the outcome.
    pub fn absorb(&mut self, envelope: &Envelope) -> Vec<PostRecord> {
        self.envelopes += 1;

        let Some(shape) = EnvelopeShape::classify(envelope) else {
            self.unrelated += 1;
            return Vec::new();
        };
        match shape.kind() {
            ShapeKind::FeedPage => self.feed_pages += 1,
            ShapeKind::SinglePost => self.single_posts += 1,
        }

        let mut records = Vec::new();
        for outcome in shape.extract().outcomes() {
            match outcome {
                RecordOutcome::Extracted(record) => {
                    self.extracted += 1;
                    records.push(record);
                }
                RecordOutcome::Skipped(reason) => {
                    debug!(%reason, "extract: dropping incomplete record");
                    self.skipped.push(reason);
                }
            }
        }
        records
    }
}
