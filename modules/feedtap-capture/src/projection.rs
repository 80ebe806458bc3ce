// Flat, serializable view of captured posts for output.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use feedtap_common::{PostContext, PostRecord};
use serde::Serialize;

/// One output row per post.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRow {
    pub post_id: String,
    pub post_url: String,
    pub username_or_userid: String,
    pub owning_profile: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    /// `YYYY-MM-DD` in UTC.
    pub published_date: Option<String>,
    /// Epoch seconds.
    pub time: i64,
    pub reaction_count: u64,
    pub comment_count: u64,
    pub share_count: u64,
    /// Reaction name to count, e.g. `{"Like": 7, "Love": 3}`.
    pub sub_reactions: BTreeMap<String, u64>,
    pub context: PostContext,
    pub video_view_count: Option<u64>,
}

/// Project a target's posts into output rows, preserving order.
pub fn project(profile_base_url: &str, target_id: &str, posts: &[PostRecord]) -> Vec<PostRow> {
    posts
        .iter()
        .map(|post| {
            let published_at = post.created_at();
            PostRow {
                post_id: post.post_id.clone(),
                post_url: format!("{profile_base_url}{}", post.post_id),
                username_or_userid: target_id.to_string(),
                owning_profile: post.owning_profile.clone(),
                published_date: published_at.map(|t| t.format("%Y-%m-%d").to_string()),
                published_at,
                time: post.creation_time,
                reaction_count: post.reaction_count,
                comment_count: post.comment_count,
                share_count: post.share_count,
                sub_reactions: sub_reactions(post),
                context: post.context,
                video_view_count: post.video_view_count,
            }
        })
        .collect()
}

fn sub_reactions(post: &PostRecord) -> BTreeMap<String, u64> {
    let mut out = BTreeMap::new();
    for reaction in &post.top_reactions {
        *out.entry(reaction.kind.clone()).or_insert(0) += reaction.count;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedtap_common::Reaction;

    fn record() -> PostRecord {
        PostRecord {
            post_id: "pfbid0abc".to_string(),
            creation_time: 1_700_000_000,
            caption: "hello".to_string(),
            reaction_count: 12,
            comment_count: 4,
            share_count: 1,
            top_reactions: vec![
                Reaction { kind: "Like".to_string(), count: 9 },
                Reaction { kind: "Haha".to_string(), count: 3 },
            ],
            video_view_count: None,
            context: PostContext::Shared,
            owning_profile: Some("100001".to_string()),
        }
    }

    #[test]
    fn flattens_record() {
        let rows = project("https://www.facebook.com/", "some.page", &[record()]);
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        assert_eq!(row.post_url, "https://www.facebook.com/pfbid0abc");
        assert_eq!(row.username_or_userid, "some.page");
        assert_eq!(row.published_date.as_deref(), Some("2023-11-14"));
        assert_eq!(row.time, 1_700_000_000);
        assert_eq!(row.sub_reactions.get("Like"), Some(&9));
        assert_eq!(row.sub_reactions.get("Haha"), Some(&3));
        assert_eq!(row.context, PostContext::Shared);
    }

    #[test]
    fn serializes_context_and_absent_video() {
        let rows = project("https://www.facebook.com/", "some.page", &[record()]);
        let json = serde_json::to_value(&rows[0]).unwrap();
        assert_eq!(json["context"], "shared");
        assert!(json["video_view_count"].is_null());
        assert_eq!(json["sub_reactions"]["Like"], 9);
    }
}
