use std::collections::HashSet;

use feedtap_common::{PostContext, PostRecord};

/// Accumulates posts across a capture session, keyed by `post_id`.
///
/// The first record seen for an id wins: pagination re-issues overlapping
/// windows while the page scrolls, and later copies are dropped silently.
/// Owned by exactly one target session; `reset` between targets.
#[derive(Debug, Default)]
pub struct PostAggregator {
    posts: Vec<PostRecord>,
    seen: HashSet<String>,
}

impl PostAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add records, returning how many were new.
    pub fn add(&mut self, records: impl IntoIterator<Item = PostRecord>) -> usize {
        let before = self.posts.len();
        for record in records {
            if self.seen.insert(record.post_id.clone()) {
                self.posts.push(record);
            }
        }
        self.posts.len() - before
    }

    /// Accumulated posts in first-seen order.
    pub fn collect(&self) -> Vec<PostRecord> {
        self.posts.clone()
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn reset(&mut self) {
        self.posts.clear();
        self.seen.clear();
    }

    // Parallel views, index-aligned with `collect()`.

    pub fn contexts(&self) -> Vec<PostContext> {
        self.posts.iter().map(|p| p.context).collect()
    }

    pub fn owning_profiles(&self) -> Vec<Option<String>> {
        self.posts.iter().map(|p| p.owning_profile.clone()).collect()
    }

    pub fn creation_times(&self) -> Vec<i64> {
        self.posts.iter().map(|p| p.creation_time).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: &str, creation_time: i64, reactions: u64) -> PostRecord {
        PostRecord {
            post_id: id.to_string(),
            creation_time,
            caption: format!("post {id}"),
            reaction_count: reactions,
            comment_count: 0,
            share_count: 0,
            top_reactions: Vec::new(),
            video_view_count: None,
            context: PostContext::Organic,
            owning_profile: Some("owner".to_string()),
        }
    }

    #[test]
    fn same_record_twice_is_kept_once() {
        let mut agg = PostAggregator::new();
        agg.add([post("p1", 10, 1)]);
        agg.add([post("p1", 10, 1)]);
        assert_eq!(agg.collect().len(), 1);
    }

    #[test]
    fn first_seen_wins_and_order_is_stable() {
        let mut agg = PostAggregator::new();
        assert_eq!(agg.add([post("p1", 30, 1), post("p2", 20, 1)]), 2);
        assert_eq!(agg.add([post("p2", 20, 99), post("p3", 10, 1), post("p1", 30, 99)]), 1);

        let posts = agg.collect();
        let ids: Vec<_> = posts.iter().map(|p| p.post_id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2", "p3"]);
        assert_eq!(posts[1].reaction_count, 1, "later duplicate must not overwrite");
    }

    #[test]
    fn parallel_views_stay_aligned() {
        let mut agg = PostAggregator::new();
        let mut shared = post("p2", 20, 0);
        shared.context = PostContext::Shared;
        shared.owning_profile = None;
        agg.add([post("p1", 30, 0), shared, post("p1", 5, 0)]);

        assert_eq!(agg.creation_times(), vec![30, 20]);
        assert_eq!(agg.contexts(), vec![PostContext::Organic, PostContext::Shared]);
        assert_eq!(agg.owning_profiles(), vec![Some("owner".to_string()), None]);
    }

    #[test]
    fn reset_forgets_previous_target() {
        let mut agg = PostAggregator::new();
        agg.add([post("p1", 30, 0)]);
        agg.reset();
        assert!(agg.is_empty());
        assert_eq!(agg.add([post("p1", 30, 0)]), 1);
    }
}
