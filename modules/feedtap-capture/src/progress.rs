// Progress monitor: samples the newest captured traffic to estimate how far
// back the timeline has been scrolled, and gates the scroll loop.
//
// Two independent stop signals come out of here:
// - `check` returns true once the oldest sampled post is `days_limit` days old.
// - `is_plateaued` turns true once the estimate repeats `PLATEAU_REPEATS`
//   times in a row, meaning the page stopped surfacing older posts.

use chrono::{DateTime, Utc};
use feedtap_common::RawExchange;
use tracing::{debug, info};

use crate::envelope::EnvelopeExtractor;
use crate::extract::data_node;
use crate::walk::{collect_i64, find_feedback};

/// Consecutive repeats of the same estimate that count as a plateau.
pub const PLATEAU_REPEATS: u32 = 3;

const SECONDS_PER_DAY: i64 = 86_400;

/// Progress carried across checks within one target session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressState {
    /// Running maximum of the age estimate. `None` until the first signal.
    pub max_days_seen: Option<i64>,
    pub repeat_count: u32,
}

#[derive(Debug)]
pub struct ProgressMonitor {
    extractor: EnvelopeExtractor,
    sample_limit: usize,
    state: ProgressState,
}

impl ProgressMonitor {
    /// `sample_limit` caps how many feedback-bearing envelopes one check reads.
    pub fn new(extractor: EnvelopeExtractor, sample_limit: usize) -> Self {
        Self {
            extractor,
            sample_limit: sample_limit.max(1),
            state: ProgressState::default(),
        }
    }

    pub fn state(&self) -> ProgressState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = ProgressState::default();
    }

    /// Oldest creation time among the most recently captured posts.
    ///
    /// Walks the buffer newest-first and stops after `sample_limit` envelopes
    /// that carry a feedback node. Relies on the feed arriving newest-post
    /// first; the order is not re-validated here.
    pub fn oldest_creation_time(&self, exchanges: &[RawExchange]) -> Option<i64> {
        let mut candidates = Vec::new();
        let mut sampled = 0;

        'scan: for exchange in exchanges.iter().rev() {
            for envelope in self.extractor.extract(exchange) {
                let Some(node) = data_node(&envelope) else {
                    continue;
                };
                if find_feedback(node).is_none() {
                    continue;
                }

                let before = candidates.len();
                collect_i64(node, "creation_time", &mut candidates);
                if candidates.len() > before {
                    sampled += 1;
                    if sampled >= self.sample_limit {
                        break 'scan;
                    }
                }
            }
        }

        candidates.into_iter().min()
    }

    /// Run one progress check against the current buffer snapshot.
    ///
    /// Returns whether the days limit is reached. Without any timestamp signal
    /// the state is left untouched and the answer is `false`.
    pub fn check(&mut self, exchanges: &[RawExchange], days_limit: i64, now: DateTime<Utc>) -> bool {
        let Some(oldest) = self.oldest_creation_time(exchanges) else {
            debug!(exchanges = exchanges.len(), "progress: no timestamp signal yet");
            return false;
        };

        let diff_days = days_between(now, oldest);

        // Compared against the running max, not the previous estimate.
        if self.state.max_days_seen == Some(diff_days) {
            self.state.repeat_count += 1;
        } else {
            self.state.repeat_count = 0;
        }
        let max_days_seen = self.state.max_days_seen.map_or(diff_days, |m| m.max(diff_days));
        self.state.max_days_seen = Some(max_days_seen);

        info!(
            diff_days,
            max_days_seen,
            repeat_count = self.state.repeat_count,
            "progress: posts acquired within the past {max_days_seen} days"
        );

        limit_reached(diff_days, days_limit)
    }

    pub fn is_plateaued(&self) -> bool {
        self.state.repeat_count >= PLATEAU_REPEATS
    }
}

pub fn limit_reached(diff_days: i64, days_limit: i64) -> bool {
    diff_days >= days_limit
}

/// Whole days elapsed between an epoch-seconds timestamp and `now`, floored.
pub fn days_between(now: DateTime<Utc>, epoch_secs: i64) -> i64 {
    (now.timestamp() - epoch_secs).div_euclid(SECONDS_PER_DAY)
}
