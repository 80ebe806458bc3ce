// Scroll/capture loop: one target session from navigation to final extraction.
//
// SCROLLING → CHECKING (every `check_every` scrolls) → SCROLLING | STOPPED.
// The monitor only samples the buffer while scrolling; once stopped, the whole
// buffer is extracted once, and that pass is authoritative.

use chrono::Utc;
use feedtap_common::{CaptureConfig, FeedtapError, PostRecord, RawExchange, Result, StopReason};
use serde::Serialize;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::aggregate::PostAggregator;
use crate::envelope::EnvelopeExtractor;
use crate::extract::ExtractionReport;
use crate::progress::ProgressMonitor;
use crate::traits::{BrowserSession, ProfileScraper};

/// Everything collected for one target.
#[derive(Debug, Clone, Serialize)]
pub struct TargetCapture {
    pub target_id: String,
    pub profile_summary: Vec<String>,
    pub posts: Vec<PostRecord>,
    pub stop_reason: StopReason,
    pub scroll_iterations: u32,
    #[serde(skip)]
    pub report: ExtractionReport,
}

/// Drives one browser through target sessions, one at a time.
pub struct CaptureSession<B, P> {
    browser: B,
    profile: P,
    config: CaptureConfig,
    extractor: EnvelopeExtractor,
    aggregator: PostAggregator,
    monitor: ProgressMonitor,
    /// Buffer as read by the latest progress check.
    last_snapshot: Vec<RawExchange>,
}

impl<B: BrowserSession, P: ProfileScraper> CaptureSession<B, P> {
    pub fn new(browser: B, profile: P, config: CaptureConfig) -> Self {
        let extractor = EnvelopeExtractor::new(config.graphql_path.clone());
        let monitor = ProgressMonitor::new(extractor.clone(), config.progress_sample);
        Self {
            browser,
            profile,
            config,
            extractor,
            aggregator: PostAggregator::new(),
            monitor,
            last_snapshot: Vec::new(),
        }
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Crawl one target's timeline until enough history is captured.
    pub async fn collect_for_target(
        &mut self,
        target_id: &str,
        days_limit: i64,
        hard_scroll_ceiling: u32,
    ) -> Result<TargetCapture> {
        let session_id = Uuid::new_v4();
        let span = info_span!("capture", target_id, %session_id);
        self.run_target(target_id, days_limit, hard_scroll_ceiling)
            .instrument(span)
            .await
    }

    async fn run_target(
        &mut self,
        target_id: &str,
        days_limit: i64,
        hard_scroll_ceiling: u32,
    ) -> Result<TargetCapture> {
        info!(days_limit, hard_scroll_ceiling, "Starting target session");

        self.clear_buffer().await;

        let url = self.config.profile_url(target_id);
        self.browser
            .navigate(&url)
            .await
            .map_err(|e| FeedtapError::Browser(format!("navigate to {url}: {e}")))?;

        self.aggregator.reset();
        self.monitor.reset();
        self.last_snapshot.clear();

        let profile_summary = self.profile_summary(target_id).await;

        let (stop_reason, scroll_iterations) =
            self.scroll_until_done(days_limit, hard_scroll_ceiling).await;

        let exchanges = self.final_exchanges().await;
        let report = self.extract_all(&exchanges);

        info!(
            ?stop_reason,
            scroll_iterations,
            exchanges = exchanges.len(),
            envelopes = report.envelopes,
            extracted = report.extracted,
            skipped = report.skipped.len(),
            posts = self.aggregator.len(),
            "Target session complete"
        );

        Ok(TargetCapture {
            target_id: target_id.to_string(),
            profile_summary,
            posts: self.aggregator.collect(),
            stop_reason,
            scroll_iterations,
            report,
        })
    }

    /// Empty the exchange buffer so the previous target's traffic cannot leak
    /// into this session. Gives up after `clear_retries` attempts.
    async fn clear_buffer(&self) {
        let attempts = self.config.clear_retries.max(1);
        for attempt in 1..=attempts {
            if let Err(e) = self.browser.clear_exchanges().await {
                warn!(attempt, error = %e, "Failed to clear captured traffic");
            }
            match self.browser.exchanges().await {
                Ok(remaining) if remaining.is_empty() => {
                    debug!(attempt, "Captured traffic cleared");
                    return;
                }
                Ok(remaining) => {
                    debug!(attempt, remaining = remaining.len(), "Captured traffic not yet cleared")
                }
                Err(e) => warn!(attempt, error = %e, "Failed to read captured traffic"),
            }
        }
        warn!(attempts, "Captured traffic did not clear, proceeding anyway");
    }

    /// Full buffer for the final pass. Read failures are retried, then the
    /// snapshot from the latest progress check stands in.
    async fn final_exchanges(&mut self) -> Vec<RawExchange> {
        let attempts = self.config.clear_retries.max(1);
        for attempt in 1..=attempts {
            match self.browser.exchanges().await {
                Ok(exchanges) => return exchanges,
                Err(e) => warn!(attempt, error = %e, "Failed to read captured traffic"),
            }
        }
        warn!(
            attempts,
            fallback = self.last_snapshot.len(),
            "Captured traffic unreadable, extracting from the last progress snapshot"
        );
        std::mem::take(&mut self.last_snapshot)
    }

    async fn profile_summary(&self, target_id: &str) -> Vec<String> {
        let page_source = match self.browser.page_source().await {
            Ok(html) => html,
            Err(e) => {
                warn!(error = %e, "Failed to read page source, empty profile summary");
                return Vec::new();
            }
        };
        match self.profile.profile_summary(target_id, &page_source).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, "Profile scrape failed, empty profile summary");
                Vec::new()
            }
        }
    }

    async fn scroll_until_done(&mut self, days_limit: i64, ceiling: u32) -> (StopReason, u32) {
        let check_every = self.config.check_every.max(1);
        let mut since_check = 0;

        for iteration in 1..=ceiling {
            if let Err(e) = self.browser.scroll().await {
                warn!(iteration, error = %e, "Scroll step failed");
            }
            since_check += 1;

            if !self.config.scroll_pause.is_zero() {
                tokio::time::sleep(self.config.scroll_pause).await;
            }

            if since_check >= check_every {
                since_check = 0;
                if let Some(reason) = self.progress_check(days_limit).await {
                    info!(iteration, ?reason, "Stopping scroll loop");
                    return (reason, iteration);
                }
            }
        }

        info!(ceiling, "Scroll ceiling reached");
        (StopReason::ScrollCeiling, ceiling)
    }

    /// The two stop signals, checked separately and OR-ed.
    async fn progress_check(&mut self, days_limit: i64) -> Option<StopReason> {
        let exchanges = match self.browser.exchanges().await {
            Ok(exchanges) => exchanges,
            Err(e) => {
                warn!(error = %e, "Failed to read captured traffic for progress check");
                return None;
            }
        };

        let limit_reached = self.monitor.check(&exchanges, days_limit, Utc::now());
        self.last_snapshot = exchanges;
        if limit_reached {
            Some(StopReason::DaysLimit)
        } else if self.monitor.is_plateaued() {
            Some(StopReason::Plateau)
        } else {
            None
        }
    }

    /// Exhaustive pass over the buffer in arrival order.
    fn extract_all(&mut self, exchanges: &[RawExchange]) -> ExtractionReport {
        let mut report = ExtractionReport::default();
        for exchange in exchanges {
            for envelope in self.extractor.extract(exchange) {
                let records = report.absorb(&envelope);
                self.aggregator.add(records);
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::*;

    fn config() -> CaptureConfig {
        CaptureConfig {
            check_every: 2,
            scroll_pause: Duration::ZERO,
            ..CaptureConfig::default()
        }
    }

    fn page(now: chrono::DateTime<Utc>, posts: &[(&str, i64)]) -> RawExchange {
        let stories = posts
            .iter()
            .map(|(id, age)| story_node(id, days_ago(now, *age)))
            .collect();
        graphql_exchange(&[feed_envelope(stories)])
    }

    #[tokio::test]
    async fn stops_on_days_limit_at_first_check() {
        let now = Utc::now();
        let browser = ScriptedBrowser::new()
            .on_scroll(vec![page(now, &[("p1", 10), ("p2", 20)])])
            .on_scroll(vec![noise_exchange(), page(now, &[("p3", 90)])]);
        let mut session = CaptureSession::new(browser, StaticProfileScraper::new(&[]), config());

        let capture = session.collect_for_target("target", 61, 1000).await.unwrap();

        assert_eq!(capture.stop_reason, StopReason::DaysLimit);
        assert_eq!(capture.scroll_iterations, 2);
        assert_eq!(session.browser().scroll_count(), 2);
        let ids: Vec<_> = capture.posts.iter().map(|p| p.post_id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2", "p3"]);
    }

    #[tokio::test]
    async fn single_feed_page_past_the_limit_stops_at_first_check() {
        let now = Utc::now();
        let browser = ScriptedBrowser::new()
            .on_scroll(vec![page(now, &[("p1", 10), ("p2", 20), ("p3", 90)])]);
        let mut session = CaptureSession::new(browser, StaticProfileScraper::new(&[]), config());

        let capture = session.collect_for_target("target", 61, 1000).await.unwrap();

        assert_eq!(capture.stop_reason, StopReason::DaysLimit);
        assert_eq!(capture.scroll_iterations, 2, "stops at the first check");
        let ids: Vec<_> = capture.posts.iter().map(|p| p.post_id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2", "p3"]);
    }

    #[tokio::test]
    async fn final_read_failure_is_retried() {
        let now = Utc::now();
        // Reads: 1 clear check, 2 progress check, 3 final read (fails), 4 retry.
        let browser = ScriptedBrowser::new()
            .on_scroll(vec![page(now, &[("p1", 90)])])
            .failing_reads([3]);
        let every_scroll = CaptureConfig { check_every: 1, ..config() };
        let mut session =
            CaptureSession::new(browser, StaticProfileScraper::new(&[]), every_scroll);

        let capture = session.collect_for_target("target", 61, 10).await.unwrap();

        assert_eq!(capture.stop_reason, StopReason::DaysLimit);
        assert_eq!(capture.posts.len(), 1);
    }

    #[tokio::test]
    async fn unreadable_buffer_falls_back_to_last_snapshot() {
        let now = Utc::now();
        let browser = ScriptedBrowser::new()
            .on_scroll(vec![page(now, &[("p1", 90), ("p2", 95)])])
            .failing_reads(3..=20);
        let every_scroll = CaptureConfig { check_every: 1, ..config() };
        let mut session =
            CaptureSession::new(browser, StaticProfileScraper::new(&[]), every_scroll);

        let capture = session.collect_for_target("target", 61, 10).await.unwrap();

        assert_eq!(capture.stop_reason, StopReason::DaysLimit);
        let ids: Vec<_> = capture.posts.iter().map(|p| p.post_id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
    }

    #[tokio::test]
    async fn stops_on_plateau_below_days_limit() {
        let now = Utc::now();
        let browser = ScriptedBrowser::new()
            .on_scroll(vec![page(now, &[("p1", 3), ("p2", 5)])])
            .repeat_last_batch();
        let mut session = CaptureSession::new(browser, StaticProfileScraper::new(&[]), config());

        let capture = session.collect_for_target("target", 61, 1000).await.unwrap();

        // One check sets the estimate, three more repeat it.
        assert_eq!(capture.stop_reason, StopReason::Plateau);
        assert_eq!(capture.scroll_iterations, 8);
        assert_eq!(capture.posts.len(), 2, "repeated pages are de-duplicated");
    }

    #[tokio::test]
    async fn stops_at_ceiling_without_signal() {
        let browser = ScriptedBrowser::new()
            .on_scroll(vec![noise_exchange()])
            .repeat_last_batch();
        let mut session = CaptureSession::new(browser, StaticProfileScraper::new(&[]), config());

        let capture = session.collect_for_target("target", 61, 7).await.unwrap();

        assert_eq!(capture.stop_reason, StopReason::ScrollCeiling);
        assert_eq!(capture.scroll_iterations, 7);
        assert_eq!(session.browser().scroll_count(), 7);
        assert!(capture.posts.is_empty());
        assert_eq!(capture.report.envelopes, 0);
    }

    #[tokio::test]
    async fn navigates_to_profile_url_after_clearing() {
        let browser = ScriptedBrowser::new().preloaded(vec![noise_exchange()]);
        let mut session = CaptureSession::new(browser, StaticProfileScraper::new(&[]), config());

        session.collect_for_target("some.page", 61, 0).await.unwrap();

        assert_eq!(session.browser().clear_count(), 1);
        assert_eq!(
            session.browser().navigations(),
            vec!["https://www.facebook.com/some.page".to_string()]
        );
    }

    #[tokio::test]
    async fn sticky_buffer_is_retried_then_tolerated() {
        let now = Utc::now();
        let stale = page(now, &[("old-target-post", 2)]);
        let browser = ScriptedBrowser::new().preloaded(vec![stale]).sticky_clears(100);
        let mut session = CaptureSession::new(browser, StaticProfileScraper::new(&[]), config());

        let capture = session.collect_for_target("target", 61, 0).await.unwrap();

        assert_eq!(session.browser().clear_count(), 5);
        // Contamination is the accepted residual risk.
        assert_eq!(capture.posts.len(), 1);
    }

    #[tokio::test]
    async fn eventually_effective_clear_stops_retrying() {
        let browser = ScriptedBrowser::new()
            .preloaded(vec![noise_exchange()])
            .sticky_clears(2);
        let mut session = CaptureSession::new(browser, StaticProfileScraper::new(&[]), config());

        session.collect_for_target("target", 61, 0).await.unwrap();

        assert_eq!(session.browser().clear_count(), 3);
    }

    #[tokio::test]
    async fn profile_failure_yields_empty_summary() {
        let mut session =
            CaptureSession::new(ScriptedBrowser::new(), StaticProfileScraper::failing(), config());
        let capture = session.collect_for_target("target", 61, 0).await.unwrap();
        assert!(capture.profile_summary.is_empty());
    }

    #[tokio::test]
    async fn profile_summary_reads_rendered_page() {
        let browser = ScriptedBrowser::new().with_page_source(
            r#"<div data-pagelet="ProfileTilesFeed_0"><h2>Intro</h2><span>Details</span><span>Lives in Taipei</span></div>"#,
        );
        let profile = crate::profile::HtmlProfileScraper::new("https://www.facebook.com/", None);
        let mut session = CaptureSession::new(browser, profile, config());

        let capture = session.collect_for_target("target", 61, 0).await.unwrap();

        assert_eq!(capture.profile_summary, vec!["Lives in Taipei"]);
    }

    #[tokio::test]
    async fn profile_summary_passes_through() {
        let mut session = CaptureSession::new(
            ScriptedBrowser::new(),
            StaticProfileScraper::new(&["Page · Bakery", "1,024 followers"]),
            config(),
        );
        let capture = session.collect_for_target("target", 61, 0).await.unwrap();
        assert_eq!(capture.profile_summary, vec!["Page · Bakery", "1,024 followers"]);
    }

    #[tokio::test]
    async fn sessions_do_not_blend_targets() {
        let now = Utc::now();
        let browser = ScriptedBrowser::new()
            .on_scroll(vec![page(now, &[("a1", 70)])])
            .on_scroll(vec![])
            .on_scroll(vec![page(now, &[("b1", 70)])]);
        let mut session = CaptureSession::new(browser, StaticProfileScraper::new(&[]), config());

        let first = session.collect_for_target("a", 61, 1000).await.unwrap();
        let second = session.collect_for_target("b", 61, 1000).await.unwrap();

        assert_eq!(first.posts.len(), 1);
        assert_eq!(first.posts[0].post_id, "a1");
        assert_eq!(second.posts.len(), 1);
        assert_eq!(second.posts[0].post_id, "b1");
    }
}
