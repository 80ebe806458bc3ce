use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{FeedtapError, Result};

/// Capture configuration loaded from environment variables.
/// Every knob has a default, so an empty environment is a valid config.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    // Stop conditions
    pub days_limit: i64,
    pub scroll_ceiling: u32,
    pub check_every: u32,

    // Pacing
    pub scroll_pause: Duration,
    pub clear_retries: u32,

    // Progress sampling
    pub progress_sample: usize,

    // Endpoints
    pub profile_base_url: String,
    pub graphql_path: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            days_limit: 61,
            scroll_ceiling: 1000,
            check_every: 10,
            scroll_pause: Duration::from_millis(300),
            clear_retries: 5,
            progress_sample: 8,
            profile_base_url: "https://www.facebook.com/".to_string(),
            graphql_path: "/api/graphql/".to_string(),
        }
    }
}

impl CaptureConfig {
    /// Load configuration from `FEEDTAP_*` environment variables, reading a
    /// `.env` file first if one exists.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            days_limit: parsed_env("FEEDTAP_DAYS_LIMIT", defaults.days_limit)?,
            scroll_ceiling: parsed_env("FEEDTAP_SCROLL_CEILING", defaults.scroll_ceiling)?,
            check_every: parsed_env("FEEDTAP_CHECK_EVERY", defaults.check_every)?,
            scroll_pause: Duration::from_millis(parsed_env(
                "FEEDTAP_SCROLL_PAUSE_MS",
                defaults.scroll_pause.as_millis() as u64,
            )?),
            clear_retries: parsed_env("FEEDTAP_CLEAR_RETRIES", defaults.clear_retries)?,
            progress_sample: parsed_env("FEEDTAP_PROGRESS_SAMPLE", defaults.progress_sample)?,
            profile_base_url: env::var("FEEDTAP_PROFILE_BASE_URL")
                .unwrap_or(defaults.profile_base_url),
            graphql_path: env::var("FEEDTAP_GRAPHQL_PATH").unwrap_or(defaults.graphql_path),
        };

        if config.check_every == 0 {
            return Err(FeedtapError::Config(
                "FEEDTAP_CHECK_EVERY must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }

    /// URL of a target's profile page.
    pub fn profile_url(&self, target_id: &str) -> String {
        format!("{}{}", self.profile_base_url, target_id)
    }

    pub fn log_summary(&self) {
        tracing::info!(
            days_limit = self.days_limit,
            scroll_ceiling = self.scroll_ceiling,
            check_every = self.check_every,
            scroll_pause_ms = self.scroll_pause.as_millis() as u64,
            clear_retries = self.clear_retries,
            progress_sample = self.progress_sample,
            profile_base_url = %self.profile_base_url,
            graphql_path = %self.graphql_path,
            "Capture config loaded"
        );
    }
}

fn parsed_env<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| FeedtapError::Config(format!("{key} must be a number, got {raw:?}"))),
        Err(_) => Ok(default),
    }
}
