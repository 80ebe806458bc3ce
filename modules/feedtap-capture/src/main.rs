use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use feedtap_capture::{project, CaptureSession, HtmlProfileScraper, PostRow, ReplayBrowser};
use feedtap_common::{CaptureConfig, StopReason};
use plugin_page_client::PluginPageClient;

#[derive(Parser)]
#[command(name = "feedtap", about = "Capture a profile timeline from recorded GraphQL traffic")]
struct Cli {
    /// Recorded capture, one JSON exchange per line
    #[arg(long)]
    capture: PathBuf,

    /// Rendered profile HTML used for the profile summary
    #[arg(long)]
    page_source: Option<PathBuf>,

    /// Profile username or numeric id
    #[arg(long)]
    target: String,

    /// Stop once the oldest post seen is this many days old
    #[arg(long, env = "FEEDTAP_DAYS_LIMIT")]
    days_limit: Option<i64>,

    /// Hard cap on scroll steps
    #[arg(long, env = "FEEDTAP_SCROLL_CEILING")]
    scroll_ceiling: Option<u32>,

    /// Recorded exchanges revealed per scroll step
    #[arg(long, default_value_t = 5)]
    batch_size: usize,

    /// Skip the follower lookup for pages
    #[arg(long)]
    no_followers: bool,
}

#[derive(Serialize)]
struct Output {
    username_or_userid: String,
    profile: Vec<String>,
    stop_reason: StopReason,
    scroll_iterations: u32,
    data: Vec<PostRow>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Stdout carries the JSON result; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("feedtap=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = CaptureConfig::from_env()?;
    // Replayed traffic has nothing to wait for.
    config.scroll_pause = std::time::Duration::ZERO;
    config.log_summary();

    let days_limit = cli.days_limit.unwrap_or(config.days_limit);
    let scroll_ceiling = cli.scroll_ceiling.unwrap_or(config.scroll_ceiling);

    let page_source = match &cli.page_source {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read page source {}", path.display()))?,
        None => String::new(),
    };

    let browser = ReplayBrowser::from_file(&cli.capture, page_source, cli.batch_size)?;
    let plugin = if cli.no_followers {
        None
    } else {
        Some(PluginPageClient::new()?)
    };
    let profile = HtmlProfileScraper::new(config.profile_base_url.clone(), plugin);

    let profile_base_url = config.profile_base_url.clone();
    let mut session = CaptureSession::new(browser, profile, config);
    let capture = session
        .collect_for_target(&cli.target, days_limit, scroll_ceiling)
        .await?;

    info!(
        target_id = cli.target.as_str(),
        posts = capture.posts.len(),
        "Capture finished"
    );

    let output = Output {
        data: project(&profile_base_url, &capture.target_id, &capture.posts),
        username_or_userid: capture.target_id,
        profile: capture.profile_summary,
        stop_reason: capture.stop_reason,
        scroll_iterations: capture.scroll_iterations,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
