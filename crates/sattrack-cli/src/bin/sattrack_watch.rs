//! Live terminal view of a sattrack server.
//!
//! Follows the push stream and falls back to polling when it is
//! unavailable. Exit with Ctrl-C.

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use sattrack_cli::render_view;
use sattrack_sdk::{DashboardClient, LiveFeed, LiveFeedConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Watch fleet and alerts as they change")]
struct Args {
    /// Server URL
    #[arg(long, default_value = "http://localhost:8000")]
    url: String,

    /// Snapshot poll interval while push is down, in seconds
    #[arg(long, default_value_t = 5)]
    poll_secs: u64,

    /// How long to poll before retrying push, in seconds
    #[arg(long, default_value_t = 30)]
    retry_secs: u64,

    /// Alerts shown per update
    #[arg(long, default_value_t = 10)]
    alerts: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let feed = LiveFeed::spawn(
        DashboardClient::new(&args.url)?,
        LiveFeedConfig {
            poll_interval: Duration::from_secs(args.poll_secs.max(1)),
            push_retry_interval: Duration::from_secs(args.retry_secs.max(1)),
            ..LiveFeedConfig::default()
        },
    );

    let mut view_rx = feed.subscribe_view();
    let mut status_rx = feed.subscribe_status();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = view_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        let view = view_rx.borrow_and_update().clone();
        let status = *status_rx.borrow_and_update();
        println!("{}", render_view(&view, status, args.alerts));
    }

    feed.stop();
    Ok(())
}
