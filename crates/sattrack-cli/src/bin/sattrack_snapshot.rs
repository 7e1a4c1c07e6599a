//! One-shot query against a running sattrack server.
//!
//! Usage:
//!   cargo run -p sattrack-cli --bin sattrack-snapshot -- --show alerts

use anyhow::Result;
use clap::{Parser, ValueEnum};
use sattrack_cli::{format_alert, format_counts, format_object, format_stats};
use sattrack_sdk::DashboardClient;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Show {
    Fleet,
    Alerts,
    Stats,
    Snapshot,
    History,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Print the current fleet, alerts or stats")]
struct Args {
    /// Server URL
    #[arg(long, default_value = "http://localhost:8000")]
    url: String,

    #[arg(long, value_enum, default_value_t = Show::Snapshot)]
    show: Show,

    /// Rows for --show history
    #[arg(long, default_value_t = 100)]
    limit: u32,

    /// Print raw JSON instead of text
    #[arg(long)]
    json: bool,

    /// Request a refresh before querying
    #[arg(long)]
    refresh: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let client = DashboardClient::new(&args.url)?;

    if args.refresh {
        if client.request_refresh().await? {
            println!("refresh queued");
        } else {
            println!("refresh already running");
        }
    }

    match args.show {
        Show::Fleet => {
            let fleet = client.fleet().await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&fleet)?);
            } else {
                fleet.iter().for_each(|o| println!("{}", format_object(o)));
            }
        }
        Show::Alerts | Show::History => {
            let alerts = match args.show {
                Show::History => client.alert_history(args.limit).await?,
                _ => client.alerts().await?,
            };
            if args.json {
                println!("{}", serde_json::to_string_pretty(&alerts)?);
            } else if alerts.is_empty() {
                println!("no alerts");
            } else {
                alerts.iter().for_each(|a| println!("{}", format_alert(a)));
            }
        }
        Show::Stats => {
            let stats = client.stats().await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("{}", format_stats(&stats));
            }
        }
        Show::Snapshot => {
            let snapshot = client.snapshot().await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                println!("{}", format_counts(&snapshot.counts));
                snapshot
                    .objects
                    .iter()
                    .for_each(|o| println!("{}", format_object(o)));
                snapshot
                    .alerts
                    .iter()
                    .for_each(|a| println!("{}", format_alert(a)));
            }
        }
    }

    Ok(())
}
