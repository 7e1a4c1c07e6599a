//! Plain-text rendering shared by the sattrack command-line tools.

use sattrack_core::{Alert, FleetCounts, FleetStats, TrackedObject};
use sattrack_sdk::{ConnectionStatus, DashboardView};

pub fn format_object(object: &TrackedObject) -> String {
    format!(
        "{:<10} {:<24} {:>8.2} {:>9.2} {:>9.1} km {:>5.2} km/s  {:?}  [{}]",
        object.id,
        truncate(&object.name, 24),
        object.latitude,
        object.longitude,
        object.altitude,
        object.velocity,
        object.category,
        object.source
    )
}

pub fn format_alert(alert: &Alert) -> String {
    format!(
        "{}  {:<6} {:<13} {}",
        alert.created_at.format("%H:%M:%S"),
        alert.severity.as_str(),
        alert.kind.as_str(),
        alert.message
    )
}

pub fn format_counts(counts: &FleetCounts) -> String {
    format!(
        "{} tracked (LEO {}, MEO {}, GEO {}), {} alerts",
        counts.total, counts.leo, counts.meo, counts.geo, counts.alerts
    )
}

pub fn format_stats(stats: &FleetStats) -> String {
    let updated = stats
        .last_update
        .map(|ts| ts.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    format!(
        "tracked: {}  high alerts: {}  last update: {}",
        stats.total_tracked, stats.active_alerts, updated
    )
}

pub fn status_label(status: ConnectionStatus) -> &'static str {
    match status {
        ConnectionStatus::Connecting => "connecting",
        ConnectionStatus::Connected => "live",
        ConnectionStatus::Polling => "polling",
        ConnectionStatus::Disconnected => "offline",
    }
}

/// One screenful: status header, counts, then the newest `max_alerts` alerts.
pub fn render_view(view: &DashboardView, status: ConnectionStatus, max_alerts: usize) -> String {
    let mut out = String::new();
    let updated = view
        .last_update
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "waiting for data".to_string());
    out.push_str(&format!("[{}] {}\n", status_label(status), updated));
    out.push_str(&format_counts(&view.counts));
    out.push('\n');
    for alert in view.alerts.iter().take(max_alerts) {
        out.push_str("  ");
        out.push_str(&format_alert(alert));
        out.push('\n');
    }
    out
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('~');
    cut
}
