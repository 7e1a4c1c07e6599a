//! Bounded, newest-first alert history.

use std::collections::VecDeque;

use chrono::Duration;

use crate::models::{Alert, Severity};

/// Default number of alerts kept.
pub const DEFAULT_LEDGER_CAPACITY: usize = 50;

/// Recent alerts, newest first, capped at `capacity`.
///
/// Without a suppression window a persistent condition re-alerts on every
/// evaluation cycle and shows up as repeated entries. With a window, an alert
/// whose id is already in the ledger with a `created_at` inside the window is
/// dropped.
#[derive(Debug, Clone)]
pub struct AlertLedger {
    capacity: usize,
    suppress_window: Option<Duration>,
    entries: VecDeque<Alert>,
}

impl Default for AlertLedger {
    fn default() -> Self {
        Self::new(DEFAULT_LEDGER_CAPACITY)
    }
}

impl AlertLedger {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            suppress_window: None,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Enable duplicate suppression for alerts sharing an id.
    pub fn with_suppression(mut self, window: Duration) -> Self {
        self.suppress_window = (window > Duration::zero()).then_some(window);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a batch ahead of existing entries and evict beyond capacity.
    ///
    /// Returns the alerts that were actually inserted and are still held
    /// after eviction, newest first. A batch alert older than everything in a
    /// full ledger is evicted straight away and is not returned.
    pub fn append(&mut self, batch: Vec<Alert>) -> Vec<Alert> {
        let accepted: Vec<Alert> = batch
            .into_iter()
            .filter(|alert| !self.is_suppressed(alert))
            .collect();
        if accepted.is_empty() {
            return accepted;
        }

        let mut merged: Vec<(Alert, bool)> = accepted
            .into_iter()
            .map(|alert| (alert, true))
            .chain(self.entries.drain(..).map(|alert| (alert, false)))
            .collect();
        // Stable sort: ties keep batch order and stay ahead of older entries.
        merged.sort_by(|a, b| b.0.created_at.cmp(&a.0.created_at));
        merged.truncate(self.capacity);

        let mut inserted = Vec::new();
        self.entries = merged
            .into_iter()
            .map(|(alert, new)| {
                if new {
                    inserted.push(alert.clone());
                }
                alert
            })
            .collect();
        inserted
    }

    /// Alerts, newest first.
    pub fn recent(&self) -> Vec<Alert> {
        self.entries.iter().cloned().collect()
    }

    pub fn count_by_severity(&self, level: Severity) -> usize {
        self.entries
            .iter()
            .filter(|alert| alert.severity == level)
            .count()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn is_suppressed(&self, alert: &Alert) -> bool {
        let Some(window) = self.suppress_window else {
            return false;
        };
        self.entries.iter().any(|existing| {
            existing.id == alert.id && alert.created_at - existing.created_at < window
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AlertKind;
    use chrono::{DateTime, Utc};

    fn base() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn alert(subject: &str, severity: Severity, offset_s: i64) -> Alert {
        Alert::new(
            AlertKind::LowAltitude,
            subject,
            severity,
            250.0,
            "test",
            base() + Duration::seconds(offset_s),
        )
    }

    fn assert_newest_first(ledger: &AlertLedger) {
        let recent = ledger.recent();
        for pair in recent.windows(2) {
            assert!(pair[0].created_at >= pair[1].created_at);
        }
    }

    #[test]
    fn test_capacity_invariant_over_many_appends() {
        let mut ledger = AlertLedger::new(50);
        for cycle in 0..40 {
            let batch = (0..(cycle % 7))
                .map(|i| alert(&format!("SAT-{}", i), Severity::Medium, cycle as i64))
                .collect();
            ledger.append(batch);
            assert!(ledger.recent().len() <= 50);
            assert_newest_first(&ledger);
        }
        assert_eq!(ledger.len(), 50);
    }

    #[test]
    fn test_newest_batch_comes_first() {
        let mut ledger = AlertLedger::new(5);
        ledger.append(vec![alert("OLD-1", Severity::Low, 0), alert("OLD-2", Severity::Low, 0)]);
        ledger.append(vec![alert("NEW-1", Severity::High, 10), alert("NEW-2", Severity::High, 10)]);

        let subjects: Vec<String> = ledger.recent().into_iter().map(|a| a.subject_id).collect();
        assert_eq!(subjects, vec!["NEW-1", "NEW-2", "OLD-1", "OLD-2"]);
    }

    #[test]
    fn test_out_of_order_batch_is_sorted() {
        let mut ledger = AlertLedger::new(10);
        ledger.append(vec![alert("LATE", Severity::Low, 30)]);
        ledger.append(vec![alert("EARLY", Severity::Low, 5)]);
        assert_newest_first(&ledger);
        assert_eq!(ledger.recent()[0].subject_id, "LATE");
    }

    #[test]
    fn test_eviction_drops_oldest() {
        let mut ledger = AlertLedger::new(3);
        for i in 0..5 {
            ledger.append(vec![alert(&format!("SAT-{}", i), Severity::Low, i)]);
        }
        let subjects: Vec<String> = ledger.recent().into_iter().map(|a| a.subject_id).collect();
        assert_eq!(subjects, vec!["SAT-4", "SAT-3", "SAT-2"]);
    }

    #[test]
    fn test_oversized_batch_is_truncated() {
        let mut ledger = AlertLedger::new(2);
        let inserted = ledger.append(vec![
            alert("A", Severity::Low, 0),
            alert("B", Severity::Low, 0),
            alert("C", Severity::Low, 0),
        ]);
        assert_eq!(inserted.len(), 2);
        assert_eq!(ledger.recent(), inserted);
    }

    #[test]
    fn test_alerts_evicted_on_arrival_are_not_reported() {
        let mut ledger = AlertLedger::new(3);
        ledger.append(vec![
            alert("A", Severity::Low, 10),
            alert("B", Severity::Low, 20),
            alert("C", Severity::Low, 30),
        ]);

        let inserted = ledger.append(vec![alert("STALE", Severity::High, 0)]);
        assert!(inserted.is_empty());
        assert!(ledger.recent().iter().all(|a| a.subject_id != "STALE"));

        let inserted = ledger.append(vec![
            alert("FRESH", Severity::High, 40),
            alert("STALE", Severity::High, 1),
        ]);
        let subjects: Vec<&str> = inserted.iter().map(|a| a.subject_id.as_str()).collect();
        assert_eq!(subjects, vec!["FRESH"]);
        assert_eq!(ledger.recent()[0].subject_id, "FRESH");
    }

    #[test]
    fn test_count_by_severity() {
        let mut ledger = AlertLedger::default();
        ledger.append(vec![
            alert("A", Severity::High, 0),
            alert("B", Severity::High, 0),
            alert("C", Severity::Medium, 0),
        ]);
        assert_eq!(ledger.count_by_severity(Severity::High), 2);
        assert_eq!(ledger.count_by_severity(Severity::Medium), 1);
        assert_eq!(ledger.count_by_severity(Severity::Low), 0);
    }

    #[test]
    fn test_repeats_without_suppression() {
        let mut ledger = AlertLedger::default();
        ledger.append(vec![alert("A", Severity::High, 0)]);
        ledger.append(vec![alert("A", Severity::High, 60)]);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_suppression_window() {
        let mut ledger = AlertLedger::default().with_suppression(Duration::seconds(120));
        ledger.append(vec![alert("A", Severity::High, 0)]);

        let inserted = ledger.append(vec![alert("A", Severity::High, 60), alert("B", Severity::Low, 60)]);
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].subject_id, "B");

        let inserted = ledger.append(vec![alert("A", Severity::High, 180)]);
        assert_eq!(inserted.len(), 1);
        assert_eq!(ledger.len(), 3);
    }
}
