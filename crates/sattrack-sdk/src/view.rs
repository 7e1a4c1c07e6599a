//! Client-side dashboard state.

use chrono::{DateTime, Utc};

use sattrack_core::{Alert, FleetCounts, FullSnapshot, StreamEvent, TrackedObject, DEFAULT_LEDGER_CAPACITY};

/// What a dashboard renders, kept in step with the server's stream.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub objects: Vec<TrackedObject>,
    /// Newest first, capped like the server ledger
    pub alerts: Vec<Alert>,
    pub counts: FleetCounts,
    pub last_update: Option<DateTime<Utc>>,
    alert_capacity: usize,
}

impl Default for DashboardView {
    fn default() -> Self {
        Self::new(DEFAULT_LEDGER_CAPACITY)
    }
}

impl DashboardView {
    pub fn new(alert_capacity: usize) -> Self {
        Self {
            objects: Vec::new(),
            alerts: Vec::new(),
            counts: FleetCounts::default(),
            last_update: None,
            alert_capacity: alert_capacity.max(1),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.last_update.is_none()
    }

    pub fn replace(&mut self, snapshot: FullSnapshot) {
        self.objects = snapshot.objects;
        self.alerts = snapshot.alerts;
        self.alerts.truncate(self.alert_capacity);
        self.counts = snapshot.counts;
        self.last_update = Some(snapshot.ts);
    }

    pub fn apply(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Snapshot(snapshot) => self.replace(snapshot),
            StreamEvent::FleetUpdated(update) => {
                self.objects = update.objects;
                self.counts = update.counts;
                self.last_update = Some(update.ts);
            }
            StreamEvent::AlertsAppended(batch) => {
                let mut alerts = batch.alerts;
                alerts.append(&mut self.alerts);
                alerts.truncate(self.alert_capacity);
                self.alerts = alerts;
                self.counts.alerts = self.alerts.len();
                self.last_update = Some(batch.ts);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sattrack_core::{AlertBatch, AlertKind, FleetUpdate, Severity};

    fn alert(subject: &str) -> Alert {
        Alert::new(
            AlertKind::HighVelocity,
            subject,
            Severity::Medium,
            8.4,
            "fast",
            Utc::now(),
        )
    }

    #[test]
    fn events_update_the_view() {
        let mut view = DashboardView::new(3);
        assert!(view.is_empty());

        let objects = vec![TrackedObject::new("A", 0.0, 0.0, 500.0)];
        view.apply(StreamEvent::Snapshot(FullSnapshot {
            ts: Utc::now(),
            counts: FleetCounts::tally(&objects, 1),
            objects,
            alerts: vec![alert("OLD")],
        }));
        assert_eq!(view.objects.len(), 1);
        assert_eq!(view.alerts.len(), 1);

        let objects = vec![
            TrackedObject::new("A", 1.0, 0.0, 500.0),
            TrackedObject::new("B", 2.0, 0.0, 36_000.0),
        ];
        view.apply(StreamEvent::FleetUpdated(FleetUpdate {
            ts: Utc::now(),
            counts: FleetCounts::tally(&objects, 1),
            objects,
        }));
        assert_eq!(view.objects.len(), 2);
        assert_eq!(view.counts.geo, 1);
        assert_eq!(view.alerts.len(), 1);

        view.apply(StreamEvent::AlertsAppended(AlertBatch {
            ts: Utc::now(),
            alerts: vec![alert("N1"), alert("N2"), alert("N3")],
        }));
        let subjects: Vec<&str> = view.alerts.iter().map(|a| a.subject_id.as_str()).collect();
        assert_eq!(subjects, vec!["N1", "N2", "N3"]);
        assert_eq!(view.counts.alerts, 3);
    }
}
