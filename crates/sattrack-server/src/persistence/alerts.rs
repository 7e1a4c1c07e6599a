//! Alert log persistence operations.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool};

use sattrack_core::{Alert, AlertKind, Severity};

/// Append alerts within an existing transaction.
pub async fn insert_alerts_tx(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    alerts: &[Alert],
) -> Result<()> {
    for alert in alerts {
        sqlx::query(
            r#"
            INSERT INTO alert_log (alert_id, subject_id, kind, severity, message, metric, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&alert.id)
        .bind(&alert.subject_id)
        .bind(alert.kind.as_str())
        .bind(alert.severity.as_str())
        .bind(&alert.message)
        .bind(alert.metric)
        .bind(alert.created_at.to_rfc3339())
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Append alerts in one transaction.
pub async fn insert_alerts(pool: &SqlitePool, alerts: &[Alert]) -> Result<()> {
    let mut tx = pool.begin().await?;
    insert_alerts_tx(&mut tx, alerts).await?;
    tx.commit().await?;
    Ok(())
}

/// Most recent logged alerts, newest first.
pub async fn recent_alerts(pool: &SqlitePool, limit: u32) -> Result<Vec<Alert>> {
    let rows = sqlx::query_as::<_, AlertRow>(
        "SELECT alert_id, subject_id, kind, severity, message, metric, created_at \
         FROM alert_log ORDER BY created_at DESC, seq DESC LIMIT ?1",
    )
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|row| match Alert::try_from(row) {
            Ok(alert) => Some(alert),
            Err(err) => {
                tracing::warn!("Skipping unreadable alert log row: {}", err);
                None
            }
        })
        .collect())
}

pub async fn count_alerts(pool: &SqlitePool) -> Result<i64> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM alert_log")
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}

#[derive(sqlx::FromRow)]
struct AlertRow {
    alert_id: String,
    subject_id: String,
    kind: String,
    severity: String,
    message: String,
    metric: f64,
    created_at: String,
}

impl TryFrom<AlertRow> for Alert {
    type Error = anyhow::Error;

    fn try_from(row: AlertRow) -> Result<Self> {
        let kind = match row.kind.as_str() {
            "PROXIMITY" => AlertKind::Proximity,
            "LOW_ALTITUDE" => AlertKind::LowAltitude,
            "HIGH_VELOCITY" => AlertKind::HighVelocity,
            other => return Err(anyhow!("unknown alert kind {}", other)),
        };
        let severity: Severity = row.severity.parse()?;
        let created_at = DateTime::parse_from_rfc3339(&row.created_at)?.with_timezone(&Utc);

        Ok(Alert {
            id: row.alert_id,
            subject_id: row.subject_id,
            kind,
            severity,
            message: row.message,
            metric: row.metric,
            created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::init_memory_database;
    use chrono::Duration;

    fn alert(subject: &str, severity: Severity, at: DateTime<Utc>) -> Alert {
        Alert::new(
            AlertKind::Proximity,
            subject,
            severity,
            12.5,
            format!("{} in proximity", subject),
            at,
        )
    }

    #[tokio::test]
    async fn round_trips_newest_first() {
        let db = init_memory_database().await.unwrap();
        let now = Utc::now();
        insert_alerts(
            db.pool(),
            &[
                alert("A-B", Severity::Low, now - Duration::seconds(60)),
                alert("C-D", Severity::High, now),
            ],
        )
        .await
        .unwrap();

        let logged = recent_alerts(db.pool(), 10).await.unwrap();
        assert_eq!(logged.len(), 2);
        assert_eq!(logged[0].subject_id, "C-D");
        assert_eq!(logged[0].severity, Severity::High);
        assert_eq!(logged[0].id, "PROXIMITY:C-D");
        assert_eq!(logged[1].subject_id, "A-B");
        assert_eq!(count_alerts(db.pool()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn limit_caps_results() {
        let db = init_memory_database().await.unwrap();
        let now = Utc::now();
        let batch: Vec<Alert> = (0..5)
            .map(|i| alert(&format!("S{}", i), Severity::Medium, now + Duration::seconds(i)))
            .collect();
        insert_alerts(db.pool(), &batch).await.unwrap();

        let logged = recent_alerts(db.pool(), 2).await.unwrap();
        assert_eq!(logged.len(), 2);
        assert_eq!(logged[0].subject_id, "S4");
    }
}
