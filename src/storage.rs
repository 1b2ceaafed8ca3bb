//! SQLite alert history.
//!
//! Only emitted alerts are stored. Medication schedules live in memory and
//! are rebuilt from scratch after a restart.
//!
//! Each row keeps the searchable columns (`kind`, `subject_id`, `recorded_ts`)
//! next to the full alert serialized as JSON in `body`.

use chrono::{DateTime, TimeZone, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

use crate::model::{Alert, AlertKind, StoredAlert};

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Create a new storage instance and initialize the schema.
    ///
    /// # Arguments
    ///
    /// * `database_url` - SQLite connection string (e.g., "sqlite:smam.db" or "sqlite::memory:")
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let mut options = SqlitePoolOptions::new().max_connections(5);
        if database_url.contains(":memory:") {
            // Every in-memory connection is its own database; keep exactly one alive.
            options = options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = options.connect(database_url).await?;

        let storage = Self { pool };
        storage.initialize_schema().await?;

        Ok(storage)
    }

    async fn initialize_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS alerts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                subject_id TEXT NOT NULL,
                device_time TEXT NOT NULL,
                body TEXT NOT NULL,
                recorded_ts INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_alerts_subject
            ON alerts(subject_id, id)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Record an alert and return its row id.
    pub async fn insert_alert(&self, alert: &Alert, recorded_at: DateTime<Utc>) -> anyhow::Result<i64> {
        let body = serde_json::to_string(alert)?;

        let result = sqlx::query(
            r#"
            INSERT INTO alerts (kind, subject_id, device_time, body, recorded_ts)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(alert.kind().as_str())
        .bind(alert.subject_id())
        .bind(alert.timestamp().to_string())
        .bind(body)
        .bind(recorded_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Most recent alerts first, optionally restricted to one kind.
    pub async fn recent_alerts(
        &self,
        limit: u32,
        kind: Option<AlertKind>,
    ) -> anyhow::Result<Vec<StoredAlert>> {
        let rows = match kind {
            Some(kind) => {
                sqlx::query(
                    r#"
                    SELECT id, body, recorded_ts FROM alerts
                    WHERE kind = ?
                    ORDER BY id DESC
                    LIMIT ?
                    "#,
                )
                .bind(kind.as_str())
                .bind(i64::from(limit))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT id, body, recorded_ts FROM alerts
                    ORDER BY id DESC
                    LIMIT ?
                    "#,
                )
                .bind(i64::from(limit))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(stored_alert).collect()
    }

    /// Every alert recorded for one subject, most recent first.
    pub async fn alerts_for_subject(&self, subject_id: &str) -> anyhow::Result<Vec<StoredAlert>> {
        let rows = sqlx::query(
            r#"
            SELECT id, body, recorded_ts FROM alerts
            WHERE subject_id = ?
            ORDER BY id DESC
            "#,
        )
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(stored_alert).collect()
    }

    pub async fn count_alerts(&self) -> anyhow::Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM alerts")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get("total"))
    }
}

fn stored_alert(row: &SqliteRow) -> anyhow::Result<StoredAlert> {
    let body: String = row.get("body");
    let recorded_ts: i64 = row.get("recorded_ts");

    Ok(StoredAlert {
        id: row.get("id"),
        recorded_at: Utc
            .timestamp_opt(recorded_ts, 0)
            .single()
            .ok_or_else(|| anyhow::anyhow!("invalid recorded timestamp {recorded_ts}"))?,
        alert: serde_json::from_str(&body)?,
    })
}

/// Drain `alerts` into storage until every sender is gone.
///
/// Failures are logged and the alert dropped; the subscribers that produced
/// the alerts never see them.
pub async fn record_alerts(storage: Storage, mut alerts: UnboundedReceiver<Alert>) -> u64 {
    let mut recorded = 0u64;

    while let Some(alert) = alerts.recv().await {
        match storage.insert_alert(&alert, Utc::now()).await {
            Ok(id) => {
                recorded += 1;
                debug!(id, kind = alert.kind().as_str(), "Alert recorded");
            }
            Err(e) => {
                warn!(
                    subject_id = %alert.subject_id(),
                    kind = alert.kind().as_str(),
                    error = %e,
                    "Failed to record alert"
                );
            }
        }
    }

    recorded
}
