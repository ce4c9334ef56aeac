/// Generic event log
///
/// Every workflow step, workflow lifecycle change and piece of agent feedback lands
/// here as a typed row with a JSON payload. This is an audit trail, not entity storage.

use crate::store::database::timestamp;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{sqlite::SqlitePool, Row};

/// Who may see a log row in the CRM UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Private,
    Team,
    Public,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Team => "team",
            Visibility::Public => "public",
        }
    }
}

/// A row to append to the log
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub kind: String,
    pub event_summary: String,
    pub payload: Value,
    pub company_id: Option<String>,
    pub visibility: Visibility,
}

impl LogEntry {
    pub fn new(kind: &str, event_summary: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.to_string(),
            event_summary: event_summary.into(),
            payload,
            company_id: None,
            visibility: Visibility::Team,
        }
    }

    pub fn for_company(mut self, company_id: Option<&str>) -> Self {
        self.company_id = company_id.map(str::to_string);
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }
}

/// A stored log row
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub id: String,
    pub kind: String,
    pub event_summary: String,
    pub payload: Value,
    pub company_id: Option<String>,
    pub visibility: String,
    pub timestamp: String,
}

#[derive(Debug, Clone)]
pub struct LogStore {
    pool: SqlitePool,
}

impl LogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a row, returning its generated id
    pub async fn record(&self, entry: LogEntry) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO logs (id, type, event_summary, payload, company_id, visibility, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&entry.kind)
        .bind(&entry.event_summary)
        .bind(serde_json::to_string(&entry.payload)?)
        .bind(&entry.company_id)
        .bind(entry.visibility.as_str())
        .bind(timestamp(chrono::Utc::now()))
        .execute(&self.pool)
        .await?;

        tracing::debug!("📝 Logged {}: {}", entry.kind, entry.event_summary);

        Ok(id)
    }

    /// Rows of one type, oldest first
    pub async fn list_by_kind(&self, kind: &str) -> Result<Vec<LogRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, type, event_summary, payload, company_id, visibility, timestamp
            FROM logs WHERE type = ? ORDER BY timestamp ASC, rowid ASC
            "#,
        )
        .bind(kind)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let payload: String = row.get("payload");
            records.push(LogRecord {
                id: row.get("id"),
                kind: row.get("type"),
                event_summary: row.get("event_summary"),
                payload: serde_json::from_str(&payload)?,
                company_id: row.get("company_id"),
                visibility: row.get("visibility"),
                timestamp: row.get("timestamp"),
            });
        }

        Ok(records)
    }
}
