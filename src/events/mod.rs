//! Auth audit trail.
//!
//! Authentication and authorization events (logins, denials, tenant
//! switches) are pushed onto a broadcast bus and projected into the
//! `audit_log` table by a background listener. Recording is fire-and-forget:
//! a full bus or a failed insert never fails the request that produced the
//! event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Severity levels controlling audit retention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Security-relevant events, never auto-trimmed.
    Critical,
    /// Normal auth activity (default).
    #[default]
    Important,
    /// High-volume events trimmed aggressively.
    Noise,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
            Severity::Noise => "noise",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
    pub actor_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub severity: Severity,
    pub detail: Value,
}

impl AuditEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            occurred_at: Utc::now(),
            actor_id: None,
            company_id: None,
            severity: Severity::Important,
            detail: Value::Null,
        }
    }

    pub fn actor(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn company(mut self, company_id: Option<Uuid>) -> Self {
        self.company_id = company_id;
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn detail(mut self, detail: Value) -> Self {
        self.detail = detail;
        self
    }
}

pub type EventBus = broadcast::Sender<AuditEvent>;

pub fn init_event_bus() -> (EventBus, broadcast::Receiver<AuditEvent>) {
    broadcast::channel(1024)
}

/// Fire and forget; a lagging or closed bus drops the event.
pub fn record(bus: &EventBus, event: AuditEvent) {
    let _ = bus.send(event);
}

/// Background projection of audit events into SQLite.
///
/// Each row is chained to its predecessor with SHA-256(prev_hash || payload)
/// so after-the-fact tampering with the log is detectable.
pub async fn start_audit_listener(mut rx: broadcast::Receiver<AuditEvent>, pool: SqlitePool) {
    tracing::info!("audit listener started");
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "audit listener lagged; events dropped");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let payload = serde_json::to_string(&event.detail).unwrap_or_default();

        let prev_hash: Option<String> =
            sqlx::query_scalar("SELECT hash FROM audit_log ORDER BY rowid DESC LIMIT 1")
                .fetch_optional(&pool)
                .await
                .ok()
                .flatten();

        let hash = chain_hash(prev_hash.as_deref(), &payload);

        let result = sqlx::query(
            "INSERT INTO audit_log (id, event_name, actor_id, company_id, detail, severity, prev_hash, hash, occurred_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(event.id)
        .bind(&event.name)
        .bind(event.actor_id)
        .bind(event.company_id)
        .bind(&payload)
        .bind(event.severity.as_str())
        .bind(&prev_hash)
        .bind(&hash)
        .bind(event.occurred_at)
        .execute(&pool)
        .await;

        if let Err(err) = result {
            tracing::error!(event = %event.name, error = %err, "failed to save audit log entry");
        }
    }
}

fn chain_hash(prev_hash: Option<&str>, payload: &str) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    if let Some(prev) = prev_hash {
        hasher.update(prev.as_bytes());
    }
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_hash_depends_on_predecessor() {
        let first = chain_hash(None, "a");
        let chained = chain_hash(Some(&first), "a");
        assert_ne!(first, chained);
    }

    #[test]
    fn event_builder_fills_fields() {
        let actor = Uuid::new_v4();
        let event = AuditEvent::new("auth.login")
            .actor(actor)
            .severity(Severity::Critical)
            .detail(serde_json::json!({"username": "x"}));
        assert_eq!(event.name, "auth.login");
        assert_eq!(event.actor_id, Some(actor));
        assert_eq!(event.severity, Severity::Critical);
    }
}
