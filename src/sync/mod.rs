//! Boundary to the DHIS2↔RapidPro synchronization pipeline.
//!
//! Inbound webhook payloads are queued for delivery and administrative
//! triggers stamp the poller; the pipeline itself (contact extraction, report
//! transformation, outbound delivery) runs off these tables.

use chrono::{DateTime, Utc};

use crate::error::BridgeResult;
use crate::storage::BridgeRepository;

/// Kinds of administrative trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// Pull contacts and push reports.
    Sync,
    /// Scan for overdue reports.
    Scan,
    /// Send reminder campaigns.
    Reminders,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Sync => "sync",
            TriggerKind::Scan => "scan",
            TriggerKind::Reminders => "reminders",
        }
    }
}

/// Format a poller timestamp the way downstream DHIS2 queries expect it:
/// `yyyy-MM-dd'T'HH:mm:ss.SSS`, UTC, no offset suffix.
pub fn format_last_run_at(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

/// Entry point the HTTP surface delegates to once a request has cleared
/// authentication.
#[derive(Clone)]
pub struct SyncService {
    repository: BridgeRepository,
}

impl SyncService {
    pub fn new(repository: BridgeRepository) -> Self {
        Self { repository }
    }

    /// Queue a webhook payload received from RapidPro.
    pub async fn handle_webhook(&self, payload: serde_json::Value) -> BridgeResult<()> {
        self.repository
            .save_webhook_message(&payload, Utc::now())
            .await?;
        tracing::info!("Queued webhook message from RapidPro");
        Ok(())
    }

    /// Run an administrative trigger, returning the previous run timestamp in
    /// the poller's wire format.
    pub async fn trigger(&self, kind: TriggerKind) -> BridgeResult<Option<String>> {
        let previous = self.repository.last_run_at().await?.map(format_last_run_at);
        self.repository.record_run(Utc::now()).await?;

        tracing::info!(
            trigger = kind.as_str(),
            last_run_at = previous.as_deref().unwrap_or("never"),
            "Administrative trigger executed"
        );

        Ok(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sqlx::sqlite::SqlitePool;

    async fn setup_service() -> SyncService {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to create test database");
        let repo = BridgeRepository::new(pool);
        repo.init_schema().await.expect("Failed to init schema");
        SyncService::new(repo)
    }

    #[test]
    fn test_format_last_run_at_millisecond_precision() {
        let at = Utc.with_ymd_and_hms(2024, 3, 7, 14, 5, 9).unwrap()
            + chrono::Duration::milliseconds(120);
        assert_eq!(format_last_run_at(at), "2024-03-07T14:05:09.120");
    }

    #[tokio::test]
    async fn test_first_trigger_has_no_previous_run() {
        let service = setup_service().await;

        assert!(service.trigger(TriggerKind::Sync).await.unwrap().is_none());

        // Second trigger sees the timestamp the first one recorded
        let previous = service.trigger(TriggerKind::Sync).await.unwrap();
        assert!(previous.is_some());
    }

    #[tokio::test]
    async fn test_handle_webhook_queues_payload() {
        let service = setup_service().await;
        let payload = serde_json::json!({"contact": {"uuid": "c-1"}, "results": {}});
        service.handle_webhook(payload).await.unwrap();
    }
}
