use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DispatchError;
use crate::models::notification::{Notification, Severity};
use crate::store::Repository;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        recipient_id: Uuid,
        title: &str,
        message: &str,
        severity: Severity,
        related_id: Option<Uuid>,
    ) -> Result<(), DispatchError>;
}

/// Persists notifications through the gateway; delivery to clients rides on
/// the store's change feed.
pub struct StoreNotificationSink {
    repo: Repository,
}

impl StoreNotificationSink {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl NotificationSink for StoreNotificationSink {
    async fn notify(
        &self,
        recipient_id: Uuid,
        title: &str,
        message: &str,
        severity: Severity,
        related_id: Option<Uuid>,
    ) -> Result<(), DispatchError> {
        let notification = Notification::new(recipient_id, title, message, severity, related_id);
        self.repo.insert(&notification).await
    }
}
