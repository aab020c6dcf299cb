use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::notifications::model::NotificationType;
use crate::notifications::repo::NotificationsRepo;

/// Best-effort delivery. Implementations log failures and never surface them.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        recipient_id: Uuid,
        kind: NotificationType,
        title: &str,
        body: &str,
        payload: Option<Value>,
    );
}

pub type SharedNotifier = Arc<dyn Notifier>;

/// Writes every notification to the `notifications` table; clients poll it.
#[derive(Clone)]
pub struct PgNotifier {
    repo: NotificationsRepo,
}

impl PgNotifier {
    pub fn new(repo: NotificationsRepo) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl Notifier for PgNotifier {
    async fn send(
        &self,
        recipient_id: Uuid,
        kind: NotificationType,
        title: &str,
        body: &str,
        payload: Option<Value>,
    ) {
        match self.repo.insert(recipient_id, kind, title, body, payload).await {
            Ok(id) => tracing::debug!(
                notification_id = %id,
                recipient_id = %recipient_id,
                kind = kind.as_str(),
                title,
                "notification stored"
            ),
            Err(e) => tracing::warn!(
                recipient_id = %recipient_id,
                kind = kind.as_str(),
                title,
                error = %e,
                "notification dropped"
            ),
        }
    }
}
