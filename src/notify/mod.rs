//! Mutation notifications. Every successful create/update/delete emits exactly
//! one event, awaited before the response is sent.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::SessionContext;
use crate::config::NotificationConfig;
use crate::entities::EntityKind;
use crate::types::Operation;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Notification endpoint returned {0}")]
    Rejected(reqwest::StatusCode),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub entity: EntityKind,
    pub resource_id: Uuid,
    pub operation: Operation,
    pub tenant_id: String,
    pub actor_id: String,
    pub occurred_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(session: &SessionContext, entity: EntityKind, resource_id: Uuid, operation: Operation) -> Self {
        Self {
            entity,
            resource_id,
            operation,
            tenant_id: session.tenant_id.clone(),
            actor_id: session.user_id.clone(),
            occurred_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// POSTs each notification as JSON to a configured URL
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(notification).send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status()));
        }
        tracing::debug!(entity = %notification.entity, id = %notification.resource_id, "notification delivered");
        Ok(())
    }
}

/// Records notifications in the log only; used when no webhook is configured
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            entity = %notification.entity,
            id = %notification.resource_id,
            operation = %notification.operation,
            tenant = %notification.tenant_id,
            actor = %notification.actor_id,
            "record changed"
        );
        Ok(())
    }
}

/// Webhook notifier when a URL is configured, log notifier otherwise
pub fn from_config(config: &NotificationConfig) -> Result<Box<dyn Notifier>, NotifyError> {
    match &config.webhook_url {
        Some(url) => {
            tracing::info!("Sending change notifications to {}", url);
            Ok(Box::new(WebhookNotifier::new(url.clone(), Duration::from_millis(config.timeout_ms))?))
        }
        None => Ok(Box::new(LogNotifier)),
    }
}
