//! Registration and subscription flow consumed by the application shell
//!
//! After registering the worker, the shell checks notification permission,
//! fetches the VAPID public key, derives a push subscription through the
//! push engine, forwards it to the backend, and mirrors the endpoint
//! locally so logout can revoke it.

use crate::subscription::{
    ApiError, NotificationsBackend, PushSubscription, SubscriptionStore, decode_vapid_public_key,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Notification permission as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPermission {
    /// Not asked yet; may be requested.
    Default,
    Granted,
    Denied,
}

/// Error type for the registration flow
#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Push engine error: {0}")]
    Engine(String),
}

/// Trait over the host push engine
#[async_trait]
pub trait PushEngine: Send + Sync {
    /// Current notification permission state.
    fn permission(&self) -> NotificationPermission;

    /// Prompt the user when permission hasn't been decided yet.
    async fn request_permission(&self) -> Result<NotificationPermission, RegistrationError>;

    /// The subscription this instance already holds, if any.
    async fn get_subscription(&self) -> Result<Option<PushSubscription>, RegistrationError>;

    /// Derive a new subscription authorized by the decoded VAPID key.
    async fn subscribe(
        &self,
        vapid_public_key: &[u8],
    ) -> Result<PushSubscription, RegistrationError>;

    /// Revoke the subscription for `endpoint`. Returns whether one existed.
    async fn unsubscribe(&self, endpoint: &str) -> Result<bool, RegistrationError>;
}

/// Drives the subscription lifecycle against the backend.
pub struct PushRegistrar {
    api: Arc<dyn NotificationsBackend>,
    engine: Arc<dyn PushEngine>,
    store: SubscriptionStore,
}

impl PushRegistrar {
    pub fn new(
        api: Arc<dyn NotificationsBackend>,
        engine: Arc<dyn PushEngine>,
        store: SubscriptionStore,
    ) -> Self {
        Self { api, engine, store }
    }

    /// Subscribe this instance to push delivery.
    ///
    /// Returns `Ok(None)` when permission ends up anything but granted. An
    /// existing engine subscription is reused rather than re-derived.
    pub async fn register(&self) -> Result<Option<PushSubscription>, RegistrationError> {
        let mut permission = self.engine.permission();
        if permission == NotificationPermission::Default {
            permission = self.engine.request_permission().await?;
        }
        if permission != NotificationPermission::Granted {
            warn!(
                "Notification permission {:?}, skipping push subscription",
                permission
            );
            return Ok(None);
        }

        let key = self.api.vapid_public_key().await?;
        let key = decode_vapid_public_key(&key)?;

        let subscription = match self.engine.get_subscription().await? {
            Some(existing) => existing,
            None => self.engine.subscribe(&key).await?,
        };

        self.api.subscribe(&subscription).await?;

        if let Err(e) = self.store.save(&subscription) {
            warn!("Failed to mirror subscription locally: {}", e);
        }

        info!("Push subscription registered: {}", subscription.endpoint);
        Ok(Some(subscription))
    }

    /// Revoke the subscription on logout. Every step is best-effort: a
    /// failing step is logged and the remaining steps still run.
    pub async fn unregister(&self) -> Result<(), RegistrationError> {
        let endpoint = match self.engine.get_subscription().await {
            Ok(Some(subscription)) => Some(subscription.endpoint),
            Ok(None) => self.stored_endpoint(),
            Err(e) => {
                warn!("Push engine lookup failed during unsubscribe: {}", e);
                self.stored_endpoint()
            }
        };

        if let Some(endpoint) = endpoint {
            if let Err(e) = self.api.unsubscribe(&endpoint).await {
                warn!("Backend unsubscribe failed for {}: {}", endpoint, e);
            }
            if let Err(e) = self.engine.unsubscribe(&endpoint).await {
                warn!("Push engine unsubscribe failed: {}", e);
            }
        }

        if let Err(e) = self.store.clear() {
            warn!("Failed to clear local subscription mirror: {}", e);
        }
        Ok(())
    }

    fn stored_endpoint(&self) -> Option<String> {
        self.store
            .load()
            .ok()
            .flatten()
            .map(|record| record.subscription.endpoint)
    }
}
