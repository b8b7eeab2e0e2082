//! The offline worker: event entry points over the composed components

use crate::cache::{CacheError, CacheStore};
use crate::clients::ClientRegistry;
use crate::config::WorkerConfig;
use crate::fetch::{Fetch, FetchError, Request};
use crate::lifecycle::{InstallError, LifecycleController, WorkerState};
use crate::push::{Notification, Notifier, PushDelivery};
use crate::router::RequestRouter;
use crate::strategy::FetchOutcome;
use std::sync::Arc;

/// The interception-and-caching agent.
///
/// One instance per worker version. Every browser-dispatched event maps to
/// exactly one handler below, each run to completion; work that outlives
/// response delivery is surfaced through [`FetchOutcome::pending_write`].
pub struct OfflineWorker {
    config: Arc<WorkerConfig>,
    clients: Arc<ClientRegistry>,
    lifecycle: LifecycleController,
    router: RequestRouter,
    push: PushDelivery,
}

impl OfflineWorker {
    pub fn new(
        config: WorkerConfig,
        caches: Arc<dyn CacheStore>,
        fetcher: Arc<dyn Fetch>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let config = Arc::new(config);
        let clients = Arc::new(ClientRegistry::new());
        let lifecycle = LifecycleController::new(
            Arc::clone(&config),
            Arc::clone(&caches),
            Arc::clone(&fetcher),
            Arc::clone(&clients),
        );
        let router = RequestRouter::new(Arc::clone(&config), Arc::clone(&caches), fetcher);
        let push = PushDelivery::new(notifier, Arc::clone(&clients), config.app_origin.clone());

        Self {
            config,
            clients,
            lifecycle,
            router,
            push,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Registry of open application pages this worker controls.
    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub fn state(&self) -> WorkerState {
        self.lifecycle.state()
    }

    /// Install event: prime the static cache from the asset manifest.
    pub async fn handle_install(&self) -> Result<(), InstallError> {
        self.lifecycle.install().await
    }

    /// Activate event: destroy stale cache generations, then claim clients.
    pub async fn handle_activate(&self) -> Result<(), CacheError> {
        self.lifecycle.activate().await
    }

    /// Fetch event: classify the request and apply its strategy. `Err`
    /// means the request failed at the network with no cached fallback.
    pub async fn handle_fetch(&self, request: &Request) -> Result<FetchOutcome, FetchError> {
        self.router.route(request).await
    }

    /// Push event: render exactly one notification.
    pub async fn handle_push(&self, payload: &[u8]) -> Notification {
        self.push.handle_push(payload).await
    }

    /// Notification click: dismiss it and bring the application root to the
    /// foreground. Returns the client id that ended up focused.
    pub async fn handle_notification_click(&self, tag: &str) -> String {
        self.push.handle_click(tag).await
    }
}
