//! Install/activate lifecycle of the offline worker
//!
//! The controller owns the install-time pre-population of the static cache
//! and the activation-time eviction of stale cache generations.

use crate::cache::{CacheError, CacheStore, RequestKey, StoredResponse};
use crate::clients::ClientRegistry;
use crate::config::WorkerConfig;
use crate::fetch::{Fetch, FetchError, Request};
use futures::future::try_join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Lifecycle states of one worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Pre-populating the static cache.
    Installing,
    /// Installed, waiting for activation.
    Waiting,
    /// Evicting stale cache generations.
    Activating,
    /// Controlling pages.
    Active,
    /// Install failed; the previous worker, if any, stays in control.
    Redundant,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Installing => write!(f, "installing"),
            WorkerState::Waiting => write!(f, "waiting"),
            WorkerState::Activating => write!(f, "activating"),
            WorkerState::Active => write!(f, "active"),
            WorkerState::Redundant => write!(f, "redundant"),
        }
    }
}

/// Error type for the install step
#[derive(Error, Debug)]
pub enum InstallError {
    #[error("Invalid manifest entry: {0}")]
    InvalidManifestEntry(String),

    #[error("Asset fetch failed for {url}: {source}")]
    AssetFetch { url: String, source: FetchError },

    #[error("Asset {url} returned HTTP {status}")]
    AssetStatus { url: String, status: u16 },

    #[error(transparent)]
    Cache(#[from] CacheError),
}

pub struct LifecycleController {
    config: Arc<WorkerConfig>,
    caches: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetch>,
    clients: Arc<ClientRegistry>,
    state: Mutex<WorkerState>,
    skip_waiting: AtomicBool,
}

impl LifecycleController {
    pub fn new(
        config: Arc<WorkerConfig>,
        caches: Arc<dyn CacheStore>,
        fetcher: Arc<dyn Fetch>,
        clients: Arc<ClientRegistry>,
    ) -> Self {
        Self {
            config,
            caches,
            fetcher,
            clients,
            state: Mutex::new(WorkerState::Installing),
            skip_waiting: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap()
    }

    fn set_state(&self, state: WorkerState) {
        debug!("Worker state -> {}", state);
        *self.state.lock().unwrap() = state;
    }

    /// Signal that activation should not wait for all pages to close.
    pub fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    pub fn waiting_skipped(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Install: write every manifest asset into the current static cache.
    ///
    /// All-or-nothing: every asset is fetched up front and nothing is
    /// written unless all of them succeeded with a 2xx status. On failure
    /// this worker version becomes redundant and the previous one, if any,
    /// remains in control.
    pub async fn install(&self) -> Result<(), InstallError> {
        self.set_state(WorkerState::Installing);
        info!(
            "Installing {}: {} manifest assets",
            self.config.static_cache_name,
            self.config.asset_manifest.len()
        );

        match self.populate_static_cache().await {
            Ok(count) => {
                info!(
                    "Install complete: {} assets cached in {}",
                    count, self.config.static_cache_name
                );
                self.skip_waiting();
                self.set_state(WorkerState::Waiting);
                Ok(())
            }
            Err(e) => {
                warn!("Install failed, nothing was cached: {}", e);
                self.set_state(WorkerState::Redundant);
                Err(e)
            }
        }
    }

    async fn populate_static_cache(&self) -> Result<usize, InstallError> {
        let mut requests = Vec::with_capacity(self.config.asset_manifest.len());
        for asset in &self.config.asset_manifest {
            let url = self
                .config
                .resolve_asset(asset)
                .map_err(|_| InstallError::InvalidManifestEntry(asset.clone()))?;
            requests.push(Request::get(url));
        }

        // Fetch everything before writing anything
        let entries = try_join_all(requests.iter().map(|request| async move {
            let response = self.fetcher.fetch(request).await.map_err(|e| {
                InstallError::AssetFetch {
                    url: request.url.to_string(),
                    source: e,
                }
            })?;
            if !response.is_success() {
                return Err(InstallError::AssetStatus {
                    url: request.url.to_string(),
                    status: response.status,
                });
            }
            Ok((RequestKey::from_request(request), response))
        }))
        .await?;

        self.caches.open(&self.config.static_cache_name).await?;
        for (key, response) in &entries {
            self.caches
                .put(
                    &self.config.static_cache_name,
                    key,
                    &StoredResponse::from_response(response),
                )
                .await?;
        }
        Ok(entries.len())
    }

    /// Activate: destroy stale cache generations, then claim all clients.
    ///
    /// Cleanup always completes before clients are claimed, so pages never
    /// observe a half-cleaned cache set. Individual deletion failures are
    /// logged and cleanup continues.
    pub async fn activate(&self) -> Result<(), CacheError> {
        self.set_state(WorkerState::Activating);
        if self.waiting_skipped() {
            debug!("Activation fast-tracked, waiting period skipped");
        }

        let names = self.caches.cache_names().await?;
        for name in names {
            if self.config.is_current_generation(&name) {
                continue;
            }
            match self.caches.delete_cache(&name).await {
                Ok(true) => info!("Deleted stale cache generation {}", name),
                Ok(false) => {}
                Err(e) => warn!("Failed to delete stale cache {}: {}", name, e),
            }
        }

        // Both current generations exist from here on
        self.caches.open(&self.config.static_cache_name).await?;
        self.caches.open(&self.config.api_cache_name).await?;

        let claimed = self.clients.claim();
        debug!("Claimed {} open clients", claimed);
        self.set_state(WorkerState::Active);
        info!(
            "Worker active: generations {} / {}",
            self.config.static_cache_name, self.config.api_cache_name
        );
        Ok(())
    }
}
