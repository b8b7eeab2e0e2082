//! Request classification and dispatch

use crate::cache::CacheStore;
use crate::config::WorkerConfig;
use crate::fetch::{Fetch, FetchError, Request};
use crate::strategy::{self, FetchOutcome};
use std::sync::Arc;
use tracing::debug;

/// Which discipline applies to an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Not interceptable: forwarded to the network untouched, no cache
    /// read or write. Covers non-GET methods and non-HTTP(S) schemes.
    Bypass,
    /// GET under the API prefix: network-first with cache fallback.
    Api,
    /// Any other GET: cache-first against the static shell.
    StaticAsset,
}

pub fn classify(config: &WorkerConfig, request: &Request) -> RouteClass {
    if !request.is_get() || !request.is_http() {
        return RouteClass::Bypass;
    }
    if request.url.path().starts_with(&config.api_prefix) {
        return RouteClass::Api;
    }
    RouteClass::StaticAsset
}

/// Dispatches every intercepted request to the strategy its class demands.
pub struct RequestRouter {
    config: Arc<WorkerConfig>,
    caches: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetch>,
}

impl RequestRouter {
    pub fn new(
        config: Arc<WorkerConfig>,
        caches: Arc<dyn CacheStore>,
        fetcher: Arc<dyn Fetch>,
    ) -> Self {
        Self {
            config,
            caches,
            fetcher,
        }
    }

    /// Route one request. `Err` means the request failed at the network
    /// with no cached entry to fall back on.
    pub async fn route(&self, request: &Request) -> Result<FetchOutcome, FetchError> {
        let class = classify(&self.config, request);
        debug!("{} {} -> {:?}", request.method, request.url, class);

        match class {
            RouteClass::Bypass => {
                // Side-effecting and non-HTTP requests go straight through
                let response = self.fetcher.fetch(request).await?;
                Ok(FetchOutcome::direct(response))
            }
            RouteClass::Api => {
                strategy::network_first(&self.config, &self.caches, &self.fetcher, request).await
            }
            RouteClass::StaticAsset => {
                strategy::cache_first(&self.config, &self.caches, &self.fetcher, request).await
            }
        }
    }
}
