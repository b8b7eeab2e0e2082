//! The two fetch disciplines: cache-first and network-first

use crate::cache::{CacheStore, RequestKey, StoredResponse};
use crate::config::WorkerConfig;
use crate::fetch::{Fetch, FetchError, Request, Response};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Outcome of one intercepted fetch: the response handed back to the page,
/// plus the still-pending cache write, if any.
///
/// The join handle is the explicit form of the keep-the-event-alive
/// contract: the response is delivered immediately, and the host awaits
/// [`FetchOutcome::settled`] before tearing the event down.
pub struct FetchOutcome {
    pub response: Response,
    pub pending_write: Option<JoinHandle<()>>,
}

impl FetchOutcome {
    pub(crate) fn direct(response: Response) -> Self {
        Self {
            response,
            pending_write: None,
        }
    }

    /// Wait for the deferred cache write to settle, then yield the response.
    pub async fn settled(self) -> Response {
        if let Some(handle) = self.pending_write {
            let _ = handle.await;
        }
        self.response
    }
}

/// Only successful 200 GET responses are ever written into the API cache;
/// anything else must not overwrite a potentially-good snapshot.
fn cacheable(request: &Request, response: &Response) -> bool {
    request.is_get() && response.status == 200
}

/// Cache-first, for static shell assets.
///
/// A hit is always correct because shell assets are versioned by cache
/// generation name. On a miss the live result is returned without being
/// written back; the asset manifest is the sole population path.
pub(crate) async fn cache_first(
    config: &WorkerConfig,
    caches: &Arc<dyn CacheStore>,
    fetcher: &Arc<dyn Fetch>,
    request: &Request,
) -> Result<FetchOutcome, FetchError> {
    let key = RequestKey::from_request(request);

    match caches.match_entry(&config.static_cache_name, &key).await {
        Ok(Some(stored)) => {
            debug!("Static cache hit: {}", key);
            return Ok(FetchOutcome::direct(stored.into_response()));
        }
        Ok(None) => {}
        Err(e) => warn!("Static cache lookup failed for {}: {}", key, e),
    }

    let response = fetcher.fetch(request).await?;
    Ok(FetchOutcome::direct(response))
}

/// Network-first with cache fallback, for API calls.
///
/// The live response is returned unconditionally and never blocked on the
/// cache write; on network failure the last cached snapshot for the exact
/// key is served instead, and only when none exists does the failure
/// propagate.
pub(crate) async fn network_first(
    config: &WorkerConfig,
    caches: &Arc<dyn CacheStore>,
    fetcher: &Arc<dyn Fetch>,
    request: &Request,
) -> Result<FetchOutcome, FetchError> {
    let key = RequestKey::from_request(request);

    match fetcher.fetch(request).await {
        Ok(response) => {
            if !cacheable(request, &response) {
                return Ok(FetchOutcome::direct(response));
            }

            // Duplicate the snapshot before handing the response back; the
            // two copies share no consumption state.
            let snapshot = StoredResponse::from_response(&response);
            let caches = Arc::clone(caches);
            let cache_name = config.api_cache_name.clone();
            let write_key = key.clone();
            let handle = tokio::spawn(async move {
                if let Err(e) = caches.put(&cache_name, &write_key, &snapshot).await {
                    // Logged only; the live response was already delivered
                    warn!("API cache write failed for {}: {}", write_key, e);
                }
            });

            Ok(FetchOutcome {
                response,
                pending_write: Some(handle),
            })
        }
        Err(network_err) => {
            match caches.match_entry(&config.api_cache_name, &key).await {
                Ok(Some(stored)) => {
                    debug!("Network down, serving cached API response: {}", key);
                    Ok(FetchOutcome::direct(stored.into_response()))
                }
                Ok(None) => Err(network_err),
                Err(e) => {
                    warn!("API cache fallback lookup failed for {}: {}", key, e);
                    Err(network_err)
                }
            }
        }
    }
}
