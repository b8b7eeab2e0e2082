//! Worker configuration

use url::Url;

/// Configuration injected into the lifecycle controller and request router.
///
/// Cache names carry a version suffix; bumping the suffix on deploy is what
/// makes the prior generation stale, and the next activation destroys it.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Name of the current static-shell cache generation.
    pub static_cache_name: String,
    /// Name of the current API-response cache generation.
    pub api_cache_name: String,
    /// URLs that must be present in the static cache immediately after
    /// install. Relative paths are resolved against `app_origin`. This list
    /// must stay in sync with actual build output or install fails.
    pub asset_manifest: Vec<String>,
    /// Path prefix that routes a GET to the network-first strategy.
    pub api_prefix: String,
    /// Origin of the application shell; also the root URL brought to the
    /// foreground on notification click.
    pub app_origin: Url,
}

impl WorkerConfig {
    /// Default configuration for the Silo Monitor shell at `app_origin`.
    pub fn new(app_origin: Url) -> Self {
        Self {
            static_cache_name: "silo-static-v1".to_string(),
            api_cache_name: "silo-api-v1".to_string(),
            asset_manifest: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/manifest.json".to_string(),
                "/assets/index.js".to_string(),
                "/assets/index.css".to_string(),
            ],
            api_prefix: "/api/".to_string(),
            app_origin,
        }
    }

    /// True when `name` is one of the two current cache generations.
    pub fn is_current_generation(&self, name: &str) -> bool {
        name == self.static_cache_name || name == self.api_cache_name
    }

    /// Resolve a manifest entry against the application origin.
    pub fn resolve_asset(&self, asset: &str) -> Result<Url, url::ParseError> {
        self.app_origin.join(asset)
    }
}
