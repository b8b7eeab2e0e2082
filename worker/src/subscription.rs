//! Backend notifications API client and the local subscription mirror

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

/// Error type for the notifications API and the local mirror
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("VAPID public key missing from response")]
    MissingVapidKey,

    #[error("Invalid VAPID public key: {0}")]
    InvalidVapidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Keying material the push engine attaches to a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// A browser-issued push subscription: the handle the backend uses to
/// deliver asynchronous messages to this instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

#[derive(Debug, Deserialize)]
struct VapidKeyResponse {
    vapid_public_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct UnsubscribeRequest<'a> {
    endpoint: &'a str,
}

/// Decode a Base64url VAPID public key, tolerating padded and unpadded input.
pub fn decode_vapid_public_key(key: &str) -> Result<Vec<u8>, ApiError> {
    let trimmed = key.trim_end_matches('=');
    URL_SAFE_NO_PAD
        .decode(trimmed)
        .map_err(|e| ApiError::InvalidVapidKey(e.to_string()))
}

/// Trait over the backend push-subscription endpoints
///
/// The reqwest-backed [`NotificationsApi`] is the production implementation;
/// tests substitute fakes.
#[async_trait]
pub trait NotificationsBackend: Send + Sync {
    /// `GET {api_base}/notifications/vapid_public`
    async fn vapid_public_key(&self) -> Result<String, ApiError>;

    /// `POST {api_base}/notifications/subscribe`
    async fn subscribe(&self, subscription: &PushSubscription) -> Result<(), ApiError>;

    /// `POST {api_base}/notifications/unsubscribe`
    async fn unsubscribe(&self, endpoint: &str) -> Result<(), ApiError>;
}

/// HTTP client for the backend notifications endpoints.
pub struct NotificationsApi {
    client: reqwest::Client,
    api_base: Url,
    bearer_token: Option<String>,
}

impl NotificationsApi {
    pub fn new(api_base: Url, bearer_token: Option<String>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            api_base,
            bearer_token,
        })
    }

    fn endpoint_url(&self, path: &str) -> Result<Url, ApiError> {
        let joined = format!("{}{}", self.api_base.as_str().trim_end_matches('/'), path);
        Url::parse(&joined).map_err(|e| ApiError::Transport(e.to_string()))
    }

    fn with_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(ApiError::Status {
                status: response.status().as_u16(),
                url: response.url().to_string(),
            })
        }
    }
}

#[async_trait]
impl NotificationsBackend for NotificationsApi {
    async fn vapid_public_key(&self) -> Result<String, ApiError> {
        let url = self.endpoint_url("/notifications/vapid_public")?;
        let response = self
            .with_auth(self.client.get(url))
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let parsed: VapidKeyResponse = Self::check(response)?
            .json()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        parsed.vapid_public_key.ok_or(ApiError::MissingVapidKey)
    }

    async fn subscribe(&self, subscription: &PushSubscription) -> Result<(), ApiError> {
        let url = self.endpoint_url("/notifications/subscribe")?;
        let response = self
            .with_auth(self.client.post(url))
            .json(subscription)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Self::check(response)?;
        info!("Push subscription forwarded to backend");
        Ok(())
    }

    async fn unsubscribe(&self, endpoint: &str) -> Result<(), ApiError> {
        let url = self.endpoint_url("/notifications/unsubscribe")?;
        let response = self
            .with_auth(self.client.post(url))
            .json(&UnsubscribeRequest { endpoint })
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Self::check(response)?;
        info!("Push subscription revoked at backend");
        Ok(())
    }
}

/// Record persisted by the local mirror.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSubscription {
    pub subscription: PushSubscription,
    pub saved_at: DateTime<Utc>,
}

/// Durable local copy of the active subscription, kept so logout can revoke
/// it even when the push engine has already forgotten it.
pub struct SubscriptionStore {
    path: PathBuf,
}

impl SubscriptionStore {
    /// Create a subscription store under `dir`, creating the directory if
    /// it doesn't exist.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self, ApiError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            path: dir.join("push_subscription.json"),
        })
    }

    /// Store the subscription atomically via a temporary file.
    pub fn save(&self, subscription: &PushSubscription) -> Result<(), ApiError> {
        let record = StoredSubscription {
            subscription: subscription.clone(),
            saved_at: Utc::now(),
        };
        let data = serde_json::to_vec_pretty(&record)?;

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &data)?;
        fs::rename(&temp_path, &self.path)?;

        debug!("Mirrored push subscription endpoint locally");
        Ok(())
    }

    pub fn load(&self) -> Result<Option<StoredSubscription>, ApiError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = fs::read(&self.path)?;
        Ok(Some(serde_json::from_slice(&data)?))
    }

    /// Remove the mirrored record. Returns whether one existed.
    pub fn clear(&self) -> Result<bool, ApiError> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
