//! Network transport types and the fetch seam

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Error type for live network fetches
#[derive(Error, Debug)]
pub enum FetchError {
    /// No response at all: offline, DNS failure, timeout.
    #[error("Network unreachable: {0}")]
    Transport(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported method: {0}")]
    UnsupportedMethod(String),
}

/// An intercepted outbound request
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub url: Url,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Request {
    pub fn new(method: &str, url: Url) -> Self {
        Self {
            method: method.to_string(),
            url,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    /// Whether the request targets an HTTP(S) URL at all.
    pub fn is_http(&self) -> bool {
        matches!(self.url.scheme(), "http" | "https")
    }
}

/// A response snapshot handed back to the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    /// Whether this response was served from a cache rather than the network.
    pub from_cache: bool,
}

impl Response {
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body,
            from_cache: false,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for performing live network fetches
///
/// The worker core never talks to the network directly; this seam lets the
/// host supply the real HTTP client and tests supply programmable fakes.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Perform a live fetch. `Err` means no response at all was obtained.
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}

/// reqwest-backed implementation of `Fetch`
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create an HTTP fetcher with a bounded timeout and redirect policy.
    pub fn new(user_agent: Option<&str>) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::limited(5));

        if let Some(ua) = user_agent {
            builder = builder.user_agent(ua);
        }

        let client = builder
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| FetchError::UnsupportedMethod(request.method.clone()))?;

        let mut outbound = self.client.request(method, request.url.clone());
        for (name, value) in &request.headers {
            outbound = outbound.header(name, value);
        }
        if !request.body.is_empty() {
            outbound = outbound.body(request.body.clone());
        }

        let response = outbound
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?
            .to_vec();

        Ok(Response {
            status,
            headers,
            body,
            from_cache: false,
        })
    }
}
