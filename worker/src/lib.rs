//! Offline-support worker for the Silo Monitor application
//!
//! A browser-resident agent that intercepts outbound requests, applies a
//! per-request caching discipline (cache-first for the static shell,
//! network-first with cache fallback for API calls), prunes stale cache
//! generations on upgrade, and renders push messages as OS notifications.

pub mod cache;
pub mod clients;
pub mod config;
pub mod fetch;
pub mod lifecycle;
pub mod push;
pub mod registration;
pub mod router;
pub mod strategy;
pub mod subscription;
pub mod worker;

// Re-export commonly used types
pub use cache::{CacheError, CacheStore, RequestKey, StoredResponse};
pub use config::WorkerConfig;
pub use fetch::{Fetch, FetchError, HttpFetcher, Request, Response};
pub use lifecycle::{InstallError, WorkerState};
pub use push::{Notification, Notifier};
pub use strategy::FetchOutcome;
pub use worker::OfflineWorker;

#[cfg(test)]
mod worker_test;
