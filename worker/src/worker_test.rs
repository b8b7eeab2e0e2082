#[cfg(test)]
mod tests {
    use crate::cache::CacheStore;
    use crate::cache::memory::MemoryCacheStore;
    use crate::config::WorkerConfig;
    use crate::fetch::{Fetch, FetchError, Request, Response};
    use crate::lifecycle::WorkerState;
    use crate::push::{DEFAULT_TITLE, Notification, Notifier, NotifyError};
    use crate::worker::OfflineWorker;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use url::Url;

    /// Programmable network: stubbed responses keyed by "METHOD url", an
    /// offline switch, and a log of every request that reached it.
    #[derive(Default)]
    struct FakeFetch {
        responses: Mutex<HashMap<String, Response>>,
        offline: AtomicBool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeFetch {
        fn new() -> Self {
            Self::default()
        }

        fn stub(&self, method: &str, url: &str, status: u16, body: &[u8]) {
            let key = format!("{} {}", method, Url::parse(url).unwrap());
            self.responses
                .lock()
                .unwrap()
                .insert(key, Response::new(status, body.to_vec()));
        }

        fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        fn calls_for(&self, method: &str, url: &str) -> usize {
            let key = format!("{} {}", method, Url::parse(url).unwrap());
            self.calls.lock().unwrap().iter().filter(|c| **c == key).count()
        }

        fn clear_calls(&self) {
            self.calls.lock().unwrap().clear();
        }
    }

    #[async_trait]
    impl Fetch for FakeFetch {
        async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(FetchError::Transport("network unreachable".to_string()));
            }
            let key = format!("{} {}", request.method.to_ascii_uppercase(), request.url);
            self.calls.lock().unwrap().push(key.clone());
            self.responses
                .lock()
                .unwrap()
                .get(&key)
                .cloned()
                .ok_or_else(|| FetchError::Transport(format!("no route to {}", key)))
        }
    }

    /// Notifier that records every shown and dismissed notification.
    #[derive(Default)]
    struct RecordingNotifier {
        shown: Mutex<Vec<Notification>>,
        dismissed: Mutex<Vec<String>>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn show(&self, notification: &Notification) -> Result<(), NotifyError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(NotifyError::PermissionRevoked);
            }
            self.shown.lock().unwrap().push(notification.clone());
            Ok(())
        }

        async fn dismiss(&self, tag: &str) -> Result<(), NotifyError> {
            self.dismissed.lock().unwrap().push(tag.to_string());
            Ok(())
        }
    }

    struct TestWorker {
        worker: OfflineWorker,
        caches: Arc<MemoryCacheStore>,
        fetcher: Arc<FakeFetch>,
        notifier: Arc<RecordingNotifier>,
    }

    fn test_config() -> WorkerConfig {
        let mut config = WorkerConfig::new(Url::parse("https://silo.example").unwrap());
        config.asset_manifest = vec![
            "/".to_string(),
            "/index.html".to_string(),
            "/manifest.json".to_string(),
        ];
        config
    }

    fn create_test_worker(config: WorkerConfig) -> TestWorker {
        let caches = Arc::new(MemoryCacheStore::new());
        let fetcher = Arc::new(FakeFetch::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let worker = OfflineWorker::new(
            config,
            Arc::clone(&caches) as Arc<dyn CacheStore>,
            Arc::clone(&fetcher) as Arc<dyn Fetch>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
        );
        TestWorker {
            worker,
            caches,
            fetcher,
            notifier,
        }
    }

    fn stub_manifest(fetcher: &FakeFetch) {
        fetcher.stub("GET", "https://silo.example/", 200, b"<html>root</html>");
        fetcher.stub("GET", "https://silo.example/index.html", 200, b"<html>shell</html>");
        fetcher.stub("GET", "https://silo.example/manifest.json", 200, b"{\"name\":\"Silo Monitor\"}");
    }

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    // ---- install / activate ----

    #[tokio::test]
    async fn test_install_then_activate_leaves_exactly_two_caches() {
        let t = create_test_worker(test_config());
        stub_manifest(&t.fetcher);

        t.worker.handle_install().await.unwrap();
        assert_eq!(t.worker.state(), WorkerState::Waiting);

        t.worker.handle_activate().await.unwrap();
        assert_eq!(t.worker.state(), WorkerState::Active);

        assert_eq!(
            t.caches.cache_names().await.unwrap(),
            vec!["silo-api-v1".to_string(), "silo-static-v1".to_string()]
        );
        assert_eq!(t.caches.entry_keys("silo-static-v1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_install_is_all_or_nothing() {
        let t = create_test_worker(test_config());
        // "/manifest.json" is deliberately not stubbed
        t.fetcher.stub("GET", "https://silo.example/", 200, b"root");
        t.fetcher.stub("GET", "https://silo.example/index.html", 200, b"shell");

        let result = t.worker.handle_install().await;
        assert!(result.is_err());
        assert_eq!(t.worker.state(), WorkerState::Redundant);

        // Nothing was written, not even the assets that did fetch
        assert!(t.caches.cache_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_install_rejects_non_success_asset() {
        let t = create_test_worker(test_config());
        stub_manifest(&t.fetcher);
        t.fetcher.stub("GET", "https://silo.example/manifest.json", 404, b"gone");

        assert!(t.worker.handle_install().await.is_err());
        assert!(t.caches.cache_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_activation_prunes_stale_generations_only() {
        let t = create_test_worker(test_config());
        stub_manifest(&t.fetcher);

        // Leftovers from a prior deploy
        t.caches.open("silo-static-v0").await.unwrap();
        t.caches.open("silo-api-v0").await.unwrap();
        t.caches.open("unrelated-cache").await.unwrap();

        t.worker.handle_install().await.unwrap();
        t.worker.handle_activate().await.unwrap();

        assert_eq!(
            t.caches.cache_names().await.unwrap(),
            vec!["silo-api-v1".to_string(), "silo-static-v1".to_string()]
        );
        // Current static generation kept its contents
        assert_eq!(t.caches.entry_keys("silo-static-v1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_activation_claims_open_clients() {
        let t = create_test_worker(test_config());
        stub_manifest(&t.fetcher);
        let page = t
            .worker
            .clients()
            .add(Url::parse("https://silo.example/dashboard").unwrap());

        t.worker.handle_install().await.unwrap();
        t.worker.handle_activate().await.unwrap();

        assert!(t.worker.clients().get(&page).unwrap().controlled);
    }

    // ---- request routing ----

    #[tokio::test]
    async fn test_non_get_requests_bypass_caching() {
        let t = create_test_worker(test_config());
        t.fetcher.stub("POST", "https://silo.example/api/auth/login", 200, b"{\"token\":\"t\"}");

        let request = Request::new("POST", Url::parse("https://silo.example/api/auth/login").unwrap());
        let outcome = t.worker.handle_fetch(&request).await.unwrap();

        assert_eq!(outcome.response.status, 200);
        assert!(!outcome.response.from_cache);
        assert!(outcome.pending_write.is_none());
        assert_eq!(t.fetcher.calls_for("POST", "https://silo.example/api/auth/login"), 1);

        // No cache was touched
        assert!(t.caches.cache_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_http_scheme_bypasses_caching() {
        let t = create_test_worker(test_config());
        t.fetcher.stub("GET", "ftp://silo.example/firmware.bin", 200, b"blob");

        let outcome = t.worker.handle_fetch(&get("ftp://silo.example/firmware.bin")).await.unwrap();

        assert_eq!(outcome.response.body, b"blob");
        assert!(t.caches.cache_names().await.unwrap().is_empty());
    }

    // ---- cache-first ----

    #[tokio::test]
    async fn test_static_assets_served_from_cache_when_offline() {
        let t = create_test_worker(test_config());
        stub_manifest(&t.fetcher);
        t.worker.handle_install().await.unwrap();
        t.worker.handle_activate().await.unwrap();
        t.fetcher.clear_calls();
        t.fetcher.set_offline(true);

        let outcome = t.worker.handle_fetch(&get("https://silo.example/index.html")).await.unwrap();

        assert_eq!(outcome.response.body, b"<html>shell</html>");
        assert!(outcome.response.from_cache);
        assert_eq!(t.fetcher.calls_for("GET", "https://silo.example/index.html"), 0);
    }

    #[tokio::test]
    async fn test_static_hit_never_goes_to_network() {
        let t = create_test_worker(test_config());
        stub_manifest(&t.fetcher);
        t.worker.handle_install().await.unwrap();
        t.worker.handle_activate().await.unwrap();
        t.fetcher.clear_calls();

        for _ in 0..3 {
            let outcome = t.worker.handle_fetch(&get("https://silo.example/")).await.unwrap();
            assert!(outcome.response.from_cache);
        }
        assert_eq!(t.fetcher.calls_for("GET", "https://silo.example/"), 0);
    }

    #[tokio::test]
    async fn test_static_miss_goes_live_without_repopulating() {
        let t = create_test_worker(test_config());
        stub_manifest(&t.fetcher);
        t.fetcher.stub("GET", "https://silo.example/logo.svg", 200, b"<svg/>");
        t.worker.handle_install().await.unwrap();
        t.worker.handle_activate().await.unwrap();

        let outcome = t.worker.handle_fetch(&get("https://silo.example/logo.svg")).await.unwrap();
        assert_eq!(outcome.response.body, b"<svg/>");
        assert!(!outcome.response.from_cache);

        // The miss was not written back: the manifest is the sole
        // population path for the static cache.
        t.fetcher.set_offline(true);
        assert!(t.worker.handle_fetch(&get("https://silo.example/logo.svg")).await.is_err());
    }

    // ---- network-first ----

    #[tokio::test]
    async fn test_api_get_cached_then_served_offline_byte_for_byte() {
        let t = create_test_worker(test_config());
        let body = br#"[{"silo":3,"temp":41.7}]"#;
        t.fetcher.stub("GET", "https://silo.example/api/silos", 200, body);

        let outcome = t.worker.handle_fetch(&get("https://silo.example/api/silos")).await.unwrap();
        assert!(!outcome.response.from_cache);
        assert!(outcome.pending_write.is_some());
        let live = outcome.settled().await;
        assert_eq!(live.body, body);

        t.fetcher.set_offline(true);
        let cached = t.worker.handle_fetch(&get("https://silo.example/api/silos")).await.unwrap();
        assert!(cached.response.from_cache);
        assert_eq!(cached.response.body, body);
    }

    #[tokio::test]
    async fn test_api_failure_with_no_cached_entry_propagates() {
        let t = create_test_worker(test_config());
        t.fetcher.set_offline(true);

        let result = t.worker.handle_fetch(&get("https://silo.example/api/alerts")).await;
        assert!(matches!(result, Err(FetchError::Transport(_))));
    }

    #[tokio::test]
    async fn test_api_non_200_returned_but_never_cached() {
        let t = create_test_worker(test_config());

        // Prime a good snapshot first
        t.fetcher.stub("GET", "https://silo.example/api/silos", 200, b"good");
        t.worker
            .handle_fetch(&get("https://silo.example/api/silos"))
            .await
            .unwrap()
            .settled()
            .await;

        // Backend starts failing; the error is passed through untouched
        t.fetcher.stub("GET", "https://silo.example/api/silos", 500, b"boom");
        let outcome = t.worker.handle_fetch(&get("https://silo.example/api/silos")).await.unwrap();
        assert_eq!(outcome.response.status, 500);
        assert!(outcome.pending_write.is_none());

        // The good snapshot was not overwritten
        t.fetcher.set_offline(true);
        let cached = t.worker.handle_fetch(&get("https://silo.example/api/silos")).await.unwrap();
        assert_eq!(cached.response.status, 200);
        assert_eq!(cached.response.body, b"good");
    }

    #[tokio::test]
    async fn test_api_cache_write_is_idempotent() {
        let t = create_test_worker(test_config());
        t.fetcher.stub("GET", "https://silo.example/api/silos", 200, b"snapshot");

        for _ in 0..2 {
            t.worker
                .handle_fetch(&get("https://silo.example/api/silos"))
                .await
                .unwrap()
                .settled()
                .await;
        }

        assert_eq!(t.caches.entry_keys("silo-api-v1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_api_query_string_is_part_of_the_key() {
        let t = create_test_worker(test_config());
        t.fetcher.stub("GET", "https://silo.example/api/alerts?page=1", 200, b"page one");

        t.worker
            .handle_fetch(&get("https://silo.example/api/alerts?page=1"))
            .await
            .unwrap()
            .settled()
            .await;

        t.fetcher.set_offline(true);
        // Same path, different query: no fallback entry
        assert!(
            t.worker
                .handle_fetch(&get("https://silo.example/api/alerts?page=2"))
                .await
                .is_err()
        );
        let hit = t
            .worker
            .handle_fetch(&get("https://silo.example/api/alerts?page=1"))
            .await
            .unwrap();
        assert_eq!(hit.response.body, b"page one");
    }

    // ---- push delivery ----

    #[tokio::test]
    async fn test_push_renders_exactly_one_notification() {
        let t = create_test_worker(test_config());

        t.worker
            .handle_push(br#"{"title":"Alert","body":"Silo 3 overheating"}"#)
            .await;

        let shown = t.notifier.shown.lock().unwrap();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].title, "Alert");
        assert_eq!(shown[0].body, "Silo 3 overheating");
    }

    #[tokio::test]
    async fn test_push_plain_text_payload_falls_back() {
        let t = create_test_worker(test_config());

        t.worker.handle_push(b"plain text message").await;

        let shown = t.notifier.shown.lock().unwrap();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].title, DEFAULT_TITLE);
        assert_eq!(shown[0].body, "plain text message");
    }

    #[tokio::test]
    async fn test_push_rendering_failure_does_not_crash_the_worker() {
        let t = create_test_worker(test_config());
        t.notifier.fail.store(true, Ordering::SeqCst);

        let notification = t.worker.handle_push(b"{}").await;
        assert_eq!(notification.title, DEFAULT_TITLE);
        assert!(t.notifier.shown.lock().unwrap().is_empty());

        // The worker keeps serving events afterwards
        t.notifier.fail.store(false, Ordering::SeqCst);
        t.worker.handle_push(b"still alive").await;
        assert_eq!(t.notifier.shown.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_notification_click_dismisses_and_focuses_app() {
        let t = create_test_worker(test_config());
        let page = t
            .worker
            .clients()
            .add(Url::parse("https://silo.example/dashboard").unwrap());

        let notification = t.worker.handle_push(b"click me").await;
        let focused = t.worker.handle_notification_click(&notification.tag).await;

        assert_eq!(focused, page);
        assert!(t.worker.clients().get(&page).unwrap().focused);
        assert_eq!(
            t.notifier.dismissed.lock().unwrap().as_slice(),
            [notification.tag.clone()]
        );
    }

    #[tokio::test]
    async fn test_notification_click_opens_window_when_no_client_exists() {
        let t = create_test_worker(test_config());

        let notification = t.worker.handle_push(b"click me").await;
        let opened = t.worker.handle_notification_click(&notification.tag).await;

        let client = t.worker.clients().get(&opened).unwrap();
        assert_eq!(client.url.as_str(), "https://silo.example/");
        assert!(client.focused);
    }
}
