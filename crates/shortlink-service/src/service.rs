use crate::error::{LinkError, Result};
use crate::manager::LinkManager;
use async_trait::async_trait;
use jiff::Timestamp;
use shortlink_cache::{CacheLayer, DEFAULT_CACHE_TIMEOUT};
use shortlink_core::{Link, Repository, ShortCode, ShortCodeEncoder, StorageError, UrlCache};
use shortlink_counter::IdAllocator;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use typed_builder::TypedBuilder;
use url::Url;

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, TypedBuilder)]
pub struct ServiceSettings {
    /// Upper bound on each durable store call. Exceeding it fails the request
    /// with a retryable [`LinkError::StoreUnavailable`].
    #[builder(default = DEFAULT_STORE_TIMEOUT)]
    pub store_timeout: Duration,
    /// Upper bound on each cache call. Exceeding it counts as a miss.
    #[builder(default = DEFAULT_CACHE_TIMEOUT)]
    pub cache_timeout: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// The [`LinkManager`] implementation.
///
/// Every mutation hits the durable store first and the cache second. Cache
/// writes are best-effort: once the store has accepted a change the request
/// succeeds regardless of what the cache does. No lock is held across store
/// or cache calls.
pub struct LinkService<A, E, R, C> {
    allocator: A,
    encoder: E,
    repository: R,
    cache: CacheLayer<C>,
    settings: ServiceSettings,
}

impl<A, E, R, C> LinkService<A, E, R, C>
where
    A: IdAllocator,
    E: ShortCodeEncoder,
    R: Repository,
    C: UrlCache,
{
    pub fn new(allocator: A, encoder: E, repository: R, cache: C, settings: ServiceSettings) -> Self {
        let cache = CacheLayer::with_timeout(cache, settings.cache_timeout);
        Self {
            allocator,
            encoder,
            repository,
            cache,
            settings,
        }
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn cache(&self) -> &CacheLayer<C> {
        &self.cache
    }

    /// Parses an absolute http(s) URL with a host into its normalised form.
    fn parse_url(raw: &str) -> Result<Url> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(LinkError::InvalidUrl("URL cannot be empty".to_string()));
        }
        // The URL parser silently strips tabs and newlines.
        if raw.chars().any(char::is_control) {
            return Err(LinkError::InvalidUrl(format!(
                "URL contains control characters: {raw:?}"
            )));
        }

        let url = Url::parse(raw).map_err(|e| LinkError::InvalidUrl(format!("{raw}: {e}")))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(LinkError::InvalidUrl(format!(
                "URL scheme must be http or https: {}",
                url.scheme()
            )));
        }
        if !url.host_str().is_some_and(|host| !host.is_empty()) {
            return Err(LinkError::InvalidUrl(format!("URL has no host: {raw}")));
        }

        Ok(url)
    }

    /// Runs a store call under `store_timeout`.
    async fn stored<T>(
        &self,
        operation: &str,
        call: impl Future<Output = shortlink_core::repository::Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.settings.store_timeout, call).await {
            Ok(result) => result.map_err(|e| {
                warn!(operation, error = %e, "link store call failed");
                LinkError::StoreUnavailable(e)
            }),
            Err(_) => {
                warn!(operation, timeout = ?self.settings.store_timeout, "link store call timed out");
                Err(LinkError::StoreUnavailable(StorageError::Timeout(format!(
                    "{operation} exceeded {:?}",
                    self.settings.store_timeout
                ))))
            }
        }
    }

    /// Loads a link and checks that `owner_id` owns it.
    async fn owned_link(&self, code: &ShortCode, owner_id: &str) -> Result<Link> {
        let link = self
            .stored("get", self.repository.get(code))
            .await?
            .ok_or_else(|| LinkError::NotFound(code.to_string()))?;

        if !link.is_owned_by(owner_id) {
            debug!(code = %code, owner_id, "ownership check failed");
            return Err(LinkError::Forbidden(code.to_string()));
        }
        Ok(link)
    }
}

#[async_trait]
impl<A, E, R, C> LinkManager for LinkService<A, E, R, C>
where
    A: IdAllocator,
    E: ShortCodeEncoder,
    R: Repository,
    C: UrlCache,
{
    async fn create(&self, original_url: &str, owner_id: &str) -> Result<Link> {
        let original_url = Self::parse_url(original_url)?;

        let id = self.allocator.next_id().await.map_err(|e| {
            error!(error = %e, "identifier allocation failed");
            LinkError::AllocationFailed(e)
        })?;

        let link = Link {
            hash: self.encoder.encode(id),
            original_url: original_url.into(),
            owner_id: owner_id.to_string(),
            created_at: Timestamp::now(),
        };

        self.stored("insert", self.repository.insert(&link))
            .await
            .inspect_err(|e| {
                if let LinkError::StoreUnavailable(StorageError::Conflict(_)) = e {
                    // A freshly allocated code already exists: the counter went backwards.
                    error!(code = %link.hash, id, "allocated code collides with a stored link");
                }
            })?;

        info!(code = %link.hash, id, owner_id, "link created");
        Ok(link)
    }

    async fn resolve(&self, code: &ShortCode) -> Result<String> {
        if let Some(url) = self.cache.lookup(code).await {
            return Ok(url);
        }

        let link = self
            .stored("get", self.repository.get(code))
            .await?
            .ok_or_else(|| LinkError::NotFound(code.to_string()))?;

        let _ = self.cache.put(code, &link.original_url).await;
        Ok(link.original_url)
    }

    async fn update(&self, code: &ShortCode, new_url: &str, owner_id: &str) -> Result<Link> {
        let new_url = Self::parse_url(new_url)?;

        let mut link = self.owned_link(code, owner_id).await?;

        let updated = self
            .stored("update", self.repository.update_url(code, new_url.as_str()))
            .await?;
        if !updated {
            // Deleted between the ownership check and the write.
            return Err(LinkError::NotFound(code.to_string()));
        }

        let _ = self.cache.put(code, new_url.as_str()).await;

        info!(code = %code, owner_id, "link updated");
        link.original_url = new_url.into();
        Ok(link)
    }

    async fn delete(&self, code: &ShortCode, owner_id: &str) -> Result<()> {
        let link = match self.owned_link(code, owner_id).await {
            Ok(link) => link,
            Err(LinkError::NotFound(missing)) => {
                // The store says gone; make sure no leftover entry says otherwise.
                let _ = self.cache.invalidate(code).await;
                return Err(LinkError::NotFound(missing));
            }
            Err(e) => return Err(e),
        };

        let deleted = self
            .stored("delete", self.repository.delete(&link.hash))
            .await?;

        let _ = self.cache.invalidate(code).await;

        if !deleted {
            return Err(LinkError::NotFound(code.to_string()));
        }
        info!(code = %code, owner_id, "link deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shortlink_cache::{CacheError, MokaUrlCache};
    use shortlink_core::{Base62, CoordinationError, ReadRepository};
    use shortlink_counter::{
        AllocationError, InMemoryCoordinationStore, LeaseSettings, RangeLeaseAllocator,
    };
    use shortlink_storage::InMemoryRepository;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    type TestService<C = MokaUrlCache, R = InMemoryRepository> =
        LinkService<RangeLeaseAllocator<InMemoryCoordinationStore>, Base62, R, C>;

    fn allocator() -> RangeLeaseAllocator<InMemoryCoordinationStore> {
        RangeLeaseAllocator::new(LeaseSettings::default(), InMemoryCoordinationStore::new())
            .unwrap()
    }

    fn service_with<C: UrlCache, R: Repository>(cache: C, repository: R) -> TestService<C, R> {
        LinkService::new(
            allocator(),
            Base62,
            repository,
            cache,
            ServiceSettings::default(),
        )
    }

    fn test_service() -> (TestService, MokaUrlCache) {
        let cache = MokaUrlCache::new();
        (service_with(cache.clone(), InMemoryRepository::new()), cache)
    }

    /// A cache backend that fails every call.
    struct DownCache;

    #[async_trait]
    impl UrlCache for DownCache {
        async fn get_url(&self, _code: &ShortCode) -> shortlink_cache::Result<Option<String>> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }

        async fn set_url(&self, _code: &ShortCode, _url: &str) -> shortlink_cache::Result<()> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }

        async fn del(&self, _code: &ShortCode) -> shortlink_cache::Result<()> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }
    }

    /// A store that never answers.
    struct StalledRepository;

    #[async_trait]
    impl ReadRepository for StalledRepository {
        async fn get(&self, _code: &ShortCode) -> shortlink_core::repository::Result<Option<Link>> {
            std::future::pending().await
        }
    }

    #[async_trait]
    impl Repository for StalledRepository {
        async fn insert(&self, _link: &Link) -> shortlink_core::repository::Result<()> {
            std::future::pending().await
        }

        async fn update_url(
            &self,
            _code: &ShortCode,
            _url: &str,
        ) -> shortlink_core::repository::Result<bool> {
            std::future::pending().await
        }

        async fn delete(&self, _code: &ShortCode) -> shortlink_core::repository::Result<bool> {
            std::future::pending().await
        }
    }

    /// An allocator whose coordination store is unreachable.
    #[derive(Default)]
    struct UnreachableAllocator {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl IdAllocator for UnreachableAllocator {
        async fn next_id(&self) -> shortlink_counter::Result<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AllocationError::Coordination(CoordinationError::Unavailable(
                "connection refused".to_string(),
            )))
        }
    }

    #[tokio::test]
    async fn create_then_resolve() {
        let (service, _) = test_service();

        let link = service.create("https://example.com/", "alice").await.unwrap();

        assert_eq!(link.hash.as_str(), "0");
        assert_eq!(link.original_url, "https://example.com/");
        assert_eq!(link.owner_id, "alice");
        assert_eq!(service.resolve(&link.hash).await.unwrap(), "https://example.com/");
    }

    #[tokio::test]
    async fn create_assigns_distinct_codes() {
        let (service, _) = test_service();

        let first = service.create("https://a.example/", "alice").await.unwrap();
        let second = service.create("https://b.example/", "alice").await.unwrap();

        assert_ne!(first.hash, second.hash);
        assert_eq!(first.hash.decode(), Some(0));
        assert_eq!(second.hash.decode(), Some(1));
    }

    #[tokio::test]
    async fn create_rejects_invalid_urls_before_allocating() {
        let allocator = UnreachableAllocator::default();
        let calls = Arc::clone(&allocator.calls);
        let service = LinkService::new(
            allocator,
            Base62,
            InMemoryRepository::new(),
            MokaUrlCache::new(),
            ServiceSettings::default(),
        );

        for url in [
            "",
            "   ",
            "example.com",
            "ftp://example.com",
            "https://",
            "https://:80",
            "http://@/",
            "https://exa<mple>.com",
            "https://example.com/a\nb",
            "http://[::1",
            "mailto:alice@example.com",
        ] {
            let err = service.create(url, "alice").await.unwrap_err();
            assert!(matches!(err, LinkError::InvalidUrl(_)), "{url:?} was accepted");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn create_stores_normalised_url() {
        let (service, _) = test_service();

        let link = service
            .create("  HTTPS://Example.COM:443/a b?q=1  ", "alice")
            .await
            .unwrap();

        assert_eq!(link.original_url, "https://example.com/a%20b?q=1");
        assert_eq!(
            service.resolve(&link.hash).await.unwrap(),
            "https://example.com/a%20b?q=1"
        );
    }

    #[tokio::test]
    async fn create_surfaces_allocation_failure() {
        let service = LinkService::new(
            UnreachableAllocator::default(),
            Base62,
            InMemoryRepository::new(),
            MokaUrlCache::new(),
            ServiceSettings::default(),
        );

        let err = service.create("https://example.com/", "alice").await.unwrap_err();

        assert!(matches!(err, LinkError::AllocationFailed(_)));
        assert!(service.repository().is_empty());
    }

    #[tokio::test]
    async fn resolve_unknown_code() {
        let (service, _) = test_service();

        let err = service
            .resolve(&ShortCode::new_unchecked("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::NotFound(_)));
    }

    #[tokio::test]
    async fn resolve_populates_cache() {
        let (service, cache) = test_service();
        let link = service.create("https://example.com/", "alice").await.unwrap();

        assert!(cache.get_url(&link.hash).await.unwrap().is_none());
        service.resolve(&link.hash).await.unwrap();

        assert_eq!(
            cache.get_url(&link.hash).await.unwrap().as_deref(),
            Some("https://example.com/")
        );
    }

    #[tokio::test]
    async fn resolve_prefers_cache() {
        let (service, cache) = test_service();
        let link = service.create("https://example.com/", "alice").await.unwrap();

        cache
            .set_url(&link.hash, "https://cached.example/")
            .await
            .unwrap();

        assert_eq!(
            service.resolve(&link.hash).await.unwrap(),
            "https://cached.example/"
        );
    }

    #[tokio::test]
    async fn resolve_after_update_returns_new_url() {
        let (service, _) = test_service();
        let link = service.create("https://one.example/", "alice").await.unwrap();

        assert_eq!(service.resolve(&link.hash).await.unwrap(), "https://one.example/");

        let updated = service
            .update(&link.hash, "https://two.example/", "alice")
            .await
            .unwrap();
        assert_eq!(updated.original_url, "https://two.example/");
        assert_eq!(updated.created_at, link.created_at);

        assert_eq!(service.resolve(&link.hash).await.unwrap(), "https://two.example/");
    }

    #[tokio::test]
    async fn resolve_after_delete_is_not_found() {
        let (service, cache) = test_service();
        let link = service.create("https://example.com/", "alice").await.unwrap();

        service.resolve(&link.hash).await.unwrap();
        assert!(cache.get_url(&link.hash).await.unwrap().is_some());

        service.delete(&link.hash, "alice").await.unwrap();

        assert!(cache.get_url(&link.hash).await.unwrap().is_none());
        let err = service.resolve(&link.hash).await.unwrap_err();
        assert!(matches!(err, LinkError::NotFound(_)));
    }

    #[tokio::test]
    async fn other_owner_is_forbidden() {
        let (service, _) = test_service();
        let link = service.create("https://example.com/", "A").await.unwrap();

        let err = service
            .update(&link.hash, "https://evil.example/", "B")
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::Forbidden(_)));

        let err = service.delete(&link.hash, "B").await.unwrap_err();
        assert!(matches!(err, LinkError::Forbidden(_)));

        let stored = service.repository().get(&link.hash).await.unwrap().unwrap();
        assert_eq!(stored, link);
        assert_eq!(service.resolve(&link.hash).await.unwrap(), "https://example.com/");
    }

    #[tokio::test]
    async fn update_and_delete_unknown_code() {
        let (service, _) = test_service();
        let code = ShortCode::new_unchecked("nope");

        let err = service
            .update(&code, "https://example.com/", "alice")
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::NotFound(_)));

        let err = service.delete(&code, "alice").await.unwrap_err();
        assert!(matches!(err, LinkError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_of_missing_link_clears_stale_cache_entry() {
        let (service, cache) = test_service();
        let code = ShortCode::new_unchecked("gone");
        cache.set_url(&code, "https://stale.example/").await.unwrap();

        let err = service.delete(&code, "alice").await.unwrap_err();

        assert!(matches!(err, LinkError::NotFound(_)));
        assert!(cache.get_url(&code).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_rejects_invalid_url() {
        let (service, _) = test_service();
        let link = service.create("https://example.com/", "alice").await.unwrap();

        let err = service
            .update(&link.hash, "not a url", "alice")
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::InvalidUrl(_)));
        assert_eq!(service.resolve(&link.hash).await.unwrap(), "https://example.com/");
    }

    #[tokio::test]
    async fn failing_cache_never_fails_requests() {
        let service = service_with(DownCache, InMemoryRepository::new());

        let link = service.create("https://one.example/", "alice").await.unwrap();
        assert_eq!(service.resolve(&link.hash).await.unwrap(), "https://one.example/");

        service
            .update(&link.hash, "https://two.example/", "alice")
            .await
            .unwrap();
        assert_eq!(service.resolve(&link.hash).await.unwrap(), "https://two.example/");

        service.delete(&link.hash, "alice").await.unwrap();
        assert!(matches!(
            service.resolve(&link.hash).await,
            Err(LinkError::NotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_store_fails_with_retryable_error() {
        let service = service_with(MokaUrlCache::new(), StalledRepository);

        let err = service.create("https://example.com/", "alice").await.unwrap_err();
        assert!(matches!(
            err,
            LinkError::StoreUnavailable(StorageError::Timeout(_))
        ));
        assert!(err.is_retryable());

        let err = service
            .resolve(&ShortCode::new_unchecked("Q0u"))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn concurrent_creates_get_unique_codes() {
        let (service, _) = test_service();
        let service = Arc::new(service);
        let mut handles = Vec::new();

        for task in 0..8 {
            let service = Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                let mut codes = Vec::new();
                for i in 0..50 {
                    let url = format!("https://example.com/{task}/{i}");
                    codes.push(service.create(&url, "alice").await.unwrap().hash);
                }
                codes
            }));
        }

        let mut seen = std::collections::HashSet::new();
        for handle in handles {
            for code in handle.await.unwrap() {
                assert!(seen.insert(code));
            }
        }
        assert_eq!(service.repository().len(), 400);
    }
}
