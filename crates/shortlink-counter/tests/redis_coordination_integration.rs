use std::collections::HashSet;
use std::sync::Arc;

use shortlink_core::{CoordinationError, CoordinationStore, Version};
use shortlink_counter::{IdAllocator, LeaseSettings, RangeLeaseAllocator, RedisCoordinationStore};
use shortlink_test_infra::RedisServer;

/// Keeps the container alive for the duration of a test.
struct Fixture {
    #[allow(dead_code)]
    redis: RedisServer,
    store: RedisCoordinationStore,
}

impl Fixture {
    async fn start() -> Self {
        let redis = RedisServer::new()
            .await
            .expect("Failed to start Redis server");
        let conn = redis
            .connection()
            .await
            .expect("Failed to get Redis connection");
        Self {
            redis,
            store: RedisCoordinationStore::new(conn),
        }
    }

    async fn another_store(&self) -> RedisCoordinationStore {
        let conn = self
            .redis
            .connection()
            .await
            .expect("Failed to get Redis connection");
        RedisCoordinationStore::new(conn)
    }
}

#[tokio::test]
async fn test_redis_node_lifecycle() {
    let fixture = Fixture::start().await;
    let store = &fixture.store;

    let err = store.read_versioned("counter").await.unwrap_err();
    assert!(matches!(err, CoordinationError::NotFound(_)));

    assert!(store.create_if_absent("counter", b"0").await.unwrap());
    assert!(!store.create_if_absent("counter", b"42").await.unwrap());

    let node = store.read_versioned("counter").await.unwrap();
    assert_eq!(node.value, b"0");
    assert_eq!(node.version, Version::new(0));

    store
        .write_conditional("counter", b"1", node.version)
        .await
        .unwrap();
    let node = store.read_versioned("counter").await.unwrap();
    assert_eq!(node.value, b"1");
    assert_eq!(node.version, Version::new(1));
}

#[tokio::test]
async fn test_redis_large_versions_stay_integral() {
    let fixture = Fixture::start().await;
    let store = &fixture.store;
    store.create_if_absent("counter", b"0").await.unwrap();

    let start = 99_999_999_999_999_u64;
    let mut conn = fixture.redis.connection().await.unwrap();
    let _: () = redis::cmd("HSET")
        .arg("counter")
        .arg("version")
        .arg(start)
        .query_async(&mut conn)
        .await
        .unwrap();

    store
        .write_conditional("counter", b"1", Version::new(start))
        .await
        .unwrap();

    let node = store.read_versioned("counter").await.unwrap();
    assert_eq!(node.version, Version::new(start + 1));
    assert_eq!(node.value, b"1");
}

#[tokio::test]
async fn test_redis_stale_write_is_rejected() {
    let fixture = Fixture::start().await;
    let store = &fixture.store;
    store.create_if_absent("counter", b"0").await.unwrap();

    store
        .write_conditional("counter", b"1", Version::new(0))
        .await
        .unwrap();
    let err = store
        .write_conditional("counter", b"1", Version::new(0))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CoordinationError::VersionConflict { expected } if expected == Version::new(0)
    ));
}

#[tokio::test]
async fn test_redis_write_to_missing_node() {
    let fixture = Fixture::start().await;

    let err = fixture
        .store
        .write_conditional("missing", b"1", Version::new(0))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinationError::NotFound(_)));
}

#[tokio::test]
async fn test_redis_prefix_isolates_nodes() {
    let fixture = Fixture::start().await;
    let conn = fixture.redis.connection().await.unwrap();
    let prefixed = RedisCoordinationStore::with_prefix(conn, "tenant-a:");

    prefixed.create_if_absent("counter", b"9").await.unwrap();

    assert!(matches!(
        fixture.store.read_versioned("counter").await.unwrap_err(),
        CoordinationError::NotFound(_)
    ));
    assert_eq!(prefixed.read_versioned("counter").await.unwrap().value, b"9");
}

#[tokio::test]
async fn test_two_allocators_never_share_ids() {
    let fixture = Fixture::start().await;
    let settings = LeaseSettings::builder().range_size(50).build();

    let first = Arc::new(RangeLeaseAllocator::new(
        settings.clone(),
        fixture.another_store().await,
    ).unwrap());
    let second = Arc::new(RangeLeaseAllocator::new(
        settings,
        fixture.another_store().await,
    ).unwrap());
    first.ensure_counter().await.unwrap();

    let mut handles = Vec::new();
    for allocator in [first, second] {
        for _ in 0..4 {
            let allocator = Arc::clone(&allocator);
            handles.push(tokio::spawn(async move {
                let mut ids = Vec::with_capacity(100);
                for _ in 0..100 {
                    ids.push(allocator.next_id().await.unwrap());
                }
                ids
            }));
        }
    }

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.await.unwrap() {
            assert!(seen.insert(id), "id {id} was handed out twice");
        }
    }
    assert_eq!(seen.len(), 800);

    // 800 ids over ranges of 50 needs at least 16 leases.
    let node = fixture.store.read_versioned("shortlink:counter").await.unwrap();
    let base: u64 = std::str::from_utf8(&node.value).unwrap().parse().unwrap();
    assert!(base >= 16);
}
