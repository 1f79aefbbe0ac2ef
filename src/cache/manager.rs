//! Cache Manager Module
//!
//! Namespaced, JSON-encoded cache entries on top of a [`KvStore`]. Store
//! and serialization faults are logged and absorbed here: reads degrade
//! to misses and writes report `false`.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{CacheMetrics, TtlPolicy, TtlTable, KEY_PREFIX};
use crate::store::KvStore;

// == Cache Manager ==
/// Shared cache front end. Cloning is cheap and clones share the store.
#[derive(Clone)]
pub struct CacheManager {
    store: Arc<dyn KvStore>,
    ttl: Arc<TtlTable>,
    metrics: Option<CacheMetrics>,
}

impl CacheManager {
    // == Constructor ==
    pub fn new(store: Arc<dyn KvStore>, ttl: TtlTable) -> Self {
        Self {
            store,
            ttl: Arc::new(ttl),
            metrics: None,
        }
    }

    /// Records a hit or miss for every [`get`](Self::get).
    pub fn with_metrics(mut self, metrics: CacheMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    // == Build Key ==
    /// Composes `cache:{category}:{identifier}`.
    ///
    /// `:` and `%` inside the category are percent-encoded so a category
    /// can never absorb part of an identifier.
    pub fn build_key(category: &str, identifier: &str) -> String {
        let category = category.replace('%', "%25").replace(':', "%3A");
        format!("{KEY_PREFIX}:{category}:{identifier}")
    }

    pub fn ttl_table(&self) -> &TtlTable {
        &self.ttl
    }

    pub fn ttl_for(&self, policy: TtlPolicy) -> u64 {
        self.ttl.ttl(policy)
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    // == Set ==
    /// Serializes `value` and stores it under `key` with the policy's TTL.
    ///
    /// Returns `false` (after logging) when serialization or the store
    /// fails; never errors.
    pub async fn set<T>(&self, key: &str, value: &T, policy: TtlPolicy) -> bool
    where
        T: Serialize + ?Sized,
    {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(key = %key, error = %e, "Error serializing cache value");
                return false;
            }
        };

        let ttl = self.ttl.ttl(policy);
        match self.store.set_ex(key, &payload, ttl).await {
            Ok(()) => {
                debug!(key = %key, policy = %policy, ttl, "Cache set");
                true
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Error setting cache");
                false
            }
        }
    }

    /// [`set`](Self::set) with the policy given by name; unknown names use
    /// the default policy.
    pub async fn set_named<T>(&self, key: &str, value: &T, policy_name: &str) -> bool
    where
        T: Serialize + ?Sized,
    {
        self.set(key, value, TtlPolicy::from_name_or_default(policy_name))
            .await
    }

    // == Get ==
    /// Reads and deserializes `key`.
    ///
    /// `None` covers a miss, an unreachable store and a payload that does
    /// not decode as `T`.
    pub async fn get<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let value = match self.store.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key = %key, error = %e, "Error decoding cached value");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "Error getting cache");
                None
            }
        };

        if let Some(metrics) = &self.metrics {
            if value.is_some() {
                metrics.track_hit().await;
            } else {
                metrics.track_miss().await;
            }
        }
        debug!(key = %key, hit = value.is_some(), "Cache lookup");
        value
    }

    // == Invalidate ==
    /// Deletes every key matching the glob `pattern` in one batch.
    ///
    /// Listing and deletion are separate round trips, so a key written in
    /// between survives. Returns the number of keys deleted.
    pub async fn invalidate(&self, pattern: &str) -> u64 {
        let keys = match self.store.keys(pattern).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "Error invalidating cache");
                return 0;
            }
        };
        if keys.is_empty() {
            return 0;
        }

        match self.store.del(&keys).await {
            Ok(deleted) => {
                debug!(pattern = %pattern, deleted, "Cache invalidated");
                deleted
            }
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "Error invalidating cache");
                0
            }
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GateError, Result};
    use crate::store::{MemoryStore, ServerInfo};
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::time::Duration;

    /// Store whose every command fails, standing in for an outage.
    struct DownStore;

    #[async_trait]
    impl KvStore for DownStore {
        async fn set_ex(&self, _: &str, _: &str, _: u64) -> Result<()> {
            Err(GateError::Store("connection refused".into()))
        }
        async fn get(&self, _: &str) -> Result<Option<String>> {
            Err(GateError::Store("connection refused".into()))
        }
        async fn del(&self, _: &[String]) -> Result<u64> {
            Err(GateError::Store("connection refused".into()))
        }
        async fn keys(&self, _: &str) -> Result<Vec<String>> {
            Err(GateError::Store("connection refused".into()))
        }
        async fn zadd(&self, _: &str, _: &str, _: f64) -> Result<()> {
            Err(GateError::Store("connection refused".into()))
        }
        async fn zcard(&self, _: &str) -> Result<u64> {
            Err(GateError::Store("connection refused".into()))
        }
        async fn zrembyscore(&self, _: &str, _: f64, _: f64) -> Result<u64> {
            Err(GateError::Store("connection refused".into()))
        }
        async fn expire(&self, _: &str, _: u64) -> Result<bool> {
            Err(GateError::Store("connection refused".into()))
        }
        async fn incr(&self, _: &str, _: i64) -> Result<i64> {
            Err(GateError::Store("connection refused".into()))
        }
        async fn info(&self) -> Result<ServerInfo> {
            Err(GateError::Store("connection refused".into()))
        }
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Product {
        id: u32,
        name: String,
        price_cents: u64,
    }

    fn manager() -> (MemoryStore, CacheManager) {
        let store = MemoryStore::new(100);
        let manager = CacheManager::new(Arc::new(store.clone()), TtlTable::default());
        (store, manager)
    }

    #[test]
    fn test_build_key() {
        assert_eq!(CacheManager::build_key("test", "1"), "cache:test:1");
        assert_eq!(
            CacheManager::build_key("products", "list:abc"),
            "cache:products:list:abc"
        );
    }

    #[test]
    fn test_build_key_no_cross_category_collision() {
        assert_ne!(
            CacheManager::build_key("a:b", "c"),
            CacheManager::build_key("a", "b:c")
        );
    }

    #[tokio::test]
    async fn test_set_and_get_reference_policy() {
        let (_, cache) = manager();
        assert!(cache.set("cache:test:1", &json!({"k": "v"}), TtlPolicy::Reference).await);

        let value: Option<Value> = cache.get("cache:test:1").await;
        assert_eq!(value, Some(json!({"k": "v"})));
    }

    #[tokio::test]
    async fn test_typed_round_trip() {
        let (_, cache) = manager();
        let product = Product {
            id: 7,
            name: "Fern".to_string(),
            price_cents: 1299,
        };
        assert!(cache.set("cache:products:7", &product, TtlPolicy::Stable).await);
        assert_eq!(cache.get::<Product>("cache:products:7").await, Some(product));
    }

    #[tokio::test]
    async fn test_set_applies_policy_ttl() {
        let (store, cache) = manager();
        cache.set("cache:test:ttl", &1, TtlPolicy::Ephemeral).await;

        let remaining = store.ttl_remaining_ms("cache:test:ttl").await.unwrap();
        assert!(remaining <= 60_000);
        assert!(remaining > 59_000);
    }

    #[tokio::test]
    async fn test_set_named_unknown_policy_uses_default() {
        let (store, cache) = manager();
        assert!(cache.set_named("cache:test:x", &1, "no-such-policy").await);

        let remaining = store.ttl_remaining_ms("cache:test:x").await.unwrap();
        assert!(remaining <= 300_000);
        assert!(remaining > 299_000);
    }

    #[tokio::test]
    async fn test_value_expires_after_policy_duration() {
        let store = MemoryStore::new(100);
        let table = TtlTable::new().with_override(TtlPolicy::Ephemeral, 1);
        let cache = CacheManager::new(Arc::new(store), table);

        cache.set("cache:test:short", &"v", TtlPolicy::Ephemeral).await;
        assert_eq!(cache.get::<String>("cache:test:short").await, Some("v".into()));

        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(cache.get::<String>("cache:test:short").await, None);
    }

    #[tokio::test]
    async fn test_huge_ttl_override_still_stores() {
        let store = MemoryStore::new(100);
        let table = TtlTable::new().with_override(TtlPolicy::Stable, u64::MAX / 100);
        let cache = CacheManager::new(Arc::new(store), table);

        assert!(cache.set("cache:test:long", &"v", TtlPolicy::Stable).await);
        assert_eq!(cache.get::<String>("cache:test:long").await, Some("v".into()));
    }

    #[tokio::test]
    async fn test_get_miss_is_none() {
        let (_, cache) = manager();
        assert_eq!(cache.get::<Value>("cache:test:missing").await, None);
    }

    #[tokio::test]
    async fn test_get_undecodable_is_none() {
        let (store, cache) = manager();
        store.set_ex("cache:test:bad", "{not json", 60).await.unwrap();
        assert_eq!(cache.get::<Value>("cache:test:bad").await, None);

        store.set_ex("cache:test:shape", "\"text\"", 60).await.unwrap();
        assert_eq!(cache.get::<Product>("cache:test:shape").await, None);
    }

    #[tokio::test]
    async fn test_unserializable_value_returns_false() {
        let (store, cache) = manager();
        let mut bad: HashMap<(u8, u8), u8> = HashMap::new();
        bad.insert((1, 2), 3);

        assert!(!cache.set("cache:test:bad", &bad, TtlPolicy::Stable).await);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_store_failure_is_absorbed() {
        let cache = CacheManager::new(Arc::new(DownStore), TtlTable::default());

        assert!(!cache.set("cache:test:1", &json!({"k": "v"}), TtlPolicy::Stable).await);
        assert_eq!(cache.get::<Value>("cache:test:1").await, None);
        assert_eq!(cache.invalidate("cache:test:*").await, 0);
    }

    #[tokio::test]
    async fn test_invalidate_pattern() {
        let (_, cache) = manager();
        cache.set("cache:test:1", &1, TtlPolicy::Stable).await;
        cache.set("cache:test:2", &2, TtlPolicy::Stable).await;
        cache.set("cache:other:1", &3, TtlPolicy::Stable).await;

        assert_eq!(cache.invalidate("cache:test:*").await, 2);
        assert_eq!(cache.get::<i32>("cache:test:1").await, None);
        assert_eq!(cache.get::<i32>("cache:test:2").await, None);
        assert_eq!(cache.get::<i32>("cache:other:1").await, Some(3));
    }

    #[tokio::test]
    async fn test_invalidate_no_match_is_noop() {
        let (store, cache) = manager();
        cache.set("cache:test:1", &1, TtlPolicy::Stable).await;

        assert_eq!(cache.invalidate("cache:none:*").await, 0);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_metrics_track_hits_and_misses() {
        let store = MemoryStore::new(100);
        let shared: Arc<dyn KvStore> = Arc::new(store);
        let metrics = CacheMetrics::new(shared.clone());
        let cache = CacheManager::new(shared, TtlTable::default()).with_metrics(metrics.clone());

        cache.set("cache:test:1", &1, TtlPolicy::Stable).await;
        cache.get::<i32>("cache:test:1").await;
        cache.get::<i32>("cache:test:1").await;
        cache.get::<i32>("cache:test:2").await;

        let snapshot = metrics.snapshot().await.unwrap();
        assert_eq!(snapshot.application.hits, 2);
        assert_eq!(snapshot.application.misses, 1);
    }
}
