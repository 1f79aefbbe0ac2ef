//! Memoization Module
//!
//! Caches the result of an operation under a fingerprint of its name and
//! arguments. Keyword arguments and nested objects are hashed in key
//! order, so call sites that list them differently share one entry.

use std::collections::BTreeMap;
use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::cache::{CacheManager, TtlPolicy};
use crate::error::{GateError, Result};

/// Hex digits of the argument digest kept in the fingerprint.
pub const FINGERPRINT_HEX_LEN: usize = 16;

// == Call Arguments ==
/// Positional and keyword arguments of a memoized call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub keyword: BTreeMap<String, Value>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Sets a keyword argument.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.insert(name.into(), value.into());
        self
    }

    /// Builds arguments from any serializable value: struct fields and map
    /// entries become keyword arguments, sequences become positional ones,
    /// and anything else is a single positional argument.
    pub fn from_serialize<A: Serialize + ?Sized>(args: &A) -> Result<Self> {
        let value = serde_json::to_value(args)
            .map_err(|e| GateError::Serialization(format!("unhashable arguments: {e}")))?;
        Ok(match value {
            Value::Object(map) => Self {
                positional: Vec::new(),
                keyword: map.into_iter().collect(),
            },
            Value::Array(items) => Self {
                positional: items,
                keyword: BTreeMap::new(),
            },
            Value::Null => Self::default(),
            other => Self::new().arg(other),
        })
    }
}

// == Fingerprint ==
/// `{name}:{digest}` where the digest is the leading hex of SHA-256 over
/// the canonical JSON form of `args`.
pub fn fingerprint(name: &str, args: &CallArgs) -> String {
    let positional: Vec<Value> = args.positional.iter().map(canonicalize).collect();
    let keyword: Map<String, Value> = args
        .keyword
        .iter()
        .map(|(k, v)| (k.clone(), canonicalize(v)))
        .collect();
    let canonical = Value::Array(vec![Value::Array(positional), Value::Object(keyword)]);

    let digest = Sha256::digest(canonical.to_string().as_bytes());
    let hex = hex::encode(digest);
    format!("{name}:{}", &hex[..FINGERPRINT_HEX_LEN])
}

/// Rebuilds objects with their keys inserted in sorted order.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

// == Memoizer ==
/// Runs operations through the cache, keyed by their fingerprint.
#[derive(Clone)]
pub struct Memoizer {
    cache: CacheManager,
}

impl Memoizer {
    pub fn new(cache: CacheManager) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Cache key for a call: `cache:{category}:{name}:{digest}`.
    pub fn key(&self, category: &str, name: &str, args: &CallArgs) -> String {
        CacheManager::build_key(category, &fingerprint(name, args))
    }

    /// Returns the cached result for this call, or runs `op`, caches its
    /// result under `policy` and returns it.
    ///
    /// A failed cache write is logged and the fresh result still returned.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        category: &str,
        name: &str,
        args: &CallArgs,
        policy: TtlPolicy,
        op: F,
    ) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let key = self.key(category, name, args);
        self.lookup_or_run(&key, policy, op).await
    }

    /// Fallible variant: only `Ok` results are cached, errors pass through.
    pub async fn try_get_or_compute<T, E, F, Fut>(
        &self,
        category: &str,
        name: &str,
        args: &CallArgs,
        policy: TtlPolicy,
        op: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let key = self.key(category, name, args);
        if let Some(hit) = self.cache.get::<T>(&key).await {
            return Ok(hit);
        }

        let result = op().await?;
        self.store(&key, &result, policy).await;
        Ok(result)
    }

    /// Wraps `op` so every [`Memoized::call`] goes through the cache.
    pub fn wrap<F>(
        &self,
        category: impl Into<String>,
        name: impl Into<String>,
        policy: TtlPolicy,
        op: F,
    ) -> Memoized<F> {
        Memoized {
            memoizer: self.clone(),
            category: category.into(),
            name: name.into(),
            policy,
            op,
        }
    }

    async fn lookup_or_run<T, F, Fut>(&self, key: &str, policy: TtlPolicy, op: F) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if let Some(hit) = self.cache.get::<T>(key).await {
            debug!(key = %key, "Memoized result served from cache");
            return hit;
        }

        let result = op().await;
        self.store(key, &result, policy).await;
        result
    }

    async fn store<T: Serialize>(&self, key: &str, result: &T, policy: TtlPolicy) {
        if !self.cache.set(key, result, policy).await {
            debug!(key = %key, "Memoized result not cached");
        }
    }
}

// == Memoized ==
/// An operation bound to a cache category, name and TTL policy.
pub struct Memoized<F> {
    memoizer: Memoizer,
    category: String,
    name: String,
    policy: TtlPolicy,
    op: F,
}

impl<F, Fut, T> Memoized<F>
where
    F: Fn(CallArgs) -> Fut,
    Fut: Future<Output = T>,
    T: Serialize + DeserializeOwned,
{
    /// Invokes the wrapped operation unless a cached result exists.
    pub async fn call(&self, args: CallArgs) -> T {
        let key = self.memoizer.key(&self.category, &self.name, &args);
        self.memoizer
            .lookup_or_run(&key, self.policy, || (self.op)(args))
            .await
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> TtlPolicy {
        self.policy
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlTable;
    use crate::store::{KvStore, MemoryStore};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn memoizer() -> (MemoryStore, Memoizer) {
        let store = MemoryStore::new(100);
        let cache = CacheManager::new(Arc::new(store.clone()), TtlTable::default());
        (store, Memoizer::new(cache))
    }

    #[test]
    fn test_fingerprint_shape() {
        let fp = fingerprint("list_products", &CallArgs::new().arg(1));
        let (name, digest) = fp.split_once(':').unwrap();
        assert_eq!(name, "list_products");
        assert_eq!(digest.len(), FINGERPRINT_HEX_LEN);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_keyword_order_irrelevant() {
        let a = CallArgs::new().kwarg("limit", 10).kwarg("offset", 20);
        let b = CallArgs::new().kwarg("offset", 20).kwarg("limit", 10);
        assert_eq!(fingerprint("f", &a), fingerprint("f", &b));
    }

    #[test]
    fn test_fingerprint_nested_object_order_irrelevant() {
        let a: Value = serde_json::from_str(r#"{"x": 1, "y": {"b": 2, "a": 1}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"y": {"a": 1, "b": 2}, "x": 1}"#).unwrap();
        assert_eq!(
            fingerprint("f", &CallArgs::new().arg(a)),
            fingerprint("f", &CallArgs::new().arg(b))
        );
    }

    #[test]
    fn test_fingerprint_distinguishes_calls() {
        let base = fingerprint("f", &CallArgs::new().arg(1));
        assert_ne!(base, fingerprint("f", &CallArgs::new().arg(2)));
        assert_ne!(base, fingerprint("g", &CallArgs::new().arg(1)));
        assert_ne!(base, fingerprint("f", &CallArgs::new().kwarg("a", 1)));
        assert_ne!(
            fingerprint("f", &CallArgs::new().arg(1).arg(2)),
            fingerprint("f", &CallArgs::new().arg(2).arg(1))
        );
    }

    #[test]
    fn test_from_serialize() {
        #[derive(Serialize)]
        struct Query {
            page: u32,
            search: &'static str,
        }

        let args = CallArgs::from_serialize(&Query { page: 2, search: "rose" }).unwrap();
        assert!(args.positional.is_empty());
        assert_eq!(args.keyword["page"], json!(2));

        let args = CallArgs::from_serialize(&(1, "two")).unwrap();
        assert_eq!(args.positional, vec![json!(1), json!("two")]);

        let args = CallArgs::from_serialize(&42).unwrap();
        assert_eq!(args.positional, vec![json!(42)]);

        let args = CallArgs::from_serialize(&()).unwrap();
        assert_eq!(args, CallArgs::default());
    }

    #[tokio::test]
    async fn test_second_call_hits_cache() {
        let (_, memo) = memoizer();
        let calls = AtomicUsize::new(0);
        let args = CallArgs::new().kwarg("id", 5);

        let first: String = memo
            .get_or_compute("test_func", "dummy", &args, TtlPolicy::HighRotation, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                "cached data".to_string()
            })
            .await;
        let second: String = memo
            .get_or_compute("test_func", "dummy", &args, TtlPolicy::HighRotation, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                "fresh data".to_string()
            })
            .await;

        assert_eq!(first, "cached data");
        assert_eq!(second, "cached data");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stores_under_fingerprint_key() {
        let (store, memo) = memoizer();
        let args = CallArgs::new().arg("x");
        let _: i32 = memo
            .get_or_compute("cat", "op", &args, TtlPolicy::Stable, || async { 1 })
            .await;

        let key = memo.key("cat", "op", &args);
        assert!(key.starts_with("cache:cat:op:"));
        assert_eq!(store.get(&key).await.unwrap(), Some("1".to_string()));
    }

    #[tokio::test]
    async fn test_unserializable_result_still_returned() {
        let (store, memo) = memoizer();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let result: HashMap<(u8, u8), u8> = memo
                .get_or_compute("t", "tuple_keys", &CallArgs::new(), TtlPolicy::Stable, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    HashMap::from([((1, 2), 3)])
                })
                .await;
            assert_eq!(result[&(1, 2)], 3);
        }

        // Nothing could be cached, so the operation ran both times
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_try_variant_does_not_cache_errors() {
        let (_, memo) = memoizer();
        let calls = AtomicUsize::new(0);
        let args = CallArgs::new();

        let failed: std::result::Result<u32, String> = memo
            .try_get_or_compute("t", "flaky", &args, TtlPolicy::Stable, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("db down".to_string())
            })
            .await;
        assert_eq!(failed, Err("db down".to_string()));

        let ok: std::result::Result<u32, String> = memo
            .try_get_or_compute("t", "flaky", &args, TtlPolicy::Stable, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(9)
            })
            .await;
        assert_eq!(ok, Ok(9));

        let cached: std::result::Result<u32, String> = memo
            .try_get_or_compute("t", "flaky", &args, TtlPolicy::Stable, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(10)
            })
            .await;
        assert_eq!(cached, Ok(9));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_wrapped_operation() {
        let (_, memo) = memoizer();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let area = memo.wrap("geometry", "area", TtlPolicy::Reference, move |args: CallArgs| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                let w = args.keyword["w"].as_u64().unwrap_or(0);
                let h = args.keyword["h"].as_u64().unwrap_or(0);
                w * h
            }
        });

        assert_eq!(area.name(), "area");
        assert_eq!(area.policy(), TtlPolicy::Reference);
        assert_eq!(area.call(CallArgs::new().kwarg("w", 3).kwarg("h", 4)).await, 12);
        assert_eq!(area.call(CallArgs::new().kwarg("h", 4).kwarg("w", 3)).await, 12);
        assert_eq!(area.call(CallArgs::new().kwarg("w", 5).kwarg("h", 4)).await, 20);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
