//! In-Memory Store Module
//!
//! Process-local implementation of [`KvStore`] with TTL expiration and
//! LRU eviction. Expired keys are dropped lazily on access and in bulk
//! by the cleanup task.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{GateError, Result};
use crate::store::{glob_match, KvStore, ServerInfo, StoredEntry, StoredValue};

const WRONG_TYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";
const NOT_INTEGER: &str = "ERR value is not an integer or out of range";

// == Memory Store ==
/// Shared handle to an in-process key-value store.
///
/// Clones share the same underlying map.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryInner>>,
}

#[derive(Debug)]
struct MemoryInner {
    entries: HashMap<String, StoredEntry>,
    /// Access tick -> key, oldest first
    lru: BTreeMap<u64, String>,
    tick: u64,
    max_entries: usize,
    keyspace_hits: u64,
    keyspace_misses: u64,
    evictions: u64,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates an empty store holding at most `max_entries` keys.
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(MemoryInner {
                entries: HashMap::new(),
                lru: BTreeMap::new(),
                tick: 0,
                max_entries: max_entries.max(1),
                keyspace_hits: 0,
                keyspace_misses: 0,
                evictions: 0,
            })),
        }
    }

    // == Cleanup Expired ==
    /// Removes all expired keys, returning how many were dropped.
    pub async fn cleanup_expired(&self) -> usize {
        let mut inner = self.inner.write().await;
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            inner.remove(key);
        }
        expired.len()
    }

    /// Number of keys currently held, including not yet swept expired ones.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Keys dropped to stay within capacity.
    pub async fn evictions(&self) -> u64 {
        self.inner.read().await.evictions
    }

    /// Remaining lifetime of `key` in milliseconds, None if absent or persistent.
    pub async fn ttl_remaining_ms(&self, key: &str) -> Option<u64> {
        let inner = self.inner.read().await;
        inner
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .and_then(StoredEntry::ttl_remaining_ms)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl MemoryInner {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Returns the live entry for `key`, dropping it first if expired.
    fn live(&mut self, key: &str) -> Option<&mut StoredEntry> {
        if self.entries.get(key).is_some_and(StoredEntry::is_expired) {
            self.remove(key);
        }
        let tick = self.next_tick();
        let entry = self.entries.get_mut(key)?;
        self.lru.remove(&entry.last_access);
        entry.last_access = tick;
        self.lru.insert(tick, key.to_string());
        Some(entry)
    }

    fn remove(&mut self, key: &str) -> Option<StoredEntry> {
        let entry = self.entries.remove(key)?;
        self.lru.remove(&entry.last_access);
        Some(entry)
    }

    /// Inserts or replaces `key`, evicting the least recently used key
    /// when a new key would exceed capacity.
    fn insert(&mut self, key: &str, value: StoredValue, ttl_seconds: Option<u64>) {
        if self.remove(key).is_none() && self.entries.len() >= self.max_entries {
            if let Some((_, oldest)) = self.lru.pop_first() {
                self.entries.remove(&oldest);
                self.evictions += 1;
            }
        }
        let tick = self.next_tick();
        self.entries
            .insert(key.to_string(), StoredEntry::new(value, ttl_seconds, tick));
        self.lru.insert(tick, key.to_string());
    }

    fn used_memory(&self) -> usize {
        self.entries
            .iter()
            .map(|(key, entry)| key.len() + entry.value.approx_size())
            .sum()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.insert(key, StoredValue::Text(value.to_string()), Some(ttl_secs));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut inner = self.inner.write().await;
        let value = match inner.live(key) {
            Some(entry) => match &entry.value {
                StoredValue::Text(text) => Some(text.clone()),
                StoredValue::SortedSet(_) => return Err(GateError::Store(WRONG_TYPE.into())),
            },
            None => None,
        };

        if value.is_some() {
            inner.keyspace_hits += 1;
        } else {
            inner.keyspace_misses += 1;
        }
        Ok(value)
    }

    async fn del(&self, keys: &[String]) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let mut removed = 0;
        for key in keys {
            if let Some(entry) = inner.remove(key) {
                if !entry.is_expired() {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let inner = self.inner.read().await;
        Ok(inner
            .entries
            .iter()
            .filter(|(key, entry)| !entry.is_expired() && glob_match(pattern, key))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.live(key) {
            return match &mut entry.value {
                StoredValue::SortedSet(members) => {
                    members.insert(member.to_string(), score);
                    Ok(())
                }
                StoredValue::Text(_) => Err(GateError::Store(WRONG_TYPE.into())),
            };
        }

        let members = HashMap::from([(member.to_string(), score)]);
        inner.insert(key, StoredValue::SortedSet(members), None);
        Ok(())
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        let mut inner = self.inner.write().await;
        match inner.live(key) {
            Some(entry) => match &entry.value {
                StoredValue::SortedSet(members) => Ok(members.len() as u64),
                StoredValue::Text(_) => Err(GateError::Store(WRONG_TYPE.into())),
            },
            None => Ok(0),
        }
    }

    async fn zrembyscore(&self, key: &str, min: f64, max: f64) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let (removed, now_empty) = match inner.live(key) {
            Some(entry) => match &mut entry.value {
                StoredValue::SortedSet(members) => {
                    let before = members.len();
                    members.retain(|_, score| *score < min || *score > max);
                    ((before - members.len()) as u64, members.is_empty())
                }
                StoredValue::Text(_) => return Err(GateError::Store(WRONG_TYPE.into())),
            },
            None => return Ok(0),
        };

        // Redis drops sorted sets that become empty.
        if now_empty {
            inner.remove(key);
        }
        Ok(removed)
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<bool> {
        let mut inner = self.inner.write().await;
        match inner.live(key) {
            Some(entry) => {
                entry.expire_in(seconds);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn incr(&self, key: &str, delta: i64) -> Result<i64> {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.live(key) {
            let StoredValue::Text(text) = &mut entry.value else {
                return Err(GateError::Store(WRONG_TYPE.into()));
            };
            let current: i64 = text
                .parse()
                .map_err(|_| GateError::Store(NOT_INTEGER.into()))?;
            let next = current
                .checked_add(delta)
                .ok_or_else(|| GateError::Store(NOT_INTEGER.into()))?;
            *text = next.to_string();
            return Ok(next);
        }

        inner.insert(key, StoredValue::Text(delta.to_string()), None);
        Ok(delta)
    }

    async fn info(&self) -> Result<ServerInfo> {
        let inner = self.inner.read().await;
        Ok(ServerInfo {
            connected_clients: 1,
            used_memory_human: bytes_to_human(inner.used_memory()),
            keyspace_hits: inner.keyspace_hits,
            keyspace_misses: inner.keyspace_misses,
        })
    }
}

/// Formats a byte count the way Redis renders `used_memory_human`.
fn bytes_to_human(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["K", "M", "G", "T"];
    if bytes < 1024 {
        return format!("{bytes}B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2}{}", value, UNITS[unit])
}
