//! Store Module
//!
//! The key-value store collaborator the cache and rate limiter talk to.
//! `RedisStore` is the production backend; `MemoryStore` implements the
//! same command subset in-process.

mod entry;
mod memory;
mod redis_store;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

pub use entry::{current_timestamp_ms, StoredEntry, StoredValue};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// Longest expiry accepted anywhere, in seconds. Millisecond deadlines
/// derived from it still fit in an `i64`.
pub const MAX_EXPIRE_SECS: u64 = i64::MAX as u64 / 1000;

// == Key-Value Store ==
/// Command subset required from the external key-value store.
///
/// Every method is one round trip. Implementations must not hold an
/// in-process lock across an await on the network.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// `SET key value EX ttl`
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;

    /// `GET key`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// `DEL key [key ...]`, returning how many keys existed.
    async fn del(&self, keys: &[String]) -> Result<u64>;

    /// `KEYS pattern` with Redis glob syntax.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// `ZADD key score member`
    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()>;

    /// `ZCARD key`
    async fn zcard(&self, key: &str) -> Result<u64>;

    /// `ZREMRANGEBYSCORE key min max`, both bounds inclusive.
    async fn zrembyscore(&self, key: &str, min: f64, max: f64) -> Result<u64>;

    /// `EXPIRE key seconds`, returning false when the key does not exist.
    async fn expire(&self, key: &str, seconds: u64) -> Result<bool>;

    /// `INCRBY key delta`
    async fn incr(&self, key: &str, delta: i64) -> Result<i64>;

    /// `INFO`
    async fn info(&self) -> Result<ServerInfo>;
}

// == Server Info ==
/// Subset of the `INFO` reply surfaced by the metrics endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServerInfo {
    pub connected_clients: u64,
    pub used_memory_human: String,
    pub keyspace_hits: u64,
    pub keyspace_misses: u64,
}

impl ServerInfo {
    /// Parses the `field:value` lines of a Redis `INFO` reply.
    ///
    /// Missing fields keep their defaults (`0`, `"0B"`).
    pub fn parse(raw: &str) -> Self {
        let mut info = ServerInfo {
            used_memory_human: "0B".to_string(),
            ..Default::default()
        };

        for line in raw.lines() {
            let Some((field, value)) = line.trim().split_once(':') else {
                continue;
            };
            match field {
                "connected_clients" => info.connected_clients = value.parse().unwrap_or(0),
                "used_memory_human" => info.used_memory_human = value.to_string(),
                "keyspace_hits" => info.keyspace_hits = value.parse().unwrap_or(0),
                "keyspace_misses" => info.keyspace_misses = value.parse().unwrap_or(0),
                _ => {}
            }
        }

        info
    }
}

// == Glob Matching ==
/// Matches `key` against a Redis-style glob: `*`, `?`, `[abc]`, `[a-z]`,
/// `[^a]` and `\` escapes.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    match_bytes(pattern.as_bytes(), key.as_bytes())
}

fn match_bytes(pat: &[u8], s: &[u8]) -> bool {
    let (mut p, mut i) = (0, 0);
    // Pattern index after the last `*` and the key index it resumes from
    let mut star: Option<(usize, usize)> = None;

    while i < s.len() {
        if pat.get(p) == Some(&b'*') {
            while pat.get(p) == Some(&b'*') {
                p += 1;
            }
            star = Some((p, i));
            continue;
        }
        if p < pat.len() {
            let (matched, len) = match_one(&pat[p..], s[i]);
            if matched {
                p += len;
                i += 1;
                continue;
            }
        }
        match star {
            Some((star_p, star_i)) => {
                p = star_p;
                i = star_i + 1;
                star = Some((star_p, i));
            }
            None => return false,
        }
    }

    pat[p..].iter().all(|&b| b == b'*')
}

/// Matches one non-`*` token at the head of `pat` against `c`; returns the
/// match and the token length.
fn match_one(pat: &[u8], c: u8) -> (bool, usize) {
    match pat[0] {
        b'?' => (true, 1),
        b'[' => {
            let (matched, rest) = match_class(&pat[1..], c);
            (matched, pat.len() - rest.len())
        }
        b'\\' if pat.len() > 1 => (pat[1] == c, 2),
        literal => (literal == c, 1),
    }
}

/// Evaluates a `[...]` class against `c`; returns the match and the
/// pattern remaining after the closing bracket.
fn match_class(mut pat: &[u8], c: u8) -> (bool, &[u8]) {
    let negate = pat.first() == Some(&b'^');
    if negate {
        pat = &pat[1..];
    }

    let mut matched = false;
    loop {
        match pat {
            [] => break,
            [b']', rest @ ..] => {
                pat = rest;
                break;
            }
            [b'\\', escaped, rest @ ..] => {
                matched |= *escaped == c;
                pat = rest;
            }
            [lo, b'-', hi, rest @ ..] if *hi != b']' => {
                let (lo, hi) = if lo <= hi { (*lo, *hi) } else { (*hi, *lo) };
                matched |= (lo..=hi).contains(&c);
                pat = rest;
            }
            [single, rest @ ..] => {
                matched |= *single == c;
                pat = rest;
            }
        }
    }

    (matched != negate, pat)
}
