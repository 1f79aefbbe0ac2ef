//! Stored Entry Module
//!
//! Values held by the in-memory store backend, with optional expiry.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

// == Stored Value ==
/// The two Redis value types the gate relies on.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    /// Plain string (`SET`/`GET`/`INCRBY`)
    Text(String),
    /// Sorted set of member -> score (`ZADD`/`ZCARD`/`ZREMRANGEBYSCORE`)
    SortedSet(HashMap<String, f64>),
}

impl StoredValue {
    /// Approximate payload size in bytes, used for `used_memory_human`.
    pub fn approx_size(&self) -> usize {
        match self {
            StoredValue::Text(text) => text.len(),
            StoredValue::SortedSet(members) => members
                .keys()
                .map(|member| member.len() + std::mem::size_of::<f64>())
                .sum(),
        }
    }
}

// == Stored Entry ==
/// A value plus its expiry and last access tick.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub value: StoredValue,
    /// Expiration timestamp (Unix milliseconds), None = persistent
    pub expires_at: Option<u64>,
    /// Monotonic access counter used for LRU eviction
    pub last_access: u64,
}

impl StoredEntry {
    // == Constructor ==
    /// Creates an entry expiring `ttl_seconds` from now, or never.
    pub fn new(value: StoredValue, ttl_seconds: Option<u64>, tick: u64) -> Self {
        let expires_at = ttl_seconds.map(deadline_after);
        Self {
            value,
            expires_at,
            last_access: tick,
        }
    }

    // == Is Expired ==
    /// An entry is expired once the current time reaches `expires_at`.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        matches!(self.expires_at, Some(expires) if now_ms >= expires)
    }

    // == Expire ==
    /// Resets the expiry to `seconds` from now.
    pub fn expire_in(&mut self, seconds: u64) {
        self.expires_at = Some(deadline_after(seconds));
    }

    /// Remaining lifetime in milliseconds; `Some(0)` once expired.
    pub fn ttl_remaining_ms(&self) -> Option<u64> {
        self.expires_at
            .map(|expires| expires.saturating_sub(current_timestamp_ms()))
    }
}

// == Utility Functions ==
/// Unix milliseconds `seconds` from now, saturating instead of overflowing.
fn deadline_after(seconds: u64) -> u64 {
    current_timestamp_ms().saturating_add(seconds.saturating_mul(1000))
}

/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    fn text(value: &str) -> StoredValue {
        StoredValue::Text(value.to_string())
    }

    #[test]
    fn test_entry_without_ttl_never_expires() {
        let entry = StoredEntry::new(text("v"), None, 0);
        assert!(entry.expires_at.is_none());
        assert!(!entry.is_expired());
        assert!(entry.ttl_remaining_ms().is_none());
    }

    #[test]
    fn test_entry_expiration() {
        let entry = StoredEntry::new(text("v"), Some(1), 0);
        assert!(!entry.is_expired());

        sleep(Duration::from_millis(1100));

        assert!(entry.is_expired());
        assert_eq!(entry.ttl_remaining_ms(), Some(0));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = current_timestamp_ms();
        let entry = StoredEntry {
            value: text("v"),
            expires_at: Some(now),
            last_access: 0,
        };
        assert!(entry.is_expired_at(now), "Entry should be expired at boundary");
        assert!(!entry.is_expired_at(now - 1));
    }

    #[test]
    fn test_expire_in_resets_ttl() {
        let mut entry = StoredEntry::new(text("v"), None, 0);
        entry.expire_in(10);

        let remaining = entry.ttl_remaining_ms().unwrap();
        assert!(remaining <= 10_000);
        assert!(remaining >= 9_000);
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let entry = StoredEntry::new(text("v"), Some(u64::MAX / 100), 0);
        assert_eq!(entry.expires_at, Some(u64::MAX));
        assert!(!entry.is_expired());

        let mut entry = StoredEntry::new(text("v"), None, 0);
        entry.expire_in(u64::MAX);
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_approx_size() {
        assert_eq!(text("hello").approx_size(), 5);

        let mut members = HashMap::new();
        members.insert("ab".to_string(), 1.0);
        let size = StoredValue::SortedSet(members).approx_size();
        assert_eq!(size, 2 + std::mem::size_of::<f64>());
    }
}
