//! Cache Module
//!
//! Namespaced JSON caching over the key-value store, TTL policies,
//! memoization of operations and hit/miss metrics.

mod manager;
mod memoize;
mod metrics;
mod policy;


// Re-export public types
pub use manager::CacheManager;
pub use memoize::{fingerprint, CallArgs, Memoized, Memoizer, FINGERPRINT_HEX_LEN};
pub use metrics::{hit_rate, CacheMetrics, CacheStats, MetricsSnapshot, HITS_PREFIX, MISSES_PREFIX};
pub use policy::{TtlPolicy, TtlTable};

// == Public Constants ==
/// Leading segment of every cache key
pub const KEY_PREFIX: &str = "cache";
