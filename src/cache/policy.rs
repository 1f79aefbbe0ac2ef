//! TTL Policy Module
//!
//! Named expiry classes for cached data and the process-wide table that
//! maps each class to a duration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::GateError;
use crate::store::MAX_EXPIRE_SECS;

// == TTL Policy ==
/// How long a class of cached data stays fresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TtlPolicy {
    /// Frequently changing data (5 minutes by default)
    #[default]
    HighRotation,
    /// Data that changes occasionally (1 hour)
    Stable,
    /// Reference/catalog data (24 hours)
    Reference,
    /// Search results and other short-lived data (1 minute)
    Ephemeral,
}

impl TtlPolicy {
    pub const ALL: [TtlPolicy; 4] = [
        TtlPolicy::HighRotation,
        TtlPolicy::Stable,
        TtlPolicy::Reference,
        TtlPolicy::Ephemeral,
    ];

    /// Canonical policy name.
    pub fn name(self) -> &'static str {
        match self {
            TtlPolicy::HighRotation => "high-rotation",
            TtlPolicy::Stable => "stable",
            TtlPolicy::Reference => "reference",
            TtlPolicy::Ephemeral => "ephemeral",
        }
    }

    /// Built-in duration in seconds.
    pub fn default_ttl(self) -> u64 {
        match self {
            TtlPolicy::HighRotation => 300,
            TtlPolicy::Stable => 3600,
            TtlPolicy::Reference => 86_400,
            TtlPolicy::Ephemeral => 60,
        }
    }

    /// Looks a policy up by name, accepting the legacy `tipo_*` and
    /// `*_data` spellings.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "high-rotation" | "tipo-a" | "frequent-data" | "frequent" => {
                Some(TtlPolicy::HighRotation)
            }
            "stable" | "tipo-b" | "stable-data" => Some(TtlPolicy::Stable),
            "reference" | "tipo-c" | "reference-data" => Some(TtlPolicy::Reference),
            "ephemeral" | "tipo-d" | "search-data" | "temporary" => Some(TtlPolicy::Ephemeral),
            _ => None,
        }
    }

    /// Like [`from_name`](Self::from_name) but unknown names resolve to the
    /// default policy instead of failing.
    pub fn from_name_or_default(name: &str) -> Self {
        Self::from_name(name).unwrap_or_else(|| {
            let fallback = TtlPolicy::default();
            warn!(policy = name, fallback = fallback.name(), "Unknown TTL policy, using default");
            fallback
        })
    }
}

impl fmt::Display for TtlPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TtlPolicy {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| GateError::Config(format!("unknown TTL policy '{s}'")))
    }
}

// == TTL Table ==
/// Policy -> seconds mapping, fixed once the process has started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlTable {
    high_rotation: u64,
    stable: u64,
    reference: u64,
    ephemeral: u64,
}

impl TtlTable {
    /// Table with the built-in durations.
    pub fn new() -> Self {
        Self {
            high_rotation: TtlPolicy::HighRotation.default_ttl(),
            stable: TtlPolicy::Stable.default_ttl(),
            reference: TtlPolicy::Reference.default_ttl(),
            ephemeral: TtlPolicy::Ephemeral.default_ttl(),
        }
    }

    /// Returns a copy with `policy` mapped to `seconds`, clamped to
    /// `1..=MAX_EXPIRE_SECS` since the store rejects a zero expiry.
    pub fn with_override(mut self, policy: TtlPolicy, seconds: u64) -> Self {
        let seconds = seconds.clamp(1, MAX_EXPIRE_SECS);
        match policy {
            TtlPolicy::HighRotation => self.high_rotation = seconds,
            TtlPolicy::Stable => self.stable = seconds,
            TtlPolicy::Reference => self.reference = seconds,
            TtlPolicy::Ephemeral => self.ephemeral = seconds,
        }
        self
    }

    /// Duration in seconds for `policy`.
    pub fn ttl(&self, policy: TtlPolicy) -> u64 {
        match policy {
            TtlPolicy::HighRotation => self.high_rotation,
            TtlPolicy::Stable => self.stable,
            TtlPolicy::Reference => self.reference,
            TtlPolicy::Ephemeral => self.ephemeral,
        }
    }

    /// Duration for a policy given by name, falling back to the default policy.
    pub fn ttl_named(&self, name: &str) -> u64 {
        self.ttl(TtlPolicy::from_name_or_default(name))
    }
}

impl Default for TtlTable {
    fn default() -> Self {
        Self::new()
    }
}
