//! Generic cache entry with absolute expiry

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// A cached value together with its lifetime bookkeeping
///
/// `created_at + ttl` is the absolute expiry. An entry observed at or past
/// that instant is treated as absent; stores purge it on the next touch.
/// Entries are replaced, never mutated, apart from the hit counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    /// Storage key the entry lives under
    pub key: String,
    /// Cached payload
    pub value: V,
    /// When the entry was written
    pub created_at: DateTime<Utc>,
    /// Lifetime measured from `created_at`
    pub ttl: Duration,
    /// Number of reads served from this entry
    pub hit_count: u64,
}

impl<V> CacheEntry<V> {
    /// Create an entry stamped with the current time
    pub fn new(key: impl Into<String>, value: V, ttl: Duration) -> Self {
        Self::created_at(key, value, ttl, Utc::now())
    }

    /// Create an entry with an explicit creation time
    pub fn created_at(key: impl Into<String>, value: V, ttl: Duration, at: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            value,
            created_at: at,
            ttl,
            hit_count: 0,
        }
    }

    /// Absolute expiry instant
    ///
    /// Saturates at the maximum representable time for absurdly long TTLs.
    pub fn expires_at(&self) -> DateTime<Utc> {
        TimeDelta::from_std(self.ttl)
            .ok()
            .and_then(|delta| self.created_at.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Whether the entry is expired at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    /// Whether the entry is expired right now
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Lifetime left at `now`, `None` once expired
    pub fn remaining_ttl_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        (self.expires_at() - now)
            .to_std()
            .ok()
            .filter(|left| !left.is_zero())
    }

    /// Record a read served from this entry
    pub fn record_hit(&mut self) {
        self.hit_count = self.hit_count.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_ttl_is_expired_immediately() {
        let entry = CacheEntry::new("k", 1, Duration::ZERO);
        assert!(entry.is_expired());
        assert!(entry.is_expired_at(entry.created_at));
    }

    #[test]
    fn entry_lives_until_expiry() {
        let at = Utc::now();
        let entry = CacheEntry::created_at("k", "v", Duration::from_secs(60), at);
        assert!(!entry.is_expired_at(at + TimeDelta::seconds(59)));
        assert!(entry.is_expired_at(at + TimeDelta::seconds(60)));
    }

    #[test]
    fn entry_created_in_the_past_is_expired() {
        let at = Utc::now() - TimeDelta::hours(2);
        let entry = CacheEntry::created_at("k", (), Duration::from_secs(3600), at);
        assert!(entry.is_expired());
    }

    #[test]
    fn remaining_ttl_shrinks() {
        let at = Utc::now();
        let entry = CacheEntry::created_at("k", (), Duration::from_secs(10), at);
        assert_eq!(
            entry.remaining_ttl_at(at + TimeDelta::seconds(4)),
            Some(Duration::from_secs(6))
        );
        assert_eq!(entry.remaining_ttl_at(at + TimeDelta::seconds(10)), None);
    }

    #[test]
    fn huge_ttl_does_not_overflow() {
        let entry = CacheEntry::new("k", (), Duration::MAX);
        assert!(!entry.is_expired());
    }

    #[test]
    fn hits_are_counted() {
        let mut entry = CacheEntry::new("k", (), Duration::from_secs(1));
        entry.record_hit();
        entry.record_hit();
        assert_eq!(entry.hit_count, 2);
    }
}
