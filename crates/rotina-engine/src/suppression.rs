//! Minute-level cross-driver suppression.
//!
//! Two independently scheduled drivers can evaluate overlapping windows in
//! the same minute and both pass the ledger check before either write is
//! visible. This cache closes that gap: the first dispatch for a subject
//! in a given minute acquires the key, later ones are suppressed and
//! simply retry on the next cycle (nothing was recorded for them).
//!
//! Owned by the driver layer and passed in explicitly — entries carry the
//! cycle's own timestamps, so tests drive it with a fixed clock.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use rotina_core::clock::TimeContext;

pub struct SuppressionCache {
    entries: Mutex<HashMap<String, DateTime<Utc>>>,
    ttl: Duration,
    cap: usize,
}

impl SuppressionCache {
    /// `ttl_secs` should sit slightly over one minute so a key survives
    /// until the minute it names has passed everywhere.
    pub fn new(ttl_secs: u64, cap: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: Duration::seconds(ttl_secs as i64),
            cap: cap.max(1),
        }
    }

    /// The key both drivers would compute for the same evaluation minute.
    pub fn minute_key(subject_id: &str, ctx: &TimeContext) -> String {
        format!("{}|{}|{}", subject_id, ctx.date, ctx.hhmm())
    }

    /// Claim a key. Returns false when another driver already holds it
    /// within the TTL. Expired entries are pruned on the way in, and the
    /// oldest entry is evicted once the hard cap is reached.
    pub fn try_acquire(&self, key: &str, now: DateTime<Utc>) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|_, stamp| now.signed_duration_since(*stamp) < self.ttl);
        if entries.contains_key(key) {
            return false;
        }
        if entries.len() >= self.cap {
            let oldest = entries
                .iter()
                .min_by_key(|(_, stamp)| **stamp)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }
        entries.insert(key.to_string(), now);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn second_acquire_within_ttl_is_suppressed() {
        let cache = SuppressionCache::new(75, 16);
        assert!(cache.try_acquire("u1|2024-05-10|12:00", t(0)));
        assert!(!cache.try_acquire("u1|2024-05-10|12:00", t(30)));
        // Different minute → different key → passes.
        assert!(cache.try_acquire("u1|2024-05-10|12:01", t(60)));
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = SuppressionCache::new(75, 16);
        assert!(cache.try_acquire("k", t(0)));
        assert!(cache.try_acquire("k", t(76)));
    }

    #[test]
    fn cap_evicts_oldest() {
        let cache = SuppressionCache::new(3600, 2);
        assert!(cache.try_acquire("a", t(0)));
        assert!(cache.try_acquire("b", t(1)));
        assert!(cache.try_acquire("c", t(2)));
        assert_eq!(cache.len(), 2);
        // "a" was evicted, so it can be acquired again.
        assert!(cache.try_acquire("a", t(3)));
        // "c" is still held.
        assert!(!cache.try_acquire("c", t(4)));
    }
}
