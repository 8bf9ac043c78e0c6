//! Detection cache.
//!
//! Process-wide map from the telephony provider's call-sid to the SDR
//! verification outcome, conveying it from the `/verify-sdr` HTTP handler
//! to the media session on stream-start. Writes happen on one task, reads
//! happen on another — hence the lock — but there is never more than one
//! reader per entry.

use crate::types::DetectionRecord;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

const TTL: i64 = 5 * 60;

pub struct DetectionCache {
    entries: RwLock<HashMap<String, DetectionRecord>>,
}

impl DetectionCache {
    pub fn new() -> Self {
        Self { entries: RwLock::new(HashMap::new()) }
    }

    pub fn insert(&self, call_sid: String, record: DetectionRecord) {
        self.sweep();
        self.entries.write().unwrap().insert(call_sid, record);
    }

    /// Read and remove the record for `call_sid`, if any and not expired.
    pub fn take(&self, call_sid: &str) -> Option<DetectionRecord> {
        self.sweep();
        self.entries.write().unwrap().remove(call_sid)
    }

    /// Lazy-on-write sweep: collect expired keys, then remove them.
    fn sweep(&self) {
        let now = Utc::now();
        let mut entries = self.entries.write().unwrap();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, record)| now - record.created_at > Duration::seconds(TTL))
            .map(|(k, _)| k.clone())
            .collect();
        for key in expired {
            debug!("detection cache: evicting expired entry {key}");
            entries.remove(&key);
        }
    }
}

impl Default for DetectionCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(call_id: &str, age_secs: i64) -> DetectionRecord {
        DetectionRecord {
            call_id: call_id.to_string(),
            sdr_answered: true,
            reason: "quick_confirmation_pattern".to_string(),
            confidence: 0.99,
            first_words: "ok pode".to_string(),
            created_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[test]
    fn written_record_is_read_exactly_once() {
        let cache = DetectionCache::new();
        cache.insert("CA123".to_string(), record("call-1", 0));
        assert!(cache.take("CA123").is_some());
        assert!(cache.take("CA123").is_none());
    }

    #[test]
    fn entries_older_than_five_minutes_are_evicted() {
        let cache = DetectionCache::new();
        cache.insert("CA_old".to_string(), record("call-old", 301));
        cache.insert("CA_new".to_string(), record("call-new", 10));
        assert!(cache.take("CA_old").is_none());
        assert!(cache.take("CA_new").is_some());
    }
}
