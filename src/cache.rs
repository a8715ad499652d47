use std::time::{Duration, Instant};

use moka::future::Cache;
use moka::Expiry;

/// Shared string key-value cache with a per-entry TTL, standing in for an
/// external cache service. Single-key get/set/delete only; entry operations
/// are atomic on the provider side so callers never need a lock.
///
/// Holds both the chatroom directory entries (`chatrooms:{user_id}`, 600 s)
/// and the one-time codes (`otp:{code}`, 120 s).
#[derive(Clone)]
pub struct KvCache {
    inner: Cache<String, (String, Duration)>,
}

struct PerEntryTtl;

impl Expiry<String, (String, Duration)> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &(String, Duration),
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.1)
    }
}

impl KvCache {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .expire_after(PerEntryTtl)
                .build(),
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).await.map(|(value, _)| value)
    }

    pub async fn set(&self, key: &str, value: String, ttl: Duration) {
        self.inner.insert(key.to_string(), (value, ttl)).await;
    }

    pub async fn delete(&self, key: &str) {
        self.inner.invalidate(key).await;
    }
}
