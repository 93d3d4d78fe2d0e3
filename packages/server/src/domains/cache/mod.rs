//! Ephemeral key-value cache backing the one-time-token handshake.
//!
//! Entries carry an absolute expiry in epoch millis (`0` = no expiry).
//! Expiry is lazy: reads treat stale entries as absent and opportunistically
//! remove them; `cleanup_expired` exists only for space reclamation.
//!
//! All operations are safe under concurrent callers on the same key without
//! external locking. The NX write and `take` are single critical sections,
//! which is what makes idempotent token issuance and single-use token
//! consumption race-free.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;

#[derive(Clone, Debug)]
struct Entry {
    value: Value,
    expire_at_ms: i64,
}

impl Entry {
    fn is_live(&self, now_ms: i64) -> bool {
        self.expire_at_ms == 0 || self.expire_at_ms > now_ms
    }
}

/// Write options for [`TokenCache::set`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    /// Time-to-live in seconds; `None` means the entry never expires.
    pub ttl_seconds: Option<u64>,
    /// When set, the write is rejected if an unexpired entry already exists.
    pub if_not_exists: bool,
}

/// In-memory token cache
#[derive(Clone, Default)]
pub struct TokenCache {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a value. Returns whether the write happened (always true
    /// unless `if_not_exists` rejected it).
    pub async fn set(&self, key: &str, value: Value, opts: SetOptions) -> bool {
        let now_ms = now_millis();
        let expire_at_ms = match opts.ttl_seconds {
            Some(ttl) => now_ms + ttl as i64 * 1000,
            None => 0,
        };

        let mut entries = self.entries.write().await;
        if opts.if_not_exists {
            if let Some(existing) = entries.get(key) {
                if existing.is_live(now_ms) {
                    return false;
                }
            }
        }
        entries.insert(key.to_string(), Entry { value, expire_at_ms });
        true
    }

    /// Get a value, treating expired entries as absent.
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.get_with_ttl(key).await.map(|(value, _)| value)
    }

    /// Get a value together with its remaining TTL in seconds
    /// (`None` for entries without expiry).
    pub async fn get_with_ttl(&self, key: &str) -> Option<(Value, Option<i64>)> {
        let now_ms = now_millis();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.is_live(now_ms) => {
                    let remaining = (entry.expire_at_ms != 0)
                        .then(|| (entry.expire_at_ms - now_ms) / 1000);
                    return Some((entry.value.clone(), remaining));
                }
                Some(_) => {} // expired, fall through to remove
                None => return None,
            }
        }

        // Opportunistic removal of the expired entry. Re-check under the
        // write lock: a concurrent set may have replaced it.
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(key) {
            if !entry.is_live(now_millis()) {
                entries.remove(key);
            }
        }
        None
    }

    /// Atomically fetch and invalidate. This is the one-time-token
    /// consumption primitive: at most one caller observes the value.
    pub async fn take(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.write().await;
        match entries.remove(key) {
            Some(entry) if entry.is_live(now_millis()) => Some(entry.value),
            _ => None,
        }
    }

    /// Unconditional removal.
    pub async fn delete(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    /// Drop all expired entries (run periodically if space matters).
    pub async fn cleanup_expired(&self) {
        let now_ms = now_millis();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.is_live(now_ms));
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = TokenCache::new();
        cache.set("k", json!({"v": 1}), SetOptions::default()).await;
        assert_eq!(cache.get("k").await, Some(json!({"v": 1})));
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let cache = TokenCache::new();
        cache
            .set(
                "k",
                json!("v"),
                SetOptions {
                    ttl_seconds: Some(1),
                    ..Default::default()
                },
            )
            .await;
        assert!(cache.get("k").await.is_some());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(cache.get("k").await.is_none(), "expired entry reads as absent");
    }

    #[tokio::test]
    async fn test_zero_ttl_means_no_expiry() {
        let cache = TokenCache::new();
        cache.set("k", json!("v"), SetOptions::default()).await;
        let (_, remaining) = cache.get_with_ttl("k").await.unwrap();
        assert_eq!(remaining, None);
    }

    #[tokio::test]
    async fn test_nx_does_not_overwrite_live_entry() {
        let cache = TokenCache::new();
        let first = cache
            .set(
                "k",
                json!("first"),
                SetOptions {
                    ttl_seconds: Some(60),
                    if_not_exists: true,
                },
            )
            .await;
        let second = cache
            .set(
                "k",
                json!("second"),
                SetOptions {
                    ttl_seconds: Some(60),
                    if_not_exists: true,
                },
            )
            .await;

        assert!(first);
        assert!(!second, "NX write against a live entry must be a no-op");
        assert_eq!(cache.get("k").await, Some(json!("first")));
    }

    #[tokio::test]
    async fn test_nx_succeeds_over_expired_entry() {
        let cache = TokenCache::new();
        cache
            .set(
                "k",
                json!("stale"),
                SetOptions {
                    ttl_seconds: Some(1),
                    ..Default::default()
                },
            )
            .await;
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let written = cache
            .set(
                "k",
                json!("fresh"),
                SetOptions {
                    ttl_seconds: Some(60),
                    if_not_exists: true,
                },
            )
            .await;
        assert!(written, "expired entries do not block NX writes");
        assert_eq!(cache.get("k").await, Some(json!("fresh")));
    }

    #[tokio::test]
    async fn test_take_is_single_use() {
        let cache = TokenCache::new();
        cache.set("ott", json!({"type": "email"}), SetOptions::default()).await;

        assert_eq!(cache.take("ott").await, Some(json!({"type": "email"})));
        assert_eq!(cache.take("ott").await, None, "second take must fail");
        assert_eq!(cache.get("ott").await, None);
    }

    #[tokio::test]
    async fn test_take_of_expired_entry_fails() {
        let cache = TokenCache::new();
        cache
            .set(
                "ott",
                json!("v"),
                SetOptions {
                    ttl_seconds: Some(1),
                    ..Default::default()
                },
            )
            .await;
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(cache.take("ott").await, None);
    }

    #[tokio::test]
    async fn test_delete_removes_entry() {
        let cache = TokenCache::new();
        cache.set("k", json!("v"), SetOptions::default()).await;
        cache.delete("k").await;
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_cleanup_retains_live_entries() {
        let cache = TokenCache::new();
        cache.set("keep", json!(1), SetOptions::default()).await;
        cache
            .set(
                "drop",
                json!(2),
                SetOptions {
                    ttl_seconds: Some(1),
                    ..Default::default()
                },
            )
            .await;
        tokio::time::sleep(Duration::from_millis(1100)).await;

        cache.cleanup_expired().await;
        assert!(cache.get("keep").await.is_some());
        assert!(cache.get("drop").await.is_none());
    }
}
