//! 进程内结果缓存
//!
//! DashMap 实现的 TTL 缓存，过期条目在下次读取时惰性驱逐。
//! 重启即清空，符合缓存的最佳努力语义

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use std::time::Duration;

use crate::application::ports::{CachedResult, ResultCachePort};

struct CacheEntry {
    value: CachedResult,
    expires_at: DateTime<Utc>,
}

/// 进程内 TTL 缓存
pub struct InMemoryResultCache {
    entries: DashMap<String, CacheEntry>,
}

impl InMemoryResultCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// 当前未过期条目数（统计用，结果是瞬时快照）
    pub fn len(&self) -> usize {
        let now = Utc::now();
        self.entries
            .iter()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryResultCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultCachePort for InMemoryResultCache {
    fn get(&self, fingerprint: &str) -> Option<CachedResult> {
        let now = Utc::now();
        if let Some(entry) = self.entries.get(fingerprint) {
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
        }
        // 过期条目惰性移除
        self.entries
            .remove_if(fingerprint, |_, entry| entry.expires_at <= now);
        None
    }

    fn put(&self, fingerprint: String, value: CachedResult, ttl: Duration) {
        let expires_at = Utc::now()
            + ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::seconds(300));
        self.entries
            .insert(fingerprint, CacheEntry { value, expires_at });
    }
}
