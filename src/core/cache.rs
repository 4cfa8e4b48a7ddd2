use crate::domain::ports::Storage;
use crate::utils::error::Result;
use crate::utils::validation::validate_cache_key;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// 快取鍵
pub mod keys {
    pub const STUDENT_LIST: &str = "studentList";

    pub fn advisor_data(advisor_id: i64) -> String {
        format!("advisorData_{}", advisor_id)
    }

    pub fn eligibility_results(student_id: i64) -> String {
        format!("eligibilityResults_{}", student_id)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    stored_at: DateTime<Utc>,
    value: serde_json::Value,
}

/// 具有固定存活時間的回應快取
///
/// 讀寫失敗只記錄警告，不影響呼叫端；過期的項目視同不存在。
#[derive(Clone)]
pub struct ResponseCache {
    storage: Arc<dyn Storage>,
    ttl: Duration,
    enabled: bool,
}

impl ResponseCache {
    pub fn new(storage: Arc<dyn Storage>, ttl: Duration) -> Self {
        Self {
            storage,
            ttl,
            enabled: true,
        }
    }

    pub fn disabled(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            ttl: Duration::ZERO,
            enabled: false,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn file_name(key: &str) -> String {
        format!("{}.json", key)
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if !self.enabled || validate_cache_key(key).is_err() {
            return None;
        }

        let bytes = match self.storage.read_file(&Self::file_name(key)).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("⚠️ Failed to read cache entry '{}': {}", key, e);
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("⚠️ Discarding corrupt cache entry '{}': {}", key, e);
                self.invalidate(key).await;
                return None;
            }
        };

        let age = Utc::now().signed_duration_since(entry.stored_at);
        let expired = age
            .to_std()
            .map(|age| age >= self.ttl)
            .unwrap_or(false);
        if expired {
            tracing::debug!("⌛ Cache entry '{}' expired", key);
            self.invalidate(key).await;
            return None;
        }

        match serde_json::from_value(entry.value) {
            Ok(value) => {
                tracing::debug!("💾 Cache hit: {}", key);
                Some(value)
            }
            Err(e) => {
                tracing::warn!("⚠️ Cache entry '{}' has an unexpected shape: {}", key, e);
                None
            }
        }
    }

    pub async fn put<T: Serialize>(&self, key: &str, value: &T) {
        if !self.enabled {
            return;
        }
        if let Err(e) = self.try_put(key, value).await {
            tracing::warn!("⚠️ Failed to write cache entry '{}': {}", key, e);
        }
    }

    async fn try_put<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        validate_cache_key(key)?;
        let entry = CacheEntry {
            stored_at: Utc::now(),
            value: serde_json::to_value(value)?,
        };
        let bytes = serde_json::to_vec(&entry)?;
        self.storage.write_file(&Self::file_name(key), &bytes).await
    }

    pub async fn invalidate(&self, key: &str) {
        if validate_cache_key(key).is_err() {
            return;
        }
        if let Err(e) = self.storage.remove_file(&Self::file_name(key)).await {
            tracing::warn!("⚠️ Failed to invalidate cache entry '{}': {}", key, e);
        } else {
            tracing::debug!("🧹 Cache invalidated: {}", key);
        }
    }

    /// 有快取就回傳快取，否則呼叫 `fetch` 並寫入快取
    pub async fn get_or_fetch<T, F, Fut>(&self, key: &str, fetch: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(cached) = self.get(key).await {
            return Ok(cached);
        }

        let value = fetch().await?;
        self.put(key, &value).await;
        Ok(value)
    }
}
