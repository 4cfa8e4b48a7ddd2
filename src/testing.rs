use crate::adapters::{MemoryStorage, MockApi};
use crate::core::cache::{ResponseCache, DEFAULT_TTL};
use crate::core::{GradClient, SessionStore};
use crate::utils::retry::RateLimitOptions;
use std::sync::Arc;
use std::time::Duration;

pub(crate) fn quick_rate_limit() -> RateLimitOptions {
    RateLimitOptions {
        batch_size: 2,
        delay_between_batches: Duration::ZERO,
        max_retries: 2,
        retry_delay: Duration::ZERO,
    }
}

/// 無延遲的 mock 後端加上記憶體快取
pub(crate) async fn client_with_sample_data() -> (GradClient, MockApi) {
    let api = MockApi::new().with_sample_data().await;
    let cache = ResponseCache::new(Arc::new(MemoryStorage::new()), DEFAULT_TTL);
    let client = GradClient::new(Arc::new(api.clone()), SessionStore::new(), cache)
        .with_rate_limit(quick_rate_limit());
    (client, api)
}

pub(crate) async fn login(client: &GradClient, email: &str) {
    client.login(email, "password").await.unwrap();
}
