//! 對 CORS／網路類失敗的重試與分批限流
//!
//! 只有被 [`TransientError`] 判定為暫時性的錯誤才會重試，
//! 應用層錯誤（驗證失敗、權限不足等）一律直接回傳。

use crate::utils::error::TransientError;
use futures::future::join_all;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryOptions {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryOptions {
    /// 第 `attempt` 次呼叫（從 1 起算）之前要等待的時間
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(attempt.saturating_sub(1))
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitOptions {
    pub batch_size: usize,
    pub delay_between_batches: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for RateLimitOptions {
    fn default() -> Self {
        Self {
            batch_size: 5,
            delay_between_batches: Duration::from_millis(1000),
            max_retries: 2,
            retry_delay: Duration::from_millis(2000),
        }
    }
}

/// 單一項目的執行結果，保留原始輸入
#[derive(Debug)]
pub struct BatchOutcome<I, T, E> {
    pub item: I,
    pub result: Result<T, E>,
}

impl<I, T, E> BatchOutcome<I, T, E> {
    pub fn success(&self) -> bool {
        self.result.is_ok()
    }
}

/// 執行 `op`，遇到暫時性錯誤時以線性遞增的延遲重試
pub async fn execute_with_retry<T, E, F, Fut>(mut op: F, options: &RetryOptions) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: TransientError + Display,
{
    let total_attempts = options.max_retries + 1;
    let mut attempt = 1;

    loop {
        let delay = options.delay_before(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!("✅ Request succeeded on attempt {}", attempt);
                }
                return Ok(value);
            }
            Err(e) if !e.is_transient() => {
                tracing::debug!("Error is not retryable: {}", e);
                return Err(e);
            }
            Err(e) if attempt >= total_attempts => {
                tracing::warn!(
                    "❌ All {} attempts failed, giving up: {}",
                    total_attempts,
                    e
                );
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(
                    "🔄 Attempt {}/{} failed with a network error: {}. Retrying in {:?}",
                    attempt,
                    total_attempts,
                    e,
                    options.delay_before(attempt + 1)
                );
                attempt += 1;
            }
        }
    }
}

/// 分批並行執行 `op`，並針對暫時性失敗的項目以減半的批次大小重試
///
/// 回傳的結果數量與順序和 `items` 一致，單一項目失敗不會使整體失敗。
pub async fn execute_with_rate_limit<I, T, E, F, Fut>(
    items: Vec<I>,
    op: F,
    options: &RateLimitOptions,
) -> Vec<BatchOutcome<I, T, E>>
where
    I: Clone,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: TransientError + Display,
{
    let mut results: Vec<Option<Result<T, E>>> = items.iter().map(|_| None).collect();
    let mut pending: Vec<usize> = (0..items.len()).collect();
    let mut batch_size = options.batch_size.max(1);
    let mut round = 0;

    loop {
        tracing::debug!(
            "📦 Round {}: {} items in batches of {}",
            round,
            pending.len(),
            batch_size
        );

        for (batch_index, batch) in pending.chunks(batch_size).enumerate() {
            if batch_index > 0 && !options.delay_between_batches.is_zero() {
                tokio::time::sleep(options.delay_between_batches).await;
            }

            let calls = batch.iter().map(|&index| {
                let call = op(items[index].clone());
                async move { (index, call.await) }
            });

            for (index, result) in join_all(calls).await {
                results[index] = Some(result);
            }
        }

        let retryable: Vec<usize> = pending
            .iter()
            .copied()
            .filter(|&index| matches!(&results[index], Some(Err(e)) if e.is_transient()))
            .collect();

        if retryable.is_empty() {
            break;
        }
        if round >= options.max_retries {
            tracing::warn!(
                "⚠️ {} items still failing after {} retry rounds",
                retryable.len(),
                options.max_retries
            );
            break;
        }

        round += 1;
        batch_size = (batch_size / 2).max(1);
        let delay = options.retry_delay.saturating_mul(round);
        tracing::info!(
            "🔄 Retrying {} items with network errors in {:?}",
            retryable.len(),
            delay
        );
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        pending = retryable;
    }

    items
        .into_iter()
        .zip(results)
        .filter_map(|(item, result)| result.map(|result| BatchOutcome { item, result }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::GradError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    fn cors_error() -> GradError {
        GradError::Network {
            message: "Failed to fetch".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhausts_on_cors_errors_with_linear_backoff() {
        let options = RetryOptions {
            max_retries: 3,
            retry_delay: Duration::from_millis(100),
        };
        let start = Instant::now();
        let calls = Arc::new(Mutex::new(Vec::new()));

        let result: Result<(), GradError> = execute_with_retry(
            || {
                let calls = calls.clone();
                async move {
                    calls.lock().unwrap().push(start.elapsed());
                    Err(cors_error())
                }
            },
            &options,
        )
        .await;

        assert!(result.is_err());
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 4);
        // 每次呼叫前的延遲為 0, 100, 200, 300 ms
        let gaps: Vec<Duration> = calls.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(
            gaps,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(300)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_stops_after_one_attempt_for_application_errors() {
        let counter = AtomicU32::new(0);
        let result: Result<(), GradError> = execute_with_retry(
            || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(GradError::service(422, "GPA below threshold")) }
            },
            &RetryOptions::default(),
        )
        .await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(GradError::Service { status: 422, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_after_transient_failure() {
        let counter = AtomicU32::new(0);
        let result = execute_with_retry(
            || {
                let count = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if count == 0 {
                        Err(cors_error())
                    } else {
                        Ok(count)
                    }
                }
            },
            &RetryOptions::default(),
        )
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_runs_sequential_batches() {
        let options = RateLimitOptions {
            batch_size: 3,
            delay_between_batches: Duration::from_millis(500),
            max_retries: 2,
            retry_delay: Duration::from_millis(10),
        };
        let start = Instant::now();
        let started_at = Arc::new(Mutex::new(Vec::new()));

        let items: Vec<u32> = (1..=8).collect();
        let outcomes = execute_with_rate_limit(
            items.clone(),
            |item| {
                let started_at = started_at.clone();
                async move {
                    started_at.lock().unwrap().push(start.elapsed());
                    if item % 4 == 0 {
                        Err(GradError::service(400, "rejected"))
                    } else {
                        Ok(item * 10)
                    }
                }
            },
            &options,
        )
        .await;

        assert_eq!(outcomes.len(), 8);
        let returned: Vec<u32> = outcomes.iter().map(|o| o.item).collect();
        assert_eq!(returned, items);
        assert_eq!(outcomes.iter().filter(|o| o.success()).count(), 6);
        assert!(!outcomes[3].success());

        // ceil(8 / 3) = 3 個批次，各自在不同時間點開始
        let mut groups: Vec<Duration> = started_at.lock().unwrap().clone();
        groups.dedup();
        assert_eq!(
            groups,
            vec![
                Duration::ZERO,
                Duration::from_millis(500),
                Duration::from_millis(1000)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_retries_only_cors_failures() {
        let options = RateLimitOptions {
            batch_size: 4,
            delay_between_batches: Duration::ZERO,
            max_retries: 2,
            retry_delay: Duration::from_millis(50),
        };
        let attempts = Arc::new(Mutex::new(std::collections::HashMap::<u32, u32>::new()));

        let outcomes = execute_with_rate_limit(
            vec![1u32, 2, 3, 4],
            |item| {
                let attempts = attempts.clone();
                async move {
                    let count = {
                        let mut map = attempts.lock().unwrap();
                        let entry = map.entry(item).or_insert(0);
                        *entry += 1;
                        *entry
                    };
                    match item {
                        // 第一次 CORS 失敗，第二次成功
                        1 if count == 1 => Err(cors_error()),
                        // 永遠 CORS 失敗
                        2 => Err(cors_error()),
                        // 應用錯誤不重試
                        3 => Err(GradError::service(404, "missing")),
                        _ => Ok(item),
                    }
                }
            },
            &options,
        )
        .await;

        let attempts = attempts.lock().unwrap();
        assert_eq!(attempts[&1], 2);
        assert_eq!(attempts[&2], 3);
        assert_eq!(attempts[&3], 1);
        assert_eq!(attempts[&4], 1);

        assert!(outcomes[0].success());
        assert!(!outcomes[1].success());
        assert!(!outcomes[2].success());
        assert!(outcomes[3].success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_halves_batch_size_on_retry() {
        let options = RateLimitOptions {
            batch_size: 4,
            delay_between_batches: Duration::from_millis(100),
            max_retries: 1,
            retry_delay: Duration::from_millis(10),
        };
        let start = Instant::now();
        let calls = Arc::new(Mutex::new(Vec::new()));

        let outcomes = execute_with_rate_limit(
            vec![1u32, 2, 3, 4],
            |item| {
                let calls = calls.clone();
                async move {
                    let first_try = {
                        let mut calls = calls.lock().unwrap();
                        let first_try = !calls.iter().any(|(seen, _)| *seen == item);
                        calls.push((item, start.elapsed()));
                        first_try
                    };
                    if first_try {
                        Err(cors_error())
                    } else {
                        Ok(item)
                    }
                }
            },
            &options,
        )
        .await;

        assert!(outcomes.iter().all(|o| o.success()));
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 8);
        // 第一輪四個一批；重試輪改為兩個一批，批次之間仍等待 delay_between_batches
        assert!(calls[..4].iter().all(|(_, at)| *at == Duration::ZERO));
        assert_eq!(
            calls[4..].to_vec(),
            vec![
                (1, Duration::from_millis(10)),
                (2, Duration::from_millis(10)),
                (3, Duration::from_millis(110)),
                (4, Duration::from_millis(110)),
            ]
        );
    }

    #[test]
    fn test_delays_saturate_instead_of_overflowing() {
        let options = RetryOptions {
            max_retries: 3,
            retry_delay: Duration::MAX,
        };
        assert_eq!(options.delay_before(1), Duration::ZERO);
        assert_eq!(options.delay_before(3), Duration::MAX);
    }

    #[tokio::test]
    async fn test_rate_limit_with_no_items() {
        let outcomes: Vec<BatchOutcome<u32, u32, GradError>> =
            execute_with_rate_limit(Vec::new(), |item| async move { Ok(item) }, &RateLimitOptions::default())
                .await;
        assert!(outcomes.is_empty());
    }
}
