#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::domain::ports::ConfigProvider;
use crate::utils::error::{GradError, Result};
use crate::utils::retry::{RateLimitOptions, RetryOptions};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_range,
    validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// 後端來源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiSource {
    Mock,
    Test,
    Development,
    Production,
}

impl ApiSource {
    pub fn default_base_url(self) -> &'static str {
        match self {
            ApiSource::Mock => "http://mock.invalid/api",
            ApiSource::Test => "http://localhost:5278/api",
            ApiSource::Development => "https://grad-dev.example.edu/api",
            ApiSource::Production => "https://grad.example.edu/api",
        }
    }
}

impl FromStr for ApiSource {
    type Err = GradError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(ApiSource::Mock),
            "test" => Ok(ApiSource::Test),
            "development" | "dev" => Ok(ApiSource::Development),
            "production" | "prod" => Ok(ApiSource::Production),
            other => Err(GradError::InvalidConfigValueError {
                field: "api.source".to_string(),
                value: other.to_string(),
                reason: "Expected one of: mock, test, development, production".to_string(),
            }),
        }
    }
}

impl fmt::Display for ApiSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ApiSource::Mock => "mock",
            ApiSource::Test => "test",
            ApiSource::Development => "development",
            ApiSource::Production => "production",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub source: ApiSource,
    /// 未設定時使用來源的預設網址
    pub base_url: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            source: ApiSource::Mock,
            base_url: None,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub batch_size: usize,
    pub delay_between_batches_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            delay_between_batches_ms: 1000,
            max_retries: 2,
            retry_delay_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_seconds: u64,
    /// 快取目錄；未設定則只保存在記憶體中
    pub directory: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 3600,
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub sample_data: bool,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 100,
            max_delay_ms: 400,
            sample_data: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub retry: RetryConfig,
    pub rate_limit: RateLimitConfig,
    pub cache: CacheConfig,
    pub mock: MockConfig,
}

impl AppConfig {
    /// 以環境變數 `API_SOURCE`、`API_BASE_URL` 覆寫設定
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(source) = env::var("API_SOURCE") {
            self.api.source = source.parse()?;
        }
        if let Ok(base_url) = env::var("API_BASE_URL") {
            if !base_url.trim().is_empty() {
                self.api.base_url = Some(base_url);
            }
        }
        Ok(())
    }

    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    pub fn base_url(&self) -> &str {
        self.api
            .base_url
            .as_deref()
            .unwrap_or_else(|| self.api.source.default_base_url())
    }

    pub fn mock_latency(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.mock.min_delay_ms),
            Duration::from_millis(self.mock.max_delay_ms),
        )
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_seconds)
    }
}

impl ConfigProvider for AppConfig {
    fn api_base_url(&self) -> &str {
        self.base_url()
    }

    fn uses_mock(&self) -> bool {
        self.api.source == ApiSource::Mock
    }

    fn request_timeout_secs(&self) -> u64 {
        self.api.timeout_seconds
    }

    fn retry_options(&self) -> RetryOptions {
        RetryOptions {
            max_retries: self.retry.max_retries,
            retry_delay: Duration::from_millis(self.retry.retry_delay_ms),
        }
    }

    fn rate_limit_options(&self) -> RateLimitOptions {
        RateLimitOptions {
            batch_size: self.rate_limit.batch_size,
            delay_between_batches: Duration::from_millis(self.rate_limit.delay_between_batches_ms),
            max_retries: self.rate_limit.max_retries,
            retry_delay: Duration::from_millis(self.rate_limit.retry_delay_ms),
        }
    }
}

/// 重試與批次間隔的上限（毫秒）
const MAX_DELAY_MS: u64 = 60_000;

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        // mock 模式不會發出任何 HTTP 請求
        if self.api.source != ApiSource::Mock {
            validate_url("api.base_url", self.base_url())?;
        }
        validate_range("api.timeout_seconds", self.api.timeout_seconds, 1, 300)?;
        validate_range("retry.max_retries", self.retry.max_retries, 0, 10)?;
        validate_range("retry.retry_delay_ms", self.retry.retry_delay_ms, 0, MAX_DELAY_MS)?;
        validate_positive_number("rate_limit.batch_size", self.rate_limit.batch_size, 1)?;
        validate_range("rate_limit.max_retries", self.rate_limit.max_retries, 0, 10)?;
        validate_range(
            "rate_limit.retry_delay_ms",
            self.rate_limit.retry_delay_ms,
            0,
            MAX_DELAY_MS,
        )?;
        validate_range(
            "rate_limit.delay_between_batches_ms",
            self.rate_limit.delay_between_batches_ms,
            0,
            MAX_DELAY_MS,
        )?;

        if let Some(directory) = &self.cache.directory {
            validate_non_empty_string("cache.directory", directory)?;
            validate_path("cache.directory", directory)?;
        }

        if self.mock.min_delay_ms > self.mock.max_delay_ms {
            return Err(GradError::ConfigValidationError {
                field: "mock.min_delay_ms".to_string(),
                message: "min_delay_ms must not exceed max_delay_ms".to_string(),
            });
        }

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }
}
