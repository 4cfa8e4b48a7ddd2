pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(test)]
mod testing;

#[cfg(feature = "cli")]
pub use config::cli::{CliConfig, Command};

pub use adapters::{HttpApi, LocalStorage, MemoryStorage, MockApi};
pub use config::{ApiSource, AppConfig};
pub use core::GradClient;
pub use domain::status::{map_status, GraduationProgress, GraduationStatus, StepStatus};
pub use utils::error::{GradError, Result};
pub use utils::retry::{execute_with_rate_limit, execute_with_retry, RateLimitOptions, RetryOptions};
