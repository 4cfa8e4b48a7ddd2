use thiserror::Error;

#[derive(Error, Debug)]
pub enum GradError {
    #[error("API request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// 後端回應非 2xx 或無法解析
    #[error("Service error ({status}): {message}")]
    Service {
        message: String,
        status: u16,
        body: Option<serde_json::Value>,
    },

    /// 傳輸層失敗（未取得任何回應）
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Not logged in: {message}")]
    Unauthorized { message: String },

    #[error("Role '{role}' is not allowed to {action}")]
    Forbidden { role: String, action: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: String },

    #[error("Action '{action}' is not allowed while status is {status}")]
    InvalidTransition { action: String, status: i32 },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

pub type Result<T> = std::result::Result<T, GradError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Backend,
    Configuration,
    Access,
    Workflow,
    Data,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// CLI 的退出碼
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

/// 判斷錯誤是否屬於可重試的 CORS／網路類失敗
pub trait TransientError {
    fn is_transient(&self) -> bool;
}

const CORS_MARKERS: [&str; 3] = ["cors", "cross-origin", "failed to fetch"];

/// 依錯誤訊息判斷是否像是跨域或連線失敗
pub fn looks_like_cors_failure(message: &str) -> bool {
    let lower = message.to_lowercase();
    CORS_MARKERS.iter().any(|marker| lower.contains(marker))
}

impl TransientError for GradError {
    fn is_transient(&self) -> bool {
        match self {
            GradError::Http(e) => {
                e.is_connect() || e.is_timeout() || looks_like_cors_failure(&e.to_string())
            }
            GradError::Network { message } => {
                message.to_lowercase().contains("fetch") || looks_like_cors_failure(message)
            }
            GradError::Service { message, .. } => looks_like_cors_failure(message),
            _ => false,
        }
    }
}

impl GradError {
    pub fn service(status: u16, message: impl Into<String>) -> Self {
        GradError::Service {
            message: message.into(),
            status,
            body: None,
        }
    }

    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        GradError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// HTTP 狀態碼（僅後端錯誤才有）
    pub fn status(&self) -> Option<u16> {
        match self {
            GradError::Service { status, .. } => Some(*status),
            GradError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            GradError::Http(_) | GradError::Network { .. } => ErrorCategory::Network,
            GradError::Service { .. } | GradError::NotFound { .. } => ErrorCategory::Backend,
            GradError::ConfigError { .. }
            | GradError::ConfigValidationError { .. }
            | GradError::InvalidConfigValueError { .. }
            | GradError::MissingConfigError { .. } => ErrorCategory::Configuration,
            GradError::Unauthorized { .. } | GradError::Forbidden { .. } => ErrorCategory::Access,
            GradError::InvalidTransition { .. } => ErrorCategory::Workflow,
            GradError::Serialization(_) | GradError::ValidationError { .. } => ErrorCategory::Data,
            GradError::Io(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Backend => match self.status() {
                Some(status) if status >= 500 => ErrorSeverity::Medium,
                _ => ErrorSeverity::High,
            },
            ErrorCategory::Access | ErrorCategory::Workflow | ErrorCategory::Data => {
                ErrorSeverity::High
            }
            ErrorCategory::Configuration | ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            GradError::Http(_) | GradError::Network { .. } => {
                "Could not reach the graduation service".to_string()
            }
            GradError::Service { status: 401, .. } => "Your credentials were rejected".to_string(),
            GradError::Service { message, .. } => format!("The server refused the request: {}", message),
            GradError::Unauthorized { .. } => "Please log in first".to_string(),
            GradError::Forbidden { action, .. } => format!("You are not allowed to {}", action),
            GradError::NotFound { entity, id } => format!("{} {} does not exist", entity, id),
            GradError::InvalidTransition { action, .. } => {
                format!("'{}' cannot be applied at the current graduation stage", action)
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check the API base URL and your connection, then try again",
            ErrorCategory::Backend => "Verify the request data or contact the registrar's office",
            ErrorCategory::Configuration => "Fix the configuration file or environment variables",
            ErrorCategory::Access => "Log in with an account that has the required role",
            ErrorCategory::Workflow => "Refresh the graduation status before acting",
            ErrorCategory::Data => "Check the input file format",
            ErrorCategory::System => "Check file permissions and available disk space",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_markers_are_case_insensitive() {
        assert!(looks_like_cors_failure("Blocked by CORS policy"));
        assert!(looks_like_cors_failure("Cross-Origin Request Blocked"));
        assert!(looks_like_cors_failure("TypeError: Failed to fetch"));
        assert!(!looks_like_cors_failure("Student not found"));
    }

    #[test]
    fn test_network_error_mentioning_fetch_is_transient() {
        let err = GradError::Network {
            message: "fetch aborted".to_string(),
        };
        assert!(err.is_transient());

        let err = GradError::Network {
            message: "socket closed".to_string(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn test_application_errors_are_not_transient() {
        assert!(!GradError::service(400, "GPA below threshold").is_transient());
        assert!(!GradError::not_found("Student", 7).is_transient());
        assert!(GradError::service(502, "CORS request did not succeed").is_transient());
    }

    #[test]
    fn test_severity_by_category() {
        assert_eq!(GradError::service(503, "down").severity(), ErrorSeverity::Medium);
        assert_eq!(GradError::service(409, "conflict").severity(), ErrorSeverity::High);
        let config = GradError::MissingConfigError {
            field: "api.base_url".to_string(),
        };
        assert_eq!(config.severity(), ErrorSeverity::Critical);
        assert_eq!(config.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn test_every_failure_exits_non_zero() {
        let errors = [
            GradError::Network {
                message: "Failed to fetch".to_string(),
            },
            GradError::service(500, "boom"),
            GradError::not_found("Student", 1),
            GradError::Unauthorized {
                message: "login required".to_string(),
            },
            GradError::InvalidTransition {
                action: "AdvisorApprove".to_string(),
                status: 0,
            },
            GradError::ValidationError {
                message: "bad input".to_string(),
            },
            GradError::MissingConfigError {
                field: "--email".to_string(),
            },
        ];
        for error in &errors {
            assert_ne!(error.severity().exit_code(), 0, "{}", error);
        }
        assert_eq!(GradError::service(503, "down").severity().exit_code(), 2);
        assert_eq!(GradError::not_found("Student", 1).severity().exit_code(), 1);
    }
}
