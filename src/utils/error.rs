use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Upstream request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required setting: {field}")]
    MissingConfigError { field: String },

    #[error("Proxy target rejected ({url}): {reason}")]
    TargetRejected { url: String, reason: String },

    #[error("Upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Multipart error: {message}")]
    MultipartError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

pub type Result<T> = std::result::Result<T, DashboardError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Upstream,
    Configuration,
    Input,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl DashboardError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            DashboardError::HttpError(_) => ErrorCategory::Network,
            DashboardError::Upstream { .. } => ErrorCategory::Upstream,
            DashboardError::ConfigError { .. }
            | DashboardError::ConfigValidationError { .. }
            | DashboardError::InvalidConfigValueError { .. }
            | DashboardError::MissingConfigError { .. } => ErrorCategory::Configuration,
            DashboardError::UrlError(_)
            | DashboardError::TargetRejected { .. }
            | DashboardError::MultipartError { .. }
            | DashboardError::ValidationError { .. } => ErrorCategory::Input,
            DashboardError::IoError(_) | DashboardError::SerializationError(_) => {
                ErrorCategory::Internal
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            DashboardError::Upstream { status, .. } if *status < 500 => ErrorSeverity::Low,
            DashboardError::Upstream { .. } | DashboardError::HttpError(_) => ErrorSeverity::Medium,
            DashboardError::UrlError(_)
            | DashboardError::TargetRejected { .. }
            | DashboardError::MultipartError { .. }
            | DashboardError::ValidationError { .. } => ErrorSeverity::High,
            DashboardError::ConfigError { .. }
            | DashboardError::ConfigValidationError { .. }
            | DashboardError::InvalidConfigValueError { .. }
            | DashboardError::MissingConfigError { .. }
            | DashboardError::IoError(_)
            | DashboardError::SerializationError(_) => ErrorSeverity::Critical,
        }
    }

    /// 是否為上游逾時
    pub fn is_timeout(&self) -> bool {
        matches!(self, DashboardError::HttpError(e) if e.is_timeout())
    }

    /// 對應到 proxy route 回傳給呼叫端的 HTTP 狀態碼
    pub fn status_code(&self) -> u16 {
        if self.is_timeout() {
            return 504;
        }
        match self {
            DashboardError::HttpError(_) => 502,
            DashboardError::Upstream { status, .. } => *status,
            DashboardError::UrlError(_)
            | DashboardError::TargetRejected { .. }
            | DashboardError::MultipartError { .. }
            | DashboardError::ValidationError { .. }
            | DashboardError::SerializationError(_) => 400,
            _ => 500,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => {
                "Check that the upstream API is reachable and the timeout is large enough"
            }
            ErrorCategory::Upstream => "Inspect the upstream response message and retry the request",
            ErrorCategory::Configuration => "Review the configuration file and command-line flags",
            ErrorCategory::Input => "Correct the request target, method or payload and try again",
            ErrorCategory::Internal => "Re-run with --verbose and report the log output",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        if self.is_timeout() {
            return "The backend API did not answer in time".to_string();
        }
        match self {
            DashboardError::HttpError(_) => "Could not reach the backend API".to_string(),
            DashboardError::Upstream { status, message } => {
                format!("The backend rejected the request ({}): {}", status, message)
            }
            DashboardError::TargetRejected { url, .. } => {
                format!("Requests to {} are not allowed through this dashboard", url)
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_error_keeps_status() {
        let err = DashboardError::Upstream {
            status: 404,
            message: "Blog not found".to_string(),
        };
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.category(), ErrorCategory::Upstream);
        assert_eq!(err.severity(), ErrorSeverity::Low);
        assert!(err.user_friendly_message().contains("Blog not found"));
    }

    #[test]
    fn test_input_errors_map_to_bad_request() {
        let err = DashboardError::TargetRejected {
            url: "http://evil.test/".to_string(),
            reason: "origin not allowed".to_string(),
        };
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.category(), ErrorCategory::Input);
    }

    #[test]
    fn test_config_errors_are_critical() {
        let err = DashboardError::MissingConfigError {
            field: "upstream.origin".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.status_code(), 500);
    }
}
