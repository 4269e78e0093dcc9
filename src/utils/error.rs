use axum::http::StatusCode;
use thiserror::Error;

pub const MISSING_IMAGES_MESSAGE: &str = "Both human and garment images are required";

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("{message}")]
    ValidationError { message: String },

    #[error("{message}")]
    UploadError { message: String },

    #[error("Failed to connect to inference backend: {message}")]
    BackendUnavailable {
        message: String,
        #[source]
        source: Option<Box<RelayError>>,
    },

    #[error("Request timeout")]
    TimeoutError,

    #[error("Invalid response from inference backend")]
    InvalidResponse,

    #[error("{message}")]
    UpstreamError { message: String },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}': {value} ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

impl RelayError {
    pub fn validation(message: impl Into<String>) -> Self {
        RelayError::ValidationError {
            message: message.into(),
        }
    }

    pub fn upload(message: impl Into<String>) -> Self {
        RelayError::UploadError {
            message: message.into(),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        RelayError::UpstreamError {
            message: message.into(),
        }
    }

    pub fn unavailable(cause: RelayError) -> Self {
        RelayError::BackendUnavailable {
            message: cause.to_string(),
            source: Some(Box::new(cause)),
        }
    }

    /// 回應中的 `errorType` 名稱
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::ValidationError { .. } | RelayError::UploadError { .. } => {
                "ValidationError"
            }
            RelayError::BackendUnavailable { .. } => "BackendUnavailable",
            RelayError::TimeoutError => "TimeoutError",
            RelayError::InvalidResponse => "InvalidResponse",
            RelayError::ConfigError { .. } | RelayError::InvalidConfigValueError { .. } => {
                "ConfigError"
            }
            _ => "UpstreamError",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::ValidationError { .. } | RelayError::UploadError { .. } => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the failure means the backend session should be dropped.
    ///
    /// Transport-level errors are classified by type. Free-text upstream
    /// messages fall back to matching "connection" / "network".
    pub fn is_connectivity(&self) -> bool {
        match self {
            RelayError::BackendUnavailable { .. } => true,
            RelayError::HttpError(e) => {
                e.is_connect() || e.is_timeout() || mentions_connectivity(&e.to_string())
            }
            RelayError::UpstreamError { message } => mentions_connectivity(message),
            _ => false,
        }
    }

    /// 完整的錯誤鏈，僅在開發模式下回傳給呼叫端
    pub fn details(&self) -> String {
        let mut out = format!("{}: {}", self.kind(), self);
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            let text = cause.to_string();
            // 訊息中已包含的原因不再重複列出
            if !out.contains(&text) {
                out.push_str("\n    caused by: ");
                out.push_str(&text);
            }
            source = cause.source();
        }
        out
    }
}

fn mentions_connectivity(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("connection") || lower.contains("network")
}

pub type Result<T> = std::result::Result<T, RelayError>;
