use reqwest::StatusCode;
use thiserror::Error;

use crate::models::PlatformError;

/// Authentication and session error types
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Platform error {status}: {error}")]
    Platform {
        status: StatusCode,
        error: PlatformError,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("captcha verdict not allowed")]
    CaptchaNotAllowed,

    #[error("failed to obtain xsrf token")]
    MissingXsrfToken,

    #[error("Login rejected with status {status}: {message}")]
    LoginRejected { status: StatusCode, message: String },

    #[error("Api is not logged in")]
    NotLoggedIn,

    #[error("Api is already logged in - credentials can only be changed before login")]
    AlreadyLoggedIn,

    #[error("Logging in as user requires email and password")]
    MissingCredentials,

    #[error("JSON serialization/deserialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Token store is locked by another process")]
    LockTimeout,

    #[error("Invalid account key {0:?}: only ASCII letters, digits, '-' and '_' are allowed")]
    InvalidAccountKey(String),

    #[error("No session storage directory available on this platform")]
    StorageDirUnavailable,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl AuthError {
    /// Build a platform error from a non-success status and its raw body
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        Self::Platform {
            status,
            error: PlatformError::parse(body),
        }
    }

    /// Status code of a platform rejection, if this is one
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Platform { status, .. } | Self::LoginRejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Human readable message from the platform payload, falling back to the error itself
    pub fn platform_message(&self) -> String {
        match self {
            Self::Platform { error, .. } => error.message().to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
