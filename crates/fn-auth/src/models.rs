use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Maximum number of body characters kept when an error payload is not JSON
const MAX_ERROR_BODY_CHARS: usize = 200;

/// OAuth grant types accepted by the account service token endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrantType {
    ClientCredentials,
    ExchangeCode,
    RefreshToken,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientCredentials => "client_credentials",
            Self::ExchangeCode => "exchange_code",
            Self::RefreshToken => "refresh_token",
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token endpoint response (shared by every grant type)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime of the access token in seconds
    pub expires_in: u64,
    #[serde(default)]
    pub expires_at: Option<String>,
    pub token_type: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub refresh_expires: Option<u64>,
    #[serde(default)]
    pub refresh_expires_at: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub internal_client: Option<bool>,
    #[serde(default)]
    pub client_service: Option<String>,
    #[serde(default, rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub app: Option<String>,
    #[serde(default)]
    pub in_app_id: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
}

/// Error payload returned by the platform services
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlatformError {
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub message_vars: Vec<String>,
    #[serde(default)]
    pub numeric_error_code: Option<i64>,
    #[serde(default)]
    pub originating_service: Option<String>,
    #[serde(default)]
    pub intent: Option<String>,
}

impl PlatformError {
    /// Parse an error body, keeping a snippet of the raw text when it is not a platform payload
    pub fn parse(body: &str) -> Self {
        match serde_json::from_str::<PlatformError>(body) {
            Ok(error) if error.error_message.is_some() || error.error_code.is_some() => error,
            _ => Self {
                error_message: Some(body.chars().take(MAX_ERROR_BODY_CHARS).collect()),
                ..Self::default()
            },
        }
    }

    pub fn message(&self) -> &str {
        self.error_message
            .as_deref()
            .or(self.error_code.as_deref())
            .unwrap_or("unknown error")
    }
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_code {
            Some(code) => write!(f, "{} ({})", self.message(), code),
            None => f.write_str(self.message()),
        }
    }
}

/// Response of the CSRF endpoint; only its headers matter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsrfResponse {
    pub headers: HashMap<String, Vec<String>>,
}

impl CsrfResponse {
    /// All values of a header, matched case-insensitively
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a String> + 'a {
        self.headers
            .iter()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
            .flat_map(|(_, values)| values.iter())
    }

    /// Value of the `XSRF-TOKEN` cookie from the `Set-Cookie` headers
    pub fn xsrf_token(&self) -> Option<String> {
        self.header_values("set-cookie").find_map(|cookie| {
            cookie
                .strip_prefix("XSRF-TOKEN=")
                .map(|rest| rest.split(';').next().unwrap_or_default().to_string())
        })
    }
}

/// Form posted to the interactive login endpoint
#[derive(Clone, PartialEq, Eq, Serialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub remember_me: bool,
}

impl fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginForm")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("remember_me", &self.remember_me)
            .finish()
    }
}

/// Exchange endpoint response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExchangeCode {
    pub code: String,
}
