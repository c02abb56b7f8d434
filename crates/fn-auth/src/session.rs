use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{AuthError, Result};
use crate::models::TokenResponse;

/// Account key used when persisting a session that carries no account
pub const CLIENT_ACCOUNT_KEY: &str = "client";

/// Authenticated state installed after a successful grant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub token_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    pub expires_at_millis: i64,
    pub created_at_millis: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_expires_at_millis: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Session {
    /// Build a session from a token response received at `now_millis`
    pub fn from_token_response(response: TokenResponse, now_millis: i64) -> Result<Self> {
        if response.access_token.trim().is_empty() {
            return Err(AuthError::InvalidResponse(
                "Token response carries an empty access token".to_string(),
            ));
        }
        if response.expires_in == 0 {
            return Err(AuthError::InvalidResponse(
                "Token response expires immediately".to_string(),
            ));
        }

        let expires_in_millis = i64::try_from(response.expires_in)
            .ok()
            .and_then(|secs| secs.checked_mul(1000))
            .ok_or_else(|| AuthError::InvalidResponse("expires_in out of range".to_string()))?;

        Ok(Self {
            access_token: response.access_token,
            token_type: response.token_type,
            refresh_token: response.refresh_token,
            account_id: response.account_id,
            expires_at_millis: now_millis.saturating_add(expires_in_millis),
            created_at_millis: now_millis,
            refresh_expires_at_millis: response
                .refresh_expires
                .and_then(|secs| i64::try_from(secs).ok())
                .map(|secs| now_millis.saturating_add(secs.saturating_mul(1000))),
            client_id: response.client_id,
            display_name: response.display_name,
        })
    }

    /// Expiry as a calendar time, for display
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.expires_at_millis)
    }

    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        now_millis >= self.expires_at_millis
    }

    /// Value for the `Authorization` header of service calls
    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }

    /// Key used to persist this session
    pub fn account_key(&self) -> &str {
        self.account_id.as_deref().unwrap_or(CLIENT_ACCOUNT_KEY)
    }
}

/// Lifecycle of the session owned by the manager
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    LoggedOut,
    LoggedIn(Session),
}

impl SessionState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::LoggedOut => None,
            Self::LoggedIn(session) => Some(session),
        }
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(self, Self::LoggedIn(_))
    }
}
