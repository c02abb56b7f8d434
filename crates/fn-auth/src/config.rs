use std::fmt;
use std::time::Duration;

use base64::Engine;
use url::Url;

use crate::errors::Result;

/// Production hosts and paths of the authentication endpoints
pub mod endpoints {
    pub const ACCOUNT_PUBLIC_BASE: &str = "https://account-public-service-prod03.ol.epicgames.com/";
    pub const EPIC_GAMES_BASE: &str = "https://www.epicgames.com/";

    pub const OAUTH_TOKEN: &str = "account/api/oauth/token";
    pub const REPUTATION: &str = "id/api/reputation";
    pub const CSRF: &str = "id/api/csrf";
    pub const LOGIN: &str = "id/api/login";
    pub const EXCHANGE: &str = "id/api/exchange";
}

/// Official launcher client credentials
pub mod launcher {
    pub const CLIENT_ID: &str = "3446cd72694c4a4485d81b77adbb2141";
    /// base64 of `CLIENT_ID:secret`
    pub const CLIENT_TOKEN: &str =
        "MzQ0NmNkNzI2OTRjNGE0NDg1ZDgxYjc3YWRiYjIxNDE6OTIwOWQ0YTVlMjVhNDU3ZmI5YjA3NDg5ZDMxM2I0MWE=";
}

/// Token type requested when exchanging an exchange code
pub const EXCHANGE_TOKEN_TYPE: &str = "eg1";

/// Upper bound on interactive login attempts (CAPTCHA and credential submission retries)
pub const MAX_LOGIN_ATTEMPTS: u32 = 10;

/// Static application identity sent as `basic` authorization on grant requests
#[derive(Clone, PartialEq, Eq)]
pub struct ClientToken(String);

impl ClientToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Encode `client_id:client_secret` the way the token endpoint expects
    pub fn from_parts(client_id: &str, client_secret: &str) -> Self {
        let raw = format!("{}:{}", client_id, client_secret);
        Self(base64::engine::general_purpose::STANDARD.encode(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn basic_authorization(&self) -> String {
        format!("basic {}", self.0)
    }
}

impl Default for ClientToken {
    fn default() -> Self {
        Self::new(launcher::CLIENT_TOKEN)
    }
}

impl fmt::Debug for ClientToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ClientToken(<redacted>)")
    }
}

/// Base URLs the HTTP transport talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub account_public: Url,
    pub epic_games: Url,
}

impl Endpoints {
    /// Route every endpoint to one host (used against local mock servers)
    pub fn single_host(base: &str) -> Result<Self> {
        let base = with_trailing_slash(base)?;
        Ok(Self {
            account_public: base.clone(),
            epic_games: base,
        })
    }

    pub fn token_url(&self) -> Result<Url> {
        Ok(self.account_public.join(endpoints::OAUTH_TOKEN)?)
    }

    pub fn reputation_url(&self) -> Result<Url> {
        Ok(self.epic_games.join(endpoints::REPUTATION)?)
    }

    pub fn csrf_url(&self) -> Result<Url> {
        Ok(self.epic_games.join(endpoints::CSRF)?)
    }

    pub fn login_url(&self) -> Result<Url> {
        Ok(self.epic_games.join(endpoints::LOGIN)?)
    }

    pub fn exchange_url(&self) -> Result<Url> {
        Ok(self.epic_games.join(endpoints::EXCHANGE)?)
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            account_public: Url::parse(endpoints::ACCOUNT_PUBLIC_BASE).expect("valid account URL"),
            epic_games: Url::parse(endpoints::EPIC_GAMES_BASE).expect("valid epic games URL"),
        }
    }
}

fn with_trailing_slash(base: &str) -> Result<Url> {
    if base.ends_with('/') {
        Ok(Url::parse(base)?)
    } else {
        Ok(Url::parse(&format!("{}/", base))?)
    }
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpTimeouts {
    pub connect: Duration,
    pub request: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(15),
            request: Duration::from_secs(30),
        }
    }
}

/// Configuration for the HTTP transport
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub endpoints: Endpoints,

    /// HTTP client timeouts
    pub http_timeouts: HttpTimeouts,

    /// Custom user agent (optional)
    pub user_agent: Option<String>,

    /// Value of `Accept-Language` on service calls
    pub language: String,
}

impl AuthConfig {
    /// Config pointing every endpoint at one base URL
    pub fn with_base_url(base: &str) -> Result<Self> {
        Ok(Self {
            endpoints: Endpoints::single_host(base)?,
            ..Self::default()
        })
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            http_timeouts: HttpTimeouts::default(),
            user_agent: Some("fnapi".to_string()),
            language: "en".to_string(),
        }
    }
}
