use std::collections::HashMap;

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, Method, Response, StatusCode};
use tracing::{debug, instrument};
use url::Url;

use crate::config::AuthConfig;
use crate::errors::{AuthError, Result};
use crate::models::{CsrfResponse, ExchangeCode, GrantType, LoginForm, TokenResponse};

/// Header carrying the anti-forgery token on credential submission
pub const XSRF_HEADER: &str = "X-XSRF-TOKEN";

/// An authenticated (or anonymous) call to one of the platform services
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    pub method: Method,
    pub url: Url,
    /// Full `Authorization` header value, e.g. `bearer <token>`
    pub authorization: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl ServiceRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            authorization: None,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn authorization(mut self, authorization: impl Into<String>) -> Self {
        self.authorization = Some(authorization.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Successful service response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ServiceResponse {
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        if self.body.trim().is_empty() {
            // 204 and friends decode as JSON null
            return Ok(serde_json::from_str("null")?);
        }
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Remote calls the session manager relies on.
///
/// Implementations map every non-success status to [`AuthError::Platform`] and every
/// transport fault to [`AuthError::Network`].
#[async_trait::async_trait]
pub trait AuthTransport: Send + Sync {
    /// Exchange a credential for a token at the OAuth token endpoint
    async fn grant_token(
        &self,
        authorization: &str,
        grant_type: GrantType,
        extra_params: &[(&str, &str)],
        remember_device: Option<bool>,
    ) -> Result<TokenResponse>;

    /// Anti-automation reputation check; only the status matters
    async fn captcha_check(&self) -> Result<()>;

    async fn fetch_csrf(&self) -> Result<CsrfResponse>;

    async fn submit_login(&self, form: &LoginForm, xsrf_token: &str) -> Result<()>;

    async fn fetch_exchange_code(&self) -> Result<ExchangeCode>;

    async fn call_service(&self, request: ServiceRequest) -> Result<ServiceResponse>;
}

/// reqwest-backed transport talking to the live platform
#[derive(Debug, Clone)]
pub struct HttpAuthTransport {
    config: AuthConfig,
    http: Client,
}

impl HttpAuthTransport {
    /// Create a new transport; the cookie store keeps the interactive login session
    pub fn new(config: AuthConfig) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        if let Ok(language) = HeaderValue::from_str(&config.language) {
            default_headers.insert(ACCEPT_LANGUAGE, language);
        }

        let http = Client::builder()
            .default_headers(default_headers)
            .connect_timeout(config.http_timeouts.connect)
            .timeout(config.http_timeouts.request)
            .user_agent(config.user_agent.as_deref().unwrap_or("fnapi"))
            .cookie_store(true)
            .build()?;

        Ok(Self { config, http })
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Pass successful responses through, turning the rest into platform errors
    async fn check_response(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await?;
        debug!(status = %status, "Platform rejected request");
        Err(AuthError::from_response(status, &body))
    }

    fn collect_headers(headers: &HeaderMap) -> HashMap<String, Vec<String>> {
        let mut collected: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in headers {
            if let Ok(value) = value.to_str() {
                collected
                    .entry(name.as_str().to_string())
                    .or_default()
                    .push(value.to_string());
            }
        }
        collected
    }
}

#[async_trait::async_trait]
impl AuthTransport for HttpAuthTransport {
    #[instrument(skip(self, authorization, extra_params))]
    async fn grant_token(
        &self,
        authorization: &str,
        grant_type: GrantType,
        extra_params: &[(&str, &str)],
        remember_device: Option<bool>,
    ) -> Result<TokenResponse> {
        let mut form: Vec<(&str, String)> = vec![("grant_type", grant_type.as_str().to_string())];
        form.extend(extra_params.iter().map(|(k, v)| (*k, v.to_string())));
        if let Some(remember) = remember_device {
            form.push(("remember_device", remember.to_string()));
        }

        debug!("Requesting token grant");
        let response = self
            .http
            .post(self.config.endpoints.token_url()?)
            .header(AUTHORIZATION, authorization)
            .header(ACCEPT, "application/json")
            .form(&form)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Ok(response.json().await?)
    }

    #[instrument(skip(self))]
    async fn captcha_check(&self) -> Result<()> {
        debug!("Checking login reputation");
        let response = self
            .http
            .get(self.config.endpoints.reputation_url()?)
            .send()
            .await?;

        Self::check_response(response).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_csrf(&self) -> Result<CsrfResponse> {
        debug!("Fetching CSRF cookie");
        let response = self
            .http
            .get(self.config.endpoints.csrf_url()?)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Ok(CsrfResponse {
            headers: Self::collect_headers(response.headers()),
        })
    }

    #[instrument(skip(self, form, xsrf_token))]
    async fn submit_login(&self, form: &LoginForm, xsrf_token: &str) -> Result<()> {
        debug!("Submitting account credentials");
        let response = self
            .http
            .post(self.config.endpoints.login_url()?)
            .header(XSRF_HEADER, xsrf_token)
            .form(form)
            .send()
            .await?;

        Self::check_response(response).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_exchange_code(&self) -> Result<ExchangeCode> {
        debug!("Fetching exchange code");
        let response = self
            .http
            .get(self.config.endpoints.exchange_url()?)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Ok(response.json().await?)
    }

    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn call_service(&self, request: ServiceRequest) -> Result<ServiceResponse> {
        let mut builder = self
            .http
            .request(request.method, request.url)
            .header(ACCEPT, "application/json");

        if let Some(authorization) = &request.authorization {
            builder = builder.header(AUTHORIZATION, authorization);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = Self::check_response(builder.send().await?).await?;
        let status = response.status();
        let body = response.text().await?;
        Ok(ServiceResponse { status, body })
    }
}
