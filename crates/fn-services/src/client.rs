use std::collections::HashMap;
use std::sync::Arc;

use fn_auth::{Result, ServiceRequest, ServiceResponse, SessionManager};
use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use crate::service::Service;

/// Authenticated access to the platform services.
///
/// Every call to a service that needs a session runs
/// [`SessionManager::verify_before_call`] first, then sends the current
/// authorization snapshot.
#[derive(Debug, Clone)]
pub struct ApiClient {
    manager: Arc<SessionManager>,
    language: String,
    base_urls: HashMap<Service, Url>,
}

impl ApiClient {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self {
            manager,
            language: "en".to_string(),
            base_urls: HashMap::new(),
        }
    }

    /// Language sent as `Accept-Language`
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Point one service at another host
    pub fn with_base_url(mut self, service: Service, base_url: Url) -> Self {
        self.base_urls.insert(service, base_url);
        self
    }

    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn service_url(&self, service: Service, path: &str) -> Result<Url> {
        let base = self
            .base_urls
            .get(&service)
            .cloned()
            .unwrap_or_else(|| service.base_url());
        Ok(base.join(path.trim_start_matches('/'))?)
    }

    #[instrument(skip(self, body))]
    pub async fn request(
        &self,
        service: Service,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<ServiceResponse> {
        if service.requires_session() {
            self.manager.verify_before_call().await?;
        }

        let mut request = ServiceRequest::new(method, self.service_url(service, path)?)
            .header("Accept-Language", self.language.as_str());
        if let Ok(authorization) = self.manager.authorization() {
            request = request.authorization(authorization);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(url = %request.url, "Calling service");
        self.manager.transport().call_service(request).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, service: Service, path: &str) -> Result<T> {
        self.request(service, Method::GET, path, None).await?.json()
    }

    pub async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        service: Service,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = serde_json::to_value(body)?;
        self.request(service, Method::POST, path, Some(body))
            .await?
            .json()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;
    use fn_auth::{
        AuthError, AuthTransport, CsrfResponse, ExchangeCode, GrantType, HttpAuthTransport,
        LoginForm, ManualClock, TokenResponse,
    };
    use reqwest::StatusCode;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const NOW: i64 = 1_700_000_000_000;

    #[derive(Default)]
    struct RecordingTransport {
        grants: Mutex<VecDeque<TokenResponse>>,
        grant_types: Mutex<Vec<GrantType>>,
        requests: Mutex<Vec<ServiceRequest>>,
    }

    #[async_trait::async_trait]
    impl AuthTransport for RecordingTransport {
        async fn grant_token(
            &self,
            _authorization: &str,
            grant_type: GrantType,
            _extra_params: &[(&str, &str)],
            _remember_device: Option<bool>,
        ) -> Result<TokenResponse> {
            self.grant_types.lock().unwrap().push(grant_type);
            self.grants
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AuthError::InvalidResponse("unscripted grant".to_string()))
        }

        async fn captcha_check(&self) -> Result<()> {
            Ok(())
        }

        async fn fetch_csrf(&self) -> Result<CsrfResponse> {
            Ok(CsrfResponse::default())
        }

        async fn submit_login(&self, _form: &LoginForm, _xsrf_token: &str) -> Result<()> {
            Ok(())
        }

        async fn fetch_exchange_code(&self) -> Result<ExchangeCode> {
            Ok(ExchangeCode {
                code: "code".to_string(),
            })
        }

        async fn call_service(&self, request: ServiceRequest) -> Result<ServiceResponse> {
            self.requests.lock().unwrap().push(request);
            Ok(ServiceResponse {
                status: StatusCode::OK,
                body: r#"{"ok":true}"#.to_string(),
            })
        }
    }

    fn token(access: &str, refresh: Option<&str>, expires_in: u64) -> TokenResponse {
        serde_json::from_value(serde_json::json!({
            "access_token": access,
            "expires_in": expires_in,
            "token_type": "bearer",
            "refresh_token": refresh,
            "account_id": "account"
        }))
        .unwrap()
    }

    fn client_for(transport: &Arc<RecordingTransport>, clock: &Arc<ManualClock>) -> ApiClient {
        let manager = SessionManager::builder(transport.clone())
            .clock(clock.clone())
            .login_as_user(false)
            .build()
            .unwrap();
        ApiClient::new(Arc::new(manager))
    }

    #[tokio::test]
    async fn test_session_services_require_login() {
        let transport = Arc::new(RecordingTransport::default());
        let client = client_for(&transport, &Arc::new(ManualClock::new(NOW)));

        let error = client
            .request(Service::FriendsPublic, Method::GET, "friends/api/public/friends/a", None)
            .await
            .unwrap_err();

        assert!(matches!(error, AuthError::NotLoggedIn));
        assert!(transport.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_login_services_are_called_anonymously() {
        let transport = Arc::new(RecordingTransport::default());
        let client = client_for(&transport, &Arc::new(ManualClock::new(NOW)));

        client
            .request(Service::AccountPublic, Method::GET, "/account/api/public/account", None)
            .await
            .unwrap();

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].authorization.is_none());
        assert_eq!(
            requests[0].url.as_str(),
            "https://account-public-service-prod03.ol.epicgames.com/account/api/public/account"
        );
    }

    #[tokio::test]
    async fn test_authorized_call_carries_token_and_language() {
        let transport = Arc::new(RecordingTransport::default());
        transport.grants.lock().unwrap().push_back(token("tok", None, 3600));
        let client = client_for(&transport, &Arc::new(ManualClock::new(NOW))).with_language("de");
        client.manager().login_client_credentials().await.unwrap();

        let value: serde_json::Value = client
            .get_json(Service::CatalogPublic, "catalog/api/shared/bulk/offers")
            .await
            .unwrap();

        assert_eq!(value["ok"], true);
        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[0].authorization.as_deref(), Some("bearer tok"));
        assert!(
            requests[0]
                .headers
                .contains(&("Accept-Language".to_string(), "de".to_string()))
        );
    }

    #[tokio::test]
    async fn test_expired_session_refreshed_before_call() {
        let transport = Arc::new(RecordingTransport::default());
        {
            let mut grants = transport.grants.lock().unwrap();
            grants.push_back(token("old", Some("refresh"), 60));
            grants.push_back(token("new", Some("refresh-2"), 60));
        }
        let clock = Arc::new(ManualClock::new(NOW));
        let client = client_for(&transport, &clock);
        client.manager().login_client_credentials().await.unwrap();

        clock.advance_secs(60);
        client
            .request(Service::Party, Method::GET, "party/api/v1/Fortnite/user/account", None)
            .await
            .unwrap();

        assert_eq!(
            *transport.grant_types.lock().unwrap(),
            vec![GrantType::ClientCredentials, GrantType::RefreshToken]
        );
        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[0].authorization.as_deref(), Some("bearer new"));
    }

    #[tokio::test]
    async fn test_post_json_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/persona/api/public/account/lookup"))
            .and(header("authorization", "bearer tok"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "id": "abc", "displayName": "Ninja" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let transport =
            Arc::new(HttpAuthTransport::new(fn_auth::AuthConfig::with_base_url(&server.uri()).unwrap()).unwrap());
        let manager = SessionManager::builder(transport)
            .initial_login(token("tok", None, 3600))
            .build()
            .unwrap();
        let client = ApiClient::new(Arc::new(manager)).with_base_url(
            Service::PersonaPublic,
            Url::parse(&format!("{}/", server.uri())).unwrap(),
        );

        let account: serde_json::Value = client
            .post_json(
                Service::PersonaPublic,
                "persona/api/public/account/lookup",
                &serde_json::json!({ "q": "ninja" }),
            )
            .await
            .unwrap();

        assert_eq!(account["displayName"], "Ninja");
    }

    #[tokio::test]
    async fn test_service_error_is_platform_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "errorCode": "errors.com.epicgames.account.account_not_found",
                "errorMessage": "Sorry, we couldn't find an account"
            })))
            .mount(&server)
            .await;

        let transport =
            Arc::new(HttpAuthTransport::new(fn_auth::AuthConfig::with_base_url(&server.uri()).unwrap()).unwrap());
        let manager = SessionManager::builder(transport)
            .initial_login(token("tok", None, 3600))
            .build()
            .unwrap();
        let client = ApiClient::new(Arc::new(manager)).with_base_url(
            Service::AccountPublic,
            Url::parse(&format!("{}/", server.uri())).unwrap(),
        );

        let error = client
            .get_json::<serde_json::Value>(Service::AccountPublic, "account/api/public/account/x")
            .await
            .unwrap_err();

        assert_eq!(error.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(error.platform_message(), "Sorry, we couldn't find an account");
    }
}
