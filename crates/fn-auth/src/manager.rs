use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use reqwest::StatusCode;
use tracing::{debug, info, instrument, warn};
use zeroize::Zeroizing;

use crate::clock::{Clock, SystemClock};
use crate::config::{ClientToken, EXCHANGE_TOKEN_TYPE, MAX_LOGIN_ATTEMPTS};
use crate::errors::{AuthError, Result};
use crate::events::{Event, EventSink, TracingEventSink};
use crate::models::{GrantType, LoginForm, TokenResponse};
use crate::session::{Session, SessionState};
use crate::store::TokenStore;
use crate::transport::AuthTransport;

/// Account email and password used for the interactive login flow
#[derive(Clone)]
pub struct Credentials {
    email: String,
    password: Zeroizing<String>,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: Zeroizing::new(password.into()),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    fn login_form(&self, remember_me: bool) -> LoginForm {
        LoginForm {
            email: self.email.clone(),
            password: self.password.as_str().to_string(),
            remember_me,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Transient interactive-login failures that restart the flow
#[derive(Debug)]
enum RetryableFailure {
    CaptchaRejected { status: StatusCode },
    Conflict,
    Rejected { status: StatusCode, message: String },
}

impl RetryableFailure {
    fn into_error(self) -> AuthError {
        match self {
            Self::CaptchaRejected { .. } => AuthError::CaptchaNotAllowed,
            Self::Conflict => AuthError::LoginRejected {
                status: StatusCode::CONFLICT,
                message: "Conflict".to_string(),
            },
            Self::Rejected { status, message } => AuthError::LoginRejected { status, message },
        }
    }
}

impl fmt::Display for RetryableFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CaptchaRejected { status } => write!(f, "captcha check returned {}", status),
            Self::Conflict => f.write_str("login conflict (409)"),
            Self::Rejected { status, message } => write!(f, "login rejected {}: {}", status, message),
        }
    }
}

enum LoginStep {
    Authenticated(TokenResponse),
    Retry(RetryableFailure),
}

/// Owns the current session and drives login, refresh and re-login.
///
/// The session is only ever replaced as a whole, so readers see either the old
/// or the new session. Concurrent `login` calls are not coordinated; the last
/// one to finish wins.
pub struct SessionManager {
    transport: Arc<dyn AuthTransport>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    store: Option<Arc<dyn TokenStore>>,
    client_token: ClientToken,
    credentials: RwLock<Option<Credentials>>,
    state: RwLock<SessionState>,
}

impl SessionManager {
    pub fn builder(transport: Arc<dyn AuthTransport>) -> SessionManagerBuilder {
        SessionManagerBuilder::new(transport)
    }

    pub fn transport(&self) -> &Arc<dyn AuthTransport> {
        &self.transport
    }

    fn read_state(&self) -> RwLockReadGuard<'_, SessionState> {
        // State is replaced whole, a poisoned lock still holds a consistent value
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn stored_credentials(&self) -> Option<Credentials> {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.read_state().is_logged_in()
    }

    /// Snapshot of the current session
    pub fn session(&self) -> Result<Session> {
        self.read_state().session().cloned().ok_or(AuthError::NotLoggedIn)
    }

    pub fn account_token(&self) -> Result<String> {
        Ok(self.session()?.access_token)
    }

    pub fn account_token_type(&self) -> Result<String> {
        Ok(self.session()?.token_type)
    }

    pub fn account_expires_at_millis(&self) -> Result<i64> {
        Ok(self.session()?.expires_at_millis)
    }

    pub fn account_id(&self) -> Result<Option<String>> {
        Ok(self.session()?.account_id)
    }

    /// `Authorization` header value for service calls
    pub fn authorization(&self) -> Result<String> {
        self.read_state()
            .session()
            .map(Session::authorization)
            .ok_or(AuthError::NotLoggedIn)
    }

    /// Replace the stored email and password; only allowed before login
    pub fn set_credentials(&self, email: impl Into<String>, password: impl Into<String>) -> Result<()> {
        if self.is_logged_in() {
            return Err(AuthError::AlreadyLoggedIn);
        }
        *self
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Credentials::new(email, password));
        Ok(())
    }

    pub fn has_credentials(&self) -> bool {
        self.stored_credentials().is_some()
    }

    /// Obtain an application session with the client token alone
    #[instrument(skip(self))]
    pub async fn login_client_credentials(&self) -> Result<()> {
        info!("Logging in with client credentials");
        let response = self
            .transport
            .grant_token(
                &self.client_token.basic_authorization(),
                GrantType::ClientCredentials,
                &[],
                Some(false),
            )
            .await?;

        self.install(response).await
    }

    /// Log in with the stored account credentials, or with client credentials when there are none.
    ///
    /// CAPTCHA rejections and failed credential submissions restart the flow, up to
    /// [`MAX_LOGIN_ATTEMPTS`] attempts in total. Every other failure is returned at once.
    #[instrument(skip(self))]
    pub async fn login(&self, remember_me: bool) -> Result<()> {
        let Some(credentials) = self.stored_credentials() else {
            debug!("No stored credentials, using client credentials");
            return self.login_client_credentials().await;
        };

        info!(email = %credentials.email(), "Logging in with account credentials");
        let form = credentials.login_form(remember_me);
        let mut last_failure = None;

        for attempt in 1..=MAX_LOGIN_ATTEMPTS {
            match self.interactive_attempt(&form).await? {
                LoginStep::Authenticated(response) => return self.install(response).await,
                LoginStep::Retry(failure) => {
                    warn!(
                        attempt,
                        max_attempts = MAX_LOGIN_ATTEMPTS,
                        "Interactive login attempt failed: {}",
                        failure
                    );
                    last_failure = Some(failure);
                }
            }
        }

        Err(last_failure
            .map(RetryableFailure::into_error)
            .unwrap_or(AuthError::CaptchaNotAllowed))
    }

    async fn interactive_attempt(&self, form: &LoginForm) -> Result<LoginStep> {
        // Step 1: reputation check, only the status is inspected
        match self.transport.captcha_check().await {
            Ok(()) => {}
            Err(AuthError::Platform { status, .. }) => {
                return Ok(LoginStep::Retry(RetryableFailure::CaptchaRejected { status }));
            }
            Err(e) => return Err(e),
        }

        // Step 2: anti-forgery token
        let csrf = self.transport.fetch_csrf().await?;
        let xsrf_token = csrf.xsrf_token().ok_or(AuthError::MissingXsrfToken)?;

        // Step 3: credential submission
        match self.transport.submit_login(form, &xsrf_token).await {
            Ok(()) => {}
            Err(AuthError::Platform { status, .. }) if status == StatusCode::CONFLICT => {
                return Ok(LoginStep::Retry(RetryableFailure::Conflict));
            }
            Err(AuthError::Platform { status, error }) => {
                return Ok(LoginStep::Retry(RetryableFailure::Rejected {
                    status,
                    message: error.message().to_string(),
                }));
            }
            Err(e) => return Err(e),
        }

        // Step 4: exchange code bound to the interactive session
        let exchange = self.transport.fetch_exchange_code().await?;

        // Step 5: trade it for a token
        let response = self
            .transport
            .grant_token(
                &self.client_token.basic_authorization(),
                GrantType::ExchangeCode,
                &[
                    ("exchange_code", exchange.code.as_str()),
                    ("token_type", EXCHANGE_TOKEN_TYPE),
                ],
                Some(false),
            )
            .await?;

        Ok(LoginStep::Authenticated(response))
    }

    /// Make sure the session is usable before an authenticated call.
    ///
    /// Does nothing while the token is valid. Once expired the refresh token is used;
    /// if there is none, or the platform refuses the refresh, the full login runs again.
    /// Transport faults during the refresh are returned as is.
    #[instrument(skip(self))]
    pub async fn verify_before_call(&self) -> Result<()> {
        let session = self.session()?;
        if !session.is_expired_at(self.clock.now_millis()) {
            return Ok(());
        }

        let Some(refresh_token) = session.refresh_token.as_deref() else {
            info!("Session expired without refresh token, logging in again");
            return self.login(false).await;
        };

        debug!("Session expired, refreshing");
        let refreshed = self
            .transport
            .grant_token(
                &self.client_token.basic_authorization(),
                GrantType::RefreshToken,
                &[("refresh_token", refresh_token)],
                None,
            )
            .await;

        match refreshed {
            Ok(response) => self.install(response).await,
            Err(e @ AuthError::Platform { .. }) => {
                warn!(
                    error = %e.platform_message(),
                    "Failed to use refresh token, attempting to relogin"
                );
                self.login(false).await
            }
            Err(e) => Err(e),
        }
    }

    /// Logging out does not touch the local session; the token stays installed until it expires.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        debug!("Logout requested, local session left in place");
        Ok(())
    }

    pub fn fire_event(&self, event: Event) {
        self.events.fire_event(&event);
    }

    async fn install(&self, response: TokenResponse) -> Result<()> {
        let session = Session::from_token_response(response, self.clock.now_millis())?;
        info!(
            account_id = ?session.account_id,
            expires_at_millis = session.expires_at_millis,
            "Session installed"
        );

        *self.write_state() = SessionState::LoggedIn(session.clone());
        self.persist(&session).await;
        Ok(())
    }

    async fn persist(&self, session: &Session) {
        if let Some(store) = &self.store
            && let Err(e) = store.save(session.account_key(), session).await
        {
            warn!("Failed to persist session for {}: {}", session.account_key(), e);
        }
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("logged_in", &self.is_logged_in())
            .field("has_credentials", &self.has_credentials())
            .finish_non_exhaustive()
    }
}

/// Builder mirroring the configuration surface of the manager
pub struct SessionManagerBuilder {
    transport: Arc<dyn AuthTransport>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    store: Option<Arc<dyn TokenStore>>,
    client_token: ClientToken,
    email: Option<String>,
    password: Option<String>,
    login_as_user: bool,
    initial_session: Option<Session>,
    initial_login: Option<TokenResponse>,
}

impl SessionManagerBuilder {
    pub fn new(transport: Arc<dyn AuthTransport>) -> Self {
        Self {
            transport,
            clock: Arc::new(SystemClock),
            events: Arc::new(TracingEventSink),
            store: None,
            client_token: ClientToken::default(),
            email: None,
            password: None,
            login_as_user: true,
            initial_session: None,
            initial_login: None,
        }
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn client_token(mut self, client_token: ClientToken) -> Self {
        self.client_token = client_token;
        self
    }

    /// Choose between the account flow (default) and the client-credentials flow
    pub fn login_as_user(mut self, login_as_user: bool) -> Self {
        self.login_as_user = login_as_user;
        self
    }

    /// Start logged in with an already established session
    pub fn initial_session(mut self, session: Session) -> Self {
        self.initial_session = Some(session);
        self
    }

    /// Start logged in from a token response obtained elsewhere
    pub fn initial_login(mut self, response: TokenResponse) -> Self {
        self.initial_login = Some(response);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Persist every installed session into `store`
    pub fn store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Persist into `store` and start from the session saved under `account_key`, if any
    pub async fn restore_from(mut self, store: Arc<dyn TokenStore>, account_key: &str) -> Self {
        if let Some(session) = store.load(account_key).await {
            debug!("Restored session for {}", account_key);
            self.initial_session = Some(session);
        }
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Result<SessionManager> {
        let state = match (self.initial_session, self.initial_login) {
            (Some(session), _) => SessionState::LoggedIn(session),
            (None, Some(response)) => {
                SessionState::LoggedIn(Session::from_token_response(response, self.clock.now_millis())?)
            }
            (None, None) => SessionState::LoggedOut,
        };

        let credentials = match (self.email, self.password) {
            (Some(email), Some(password)) => Some(Credentials::new(email, password)),
            _ => None,
        };

        Ok(SessionManager {
            transport: self.transport,
            clock: self.clock,
            events: self.events,
            store: self.store,
            client_token: self.client_token,
            credentials: RwLock::new(credentials),
            state: RwLock::new(state),
        })
    }

    /// Build and log in with the configured strategy, unless a session was supplied
    pub async fn build_and_login(self) -> Result<SessionManager> {
        let login_as_user = self.login_as_user;
        let manager = self.build()?;

        if manager.is_logged_in() {
            return Ok(manager);
        }

        if login_as_user {
            if !manager.has_credentials() {
                return Err(AuthError::MissingCredentials);
            }
            manager.login(false).await?;
        } else {
            manager.login_client_credentials().await?;
        }

        Ok(manager)
    }
}
