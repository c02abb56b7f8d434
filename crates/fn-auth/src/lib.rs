//! Session and token lifecycle for the Epic Games / Fortnite web services
//!
//! This crate owns everything needed to obtain a bearer token and keep it usable:
//! client-credentials login, the interactive account login, refresh, and the
//! re-login fallback applied before authenticated calls.
//!
//! # Authentication Flow
//!
//! Logging in with account credentials runs these steps in order:
//!
//! 1. Reputation (CAPTCHA) check
//! 2. CSRF cookie fetch, yielding the `XSRF-TOKEN`
//! 3. Credential submission
//! 4. Exchange code retrieval
//! 5. `exchange_code` token grant
//!
//! Steps 1 and 3 are retried up to ten attempts in total; any other failure is
//! returned immediately. Without stored credentials, `login` falls back to a single
//! `client_credentials` grant.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use fn_auth::{AuthConfig, HttpAuthTransport, SessionManager};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let transport = Arc::new(HttpAuthTransport::new(AuthConfig::default())?);
//!     let manager = SessionManager::builder(transport)
//!         .email("player@example.com")
//!         .password("hunter2")
//!         .build_and_login()
//!         .await?;
//!
//!     // Before every authenticated call
//!     manager.verify_before_call().await?;
//!     println!("Authorization: {}", manager.authorization()?);
//!     Ok(())
//! }
//! ```
//!
//! # Session Storage
//!
//! Installed sessions can be persisted through a `TokenStore` and used to start
//! later processes without logging in again:
//!
//! ```
//! use fn_auth::{MemoryTokenStore, Session, TokenStore};
//!
//! # async fn example() -> fn_auth::Result<()> {
//! let store = MemoryTokenStore::new();
//! # let session = Session {
//! #     access_token: "eg1~token".to_string(),
//! #     token_type: "bearer".to_string(),
//! #     refresh_token: None,
//! #     account_id: Some("abc".to_string()),
//! #     expires_at_millis: 2,
//! #     created_at_millis: 1,
//! #     refresh_expires_at_millis: None,
//! #     client_id: None,
//! #     display_name: None,
//! # };
//! store.save(session.account_key(), &session).await?;
//!
//! if let Some(session) = store.load("abc").await {
//!     println!("Loaded session expiring at {}", session.expires_at_millis);
//! }
//! # Ok(())
//! # }
//! # tokio_test::block_on(example()).unwrap();
//! ```
//!
//! # Important Notes
//!
//! - `logout` does not clear the local session
//! - Tokens and passwords are never logged; `Debug` output redacts them

pub mod clock;
pub mod config;
pub mod errors;
pub mod events;
pub mod file_store;
pub mod manager;
pub mod models;
pub mod session;
pub mod store;
pub mod transport;

// Re-export main types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AuthConfig, ClientToken, Endpoints, HttpTimeouts, MAX_LOGIN_ATTEMPTS};
pub use errors::{AuthError, Result};
pub use events::{Event, EventSink, TracingEventSink};
pub use file_store::FileTokenStore;
pub use manager::{Credentials, SessionManager, SessionManagerBuilder};
pub use models::{CsrfResponse, ExchangeCode, GrantType, LoginForm, PlatformError, TokenResponse};
pub use session::{Session, SessionState};
pub use store::{MemoryTokenStore, TokenStore};
pub use transport::{AuthTransport, HttpAuthTransport, ServiceRequest, ServiceResponse};
