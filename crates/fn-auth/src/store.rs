use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::errors::Result;
use crate::session::Session;

/// Where installed sessions are kept between runs.
///
/// Keys are [`Session::account_key`]: the account id, or `"client"` for
/// client-credentials sessions.
#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    async fn load(&self, account_key: &str) -> Option<Session>;

    /// Insert or replace the session stored under `account_key`
    async fn save(&self, account_key: &str, session: &Session) -> Result<()>;

    async fn remove(&self, account_key: &str) -> Result<()>;

    async fn list_accounts(&self) -> Vec<String>;
}

/// Process-local store; sessions are gone when the last clone is dropped
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Every write replaces a whole entry, so a poisoned map is still consistent
    fn with_sessions<T>(&self, f: impl FnOnce(&mut HashMap<String, Session>) -> T) -> T {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut sessions)
    }
}

#[async_trait::async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self, account_key: &str) -> Option<Session> {
        self.with_sessions(|sessions| sessions.get(account_key).cloned())
    }

    async fn save(&self, account_key: &str, session: &Session) -> Result<()> {
        self.with_sessions(|sessions| sessions.insert(account_key.to_string(), session.clone()));
        Ok(())
    }

    async fn remove(&self, account_key: &str) -> Result<()> {
        self.with_sessions(|sessions| sessions.remove(account_key));
        Ok(())
    }

    async fn list_accounts(&self) -> Vec<String> {
        self.with_sessions(|sessions| sessions.keys().cloned().collect())
    }
}
