use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::errors::{AuthError, Result};
use crate::session::Session;
use crate::store::TokenStore;

/// Sessions persisted as one JSON file per account key
///
/// ```text
/// <storage dir>/
/// ├── lock                   # Advisory lock taken by writers
/// └── accounts/
///     ├── <account id>.json  # User session
///     └── client.json        # Client-credentials session
/// ```
///
/// Files are owner-only on Unix. Reads are served from an in-memory cache once a
/// session has been seen by this process.
#[derive(Debug)]
pub struct FileTokenStore {
    accounts_dir: PathBuf,
    lock_file: PathBuf,
    cache: Arc<RwLock<HashMap<String, Session>>>,
}

/// Account keys become file names, so they are limited to a safe alphabet
fn validate_account_key(account_key: &str) -> Result<()> {
    let valid = !account_key.is_empty()
        && account_key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(AuthError::InvalidAccountKey(account_key.to_string()))
    }
}

impl FileTokenStore {
    pub async fn new(storage_dir: impl AsRef<Path>) -> Result<Self> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        let accounts_dir = storage_dir.join("accounts");

        fs::create_dir_all(&accounts_dir).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            std::fs::set_permissions(&storage_dir, perms.clone())?;
            std::fs::set_permissions(&accounts_dir, perms)?;
        }

        debug!("Session store at {}", storage_dir.display());
        Ok(Self {
            accounts_dir,
            lock_file: storage_dir.join("lock"),
            cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// `sessions/` under the platform config directory for `fnapi`
    pub fn default_storage_dir() -> Result<PathBuf> {
        let project_dirs = directories::ProjectDirs::from("", "", "fnapi")
            .ok_or(AuthError::StorageDirUnavailable)?;

        Ok(project_dirs.config_dir().join("sessions"))
    }

    fn account_path(&self, account_key: &str) -> Result<PathBuf> {
        validate_account_key(account_key)?;
        Ok(self.accounts_dir.join(format!("{}.json", account_key)))
    }

    /// Exclusive advisory lock held for the duration of a write
    fn acquire_lock(&self) -> Result<std::fs::File> {
        let lock_file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_file)?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| AuthError::LockTimeout)?;

        Ok(lock_file)
    }

    async fn read_session(&self, account_key: &str) -> Result<Option<Session>> {
        let path = self.account_path(account_key)?;
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn write_session(&self, account_key: &str, session: &Session) -> Result<()> {
        let path = self.account_path(account_key)?;
        let json = serde_json::to_string_pretty(session)?;

        // Readers only ever see a complete file
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, json).await?;
        std::fs::File::open(&temp_path)?.sync_all()?;
        fs::rename(&temp_path, &path).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl TokenStore for FileTokenStore {
    /// Missing, invalid and unreadable sessions all load as `None`
    async fn load(&self, account_key: &str) -> Option<Session> {
        if let Some(session) = self.cache.read().await.get(account_key) {
            return Some(session.clone());
        }

        match self.read_session(account_key).await {
            Ok(Some(session)) => {
                self.cache
                    .write()
                    .await
                    .insert(account_key.to_string(), session.clone());
                Some(session)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Ignoring stored session for {}: {}", account_key, e);
                None
            }
        }
    }

    async fn save(&self, account_key: &str, session: &Session) -> Result<()> {
        let _lock = self.acquire_lock()?;
        self.write_session(account_key, session).await?;
        self.cache
            .write()
            .await
            .insert(account_key.to_string(), session.clone());
        Ok(())
    }

    async fn remove(&self, account_key: &str) -> Result<()> {
        let _lock = self.acquire_lock()?;

        let path = self.account_path(account_key)?;
        if path.exists() {
            fs::remove_file(&path).await?;
        }
        self.cache.write().await.remove(account_key);

        Ok(())
    }

    async fn list_accounts(&self) -> Vec<String> {
        let mut entries = match fs::read_dir(&self.accounts_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to read {}: {}", self.accounts_dir.display(), e);
                return Vec::new();
            }
        };

        let mut accounts = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                && validate_account_key(stem).is_ok()
            {
                accounts.push(stem.to_string());
            }
        }

        accounts
    }
}
