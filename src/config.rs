use std::path::{Path, PathBuf};

use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::cli::Cli;

const CONFIG_FILE: &str = "config.toml";

/// Optional `config.toml` next to the stored sessions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConfig {
    pub email: Option<String>,
    pub password: Option<String>,
    pub client_token: Option<String>,
    pub login_as_user: Option<bool>,
    pub language: Option<String>,
    pub session_dir: Option<PathBuf>,
}

impl FileConfig {
    /// Load the config file; a missing file yields the defaults
    pub async fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        if !path.exists() {
            debug!("No config file at {}", path.display());
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .context("Failed to read config file")
            .map_err(|e| {
                error!("Failed to read config file {}: {}", path.display(), e);
                ConfigError::FileReadFailed {
                    path: path.clone(),
                    source: e,
                }
            })?;

        let config = toml::from_str(&content)
            .context("Failed to parse config.toml")
            .map_err(|e| ConfigError::ParsingFailed {
                path: path.clone(),
                source: e,
            })?;

        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn default_path() -> Result<PathBuf, ConfigError> {
        Ok(project_dirs()?.config_dir().join(CONFIG_FILE))
    }
}

fn project_dirs() -> Result<ProjectDirs, ConfigError> {
    ProjectDirs::from("", "", "fnapi").ok_or(ConfigError::ProjectDirectoriesUnavailable)
}

/// Effective settings: command line and environment win over the config file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub email: Option<String>,
    pub password: Option<String>,
    pub client_token: Option<String>,
    pub login_as_user: bool,
    pub language: String,
    pub session_dir: Option<PathBuf>,
}

impl Settings {
    pub fn resolve(cli: &Cli, file: FileConfig) -> Self {
        Self {
            email: cli.email.clone().or(file.email),
            password: cli.password.clone().or(file.password),
            client_token: cli.client_token.clone().or(file.client_token),
            login_as_user: file.login_as_user.unwrap_or(true),
            language: cli
                .language
                .clone()
                .or(file.language)
                .unwrap_or_else(|| "en".to_string()),
            session_dir: cli.session_dir.clone().or(file.session_dir),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "Project directories are unavailable - this usually indicates an unsupported OS or missing home directory"
    )]
    ProjectDirectoriesUnavailable,

    #[error("Failed to read config file '{path}': {source}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParsingFailed {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}
