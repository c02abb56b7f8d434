mod cli;
mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use fn_auth::{
    AuthConfig, ClientToken, FileTokenStore, HttpAuthTransport, SessionManager, TokenStore,
};
use fn_services::ApiClient;
use tracing::{info, warn};

use crate::cli::{Cli, Command};
use crate::config::{FileConfig, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let file = FileConfig::load(cli.config.as_deref()).await?;
    let settings = Settings::resolve(&cli, file);

    run(cli.command, cli.account, settings).await
}

async fn run(command: Command, account: Option<String>, settings: Settings) -> Result<()> {
    let auth_config = AuthConfig {
        language: settings.language.clone(),
        ..AuthConfig::default()
    };
    let transport = Arc::new(
        HttpAuthTransport::new(auth_config).context("Failed to build the HTTP client")?,
    );

    let session_dir = match settings.session_dir.clone() {
        Some(dir) => dir,
        None => FileTokenStore::default_storage_dir()?,
    };
    let store: Arc<dyn TokenStore> = Arc::new(
        FileTokenStore::new(&session_dir)
            .await
            .with_context(|| format!("Failed to open session store at {}", session_dir.display()))?,
    );

    let mut builder = SessionManager::builder(transport).login_as_user(settings.login_as_user);
    if let Some(email) = settings.email.clone() {
        builder = builder.email(email);
    }
    if let Some(password) = settings.password.clone() {
        builder = builder.password(password);
    }
    if let Some(client_token) = settings.client_token.clone() {
        builder = builder.client_token(ClientToken::new(client_token));
    }

    match command {
        Command::Login {
            client,
            remember_me,
        } => {
            let manager = builder.store(store).build()?;
            let as_user = !client && settings.login_as_user;
            if !as_user || !manager.has_credentials() {
                if as_user {
                    warn!("No account credentials configured, using client credentials");
                }
                manager.login_client_credentials().await?;
            } else {
                manager.login(remember_me).await?;
            }

            let session = manager.session()?;
            let who = session
                .display_name
                .as_deref()
                .or(session.account_id.as_deref())
                .unwrap_or("client");
            match session.expires_at() {
                Some(expires_at) => println!("Logged in as {who}, token expires at {expires_at}"),
                None => println!("Logged in as {who}"),
            }
        }
        Command::Token => {
            let manager = restore(builder, store, account).await?;
            manager.verify_before_call().await?;
            println!("{}", manager.authorization()?);
        }
        Command::Call {
            service,
            path,
            method,
            body,
        } => {
            let body = body
                .map(|body| serde_json::from_str::<serde_json::Value>(&body))
                .transpose()
                .context("Request body is not valid JSON")?;
            let manager = restore(builder, store, account).await?;
            let client = ApiClient::new(Arc::new(manager)).with_language(settings.language);

            let response = client.request(service, method, &path, body).await?;
            match response.json::<serde_json::Value>() {
                Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                Err(_) => println!("{}", response.body),
            }
        }
        Command::Logout => {
            let manager = restore_stored(builder, store, account).await.build()?;
            logout(&manager).await?;
        }
    }

    Ok(())
}

/// Log out without ever logging in; returns whether a stored session was found
async fn logout(manager: &SessionManager) -> Result<bool> {
    if !manager.is_logged_in() {
        info!("No stored session, nothing to log out");
        return Ok(false);
    }

    manager.logout().await?;
    info!("Logout is a no-op, the stored session stays until it expires");
    Ok(true)
}

/// Start from a stored session, logging in when none is stored
async fn restore(
    builder: fn_auth::SessionManagerBuilder,
    store: Arc<dyn TokenStore>,
    account: Option<String>,
) -> Result<SessionManager> {
    restore_stored(builder, store, account)
        .await
        .build_and_login()
        .await
        .context("No stored session and login failed")
}

/// Builder seeded with the selected stored session, if there is one
async fn restore_stored(
    builder: fn_auth::SessionManagerBuilder,
    store: Arc<dyn TokenStore>,
    account: Option<String>,
) -> fn_auth::SessionManagerBuilder {
    let account = match account {
        Some(account) => Some(account),
        None => {
            let mut accounts = store.list_accounts().await;
            accounts.sort();
            accounts.into_iter().next()
        }
    };

    match account {
        Some(account) => builder.restore_from(store, &account).await,
        None => builder.store(store),
    }
}
