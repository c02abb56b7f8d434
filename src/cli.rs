use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fn_services::Service;
use reqwest::Method;

/// Command line client for the Epic Games / Fortnite web services
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Account email used for the interactive login
    #[arg(short, long, env = "FNAPI_EMAIL", global = true)]
    pub email: Option<String>,

    /// Account password used for the interactive login
    #[arg(short, long, env = "FNAPI_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Base64 `client_id:client_secret` pair, defaults to the launcher client
    #[arg(long, env = "FNAPI_CLIENT_TOKEN", global = true, hide_env_values = true)]
    pub client_token: Option<String>,

    /// Stored session to use, defaults to the first one found
    #[arg(short, long, env = "FNAPI_ACCOUNT", global = true)]
    pub account: Option<String>,

    /// Accept-Language sent to the services
    #[arg(long, env = "FNAPI_LANGUAGE", global = true)]
    pub language: Option<String>,

    /// Directory holding the stored sessions
    #[arg(long, env = "FNAPI_SESSION_DIR", global = true)]
    pub session_dir: Option<PathBuf>,

    /// Path to config.toml
    #[arg(short, long, env = "FNAPI_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "FNAPI_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Log in and store the session
    Login {
        /// Use the client credentials grant even when account credentials are set
        #[arg(long)]
        client: bool,

        /// Ask the login page to remember this device
        #[arg(long)]
        remember_me: bool,
    },
    /// Print the authorization header of the stored session, refreshing it if needed
    Token,
    /// Call a service endpoint and print the response body
    Call {
        /// Service name (account, friends, party, persona, ...)
        service: Service,

        /// Path relative to the service base URL
        path: String,

        #[arg(short = 'X', long, default_value = "GET")]
        method: Method,

        /// JSON request body
        #[arg(short, long)]
        body: Option<String>,
    },
    /// Log out; a no-op, the stored session stays valid until it expires
    Logout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_call() {
        let cli = Cli::parse_from([
            "fnapi",
            "call",
            "friends",
            "friends/api/public/friends/abc",
            "-X",
            "POST",
            "--body",
            "{}",
        ]);

        assert_eq!(
            cli.command,
            Command::Call {
                service: Service::FriendsPublic,
                path: "friends/api/public/friends/abc".to_string(),
                method: Method::POST,
                body: Some("{}".to_string()),
            }
        );
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_unknown_service_rejected() {
        let result = Cli::try_parse_from(["fnapi", "call", "nope", "path"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["fnapi", "login", "--client", "--account", "abc"]);
        assert_eq!(cli.account.as_deref(), Some("abc"));
        assert_eq!(
            cli.command,
            Command::Login {
                client: true,
                remember_me: false
            }
        );
    }
}
