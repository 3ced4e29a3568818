use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::CredentialPolicy;

/// Global connection settings shared by every command
#[derive(Args, Debug, Clone)]
pub struct CliArgs {
    /// Base URL of the hostel backend
    #[arg(short = 'u', long, env = "SERVER_URL")]
    pub base_url: Option<String>,

    /// Path to the SQLite credential store
    #[arg(short = 'd', long, env = "CREDENTIALS_DB")]
    pub credentials_db: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format (text, json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Authorization header scheme (raw, bearer)
    #[arg(long, env = "AUTH_HEADER_SCHEME", default_value = "raw")]
    pub auth_scheme: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,

    /// Mark stored credentials as secure (production deployments)
    #[arg(long, env = "PRODUCTION", default_value = "false")]
    pub production: bool,
}

#[derive(Clone, Debug)]
pub struct Config {
    // Backend
    pub base_url: String,
    pub auth_scheme: AuthScheme,

    // Credential storage
    pub credentials_db: PathBuf,
    pub production: bool,

    // HTTP client
    pub http_max_connections: usize,
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,

    /// Seconds a queued request waits for an in-flight refresh (0 = forever)
    pub refresh_wait_timeout: u64,

    // Logging
    pub log_level: String,
    pub log_format: LogFormat,
}

/// Log line format for the CLI subscriber
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// How the access token is written into the `Authorization` header
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum AuthScheme {
    /// The literal token, which is what the hostel backend reads
    #[default]
    Raw,
    /// `Bearer <token>`
    Bearer,
}

impl AuthScheme {
    pub fn header_value(&self, token: &str) -> String {
        match self {
            AuthScheme::Raw => token.to_string(),
            AuthScheme::Bearer => format!("Bearer {}", token),
        }
    }
}

impl Config {
    /// Build configuration from parsed CLI arguments; priority is CLI > ENV > defaults.
    /// Callers load `.env` before parsing so clap sees those variables too.
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let base_url = args
            .base_url
            .or_else(|| std::env::var("SERVER_URL").ok())
            .ok_or_else(|| {
                anyhow::anyhow!("SERVER_URL is required (use -u or set SERVER_URL env var)")
            })?;

        let credentials_db = args
            .credentials_db
            .map(|s| expand_tilde(&s))
            .unwrap_or_else(default_credentials_db);

        Ok(Config {
            base_url,
            auth_scheme: parse_auth_scheme(&args.auth_scheme),
            credentials_db,
            production: args.production,

            http_max_connections: std::env::var("HTTP_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(20),

            http_connect_timeout: std::env::var("HTTP_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),

            http_request_timeout: args.http_timeout,

            refresh_wait_timeout: std::env::var("REFRESH_WAIT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),

            log_level: args.log_level,
            log_format: LogFormat::parse(&args.log_format),
        })
    }

    /// Configuration with defaults for the given backend, used by embedders and tests
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Config {
            base_url: base_url.into(),
            auth_scheme: AuthScheme::Raw,
            credentials_db: default_credentials_db(),
            production: false,
            http_max_connections: 20,
            http_connect_timeout: 10,
            http_request_timeout: 30,
            refresh_wait_timeout: 0,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }

    /// Validate configuration and normalize the base URL
    pub fn validate(&mut self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            anyhow::bail!(
                "SERVER_URL must start with http:// or https://: {}",
                self.base_url
            );
        }

        while self.base_url.ends_with('/') {
            self.base_url.pop();
        }

        Ok(())
    }

    /// Expiry and attribute policy for stored credentials
    pub fn credential_policy(&self) -> CredentialPolicy {
        CredentialPolicy::new(self.production)
    }

    /// How long a queued request waits for a refresh, `None` meaning forever
    pub fn refresh_wait(&self) -> Option<Duration> {
        match self.refresh_wait_timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Default location of the credential database
fn default_credentials_db() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hostel-client")
        .join("credentials.sqlite3")
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Parse authorization scheme from string
fn parse_auth_scheme(s: &str) -> AuthScheme {
    match s.to_lowercase().as_str() {
        "bearer" => AuthScheme::Bearer,
        _ => AuthScheme::Raw,
    }
}
