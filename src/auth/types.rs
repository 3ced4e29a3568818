// Authentication types

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Store key holding the short-lived access token
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Store key holding the long-lived refresh token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Complete credential set
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: String,
}

/// Same-site attribute carried with every stored credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "strict",
            SameSite::Lax => "lax",
            SameSite::None => "none",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "lax" => SameSite::Lax,
            "none" => SameSite::None,
            _ => SameSite::Strict,
        }
    }
}

/// Attributes for a single credential write
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StorageOptions {
    pub ttl: Duration,
    pub secure: bool,
    pub same_site: SameSite,
}

/// Expiry windows for the credentials the client writes.
///
/// Login stores a 1-day access token next to a 30-day refresh token; a
/// refreshed access token is kept for 7 days.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CredentialPolicy {
    pub login_access_ttl: Duration,
    pub refreshed_access_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub secure: bool,
}

impl CredentialPolicy {
    pub fn new(secure: bool) -> Self {
        Self {
            login_access_ttl: Duration::days(1),
            refreshed_access_ttl: Duration::days(7),
            refresh_token_ttl: Duration::days(30),
            secure,
        }
    }

    fn options(&self, ttl: Duration) -> StorageOptions {
        StorageOptions {
            ttl,
            secure: self.secure,
            same_site: SameSite::Strict,
        }
    }

    pub fn login_access(&self) -> StorageOptions {
        self.options(self.login_access_ttl)
    }

    pub fn login_refresh(&self) -> StorageOptions {
        self.options(self.refresh_token_ttl)
    }

    pub fn refreshed_access(&self) -> StorageOptions {
        self.options(self.refreshed_access_ttl)
    }
}

impl Default for CredentialPolicy {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Refresh endpoint request body
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Refresh endpoint response body: `{ data: { accessToken } }`
#[derive(Deserialize)]
pub struct RefreshTokenResponse {
    pub data: Option<RefreshTokenData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenData {
    pub access_token: Option<String>,
}
