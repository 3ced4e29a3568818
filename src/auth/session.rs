// Session lifecycle: login, logout, current user and role guard

use super::store::load_credentials;
use super::types::{Credentials, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::api;
use crate::error::Result;
use crate::http_client::{SecureClient, SessionEvent, LOGIN_PATH};
use crate::models::user::{Role, User};

/// Landing page for residents who wander into an admin-only area
pub const USER_DASHBOARD_PATH: &str = "/user-dashboard";

/// Login/logout on top of a [`SecureClient`]
#[derive(Clone)]
pub struct Session {
    client: SecureClient,
}

impl Session {
    pub fn new(client: SecureClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &SecureClient {
        &self.client
    }

    /// Store freshly issued tokens and load the user they belong to.
    /// Returns `None` when the profile cannot be fetched.
    pub async fn login(&self, access_token: &str, refresh_token: &str) -> Result<Option<User>> {
        let policy = self.client.policy();
        let store = self.client.store();

        store.set(ACCESS_TOKEN_KEY, access_token, policy.login_access())?;
        store.set(REFRESH_TOKEN_KEY, refresh_token, policy.login_refresh())?;

        tracing::info!("Credentials stored");
        self.client.emit(SessionEvent::LoggedIn);

        Ok(self.current_user().await)
    }

    /// Forget both tokens
    pub fn logout(&self) -> Result<()> {
        let store = self.client.store();
        store.remove(ACCESS_TOKEN_KEY)?;
        store.remove(REFRESH_TOKEN_KEY)?;

        tracing::info!("Logged out");
        self.client.emit(SessionEvent::LoggedOut {
            redirect_to: LOGIN_PATH.to_string(),
        });
        Ok(())
    }

    /// The signed-in user, or `None` without a usable session
    pub async fn current_user(&self) -> Option<User> {
        match self.client.access_token() {
            Ok(Some(_)) => {}
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Failed to read access token: {}", e);
                return None;
            }
        }

        match api::users::me(&self.client).await {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!("Failed to fetch user: {}", e);
                None
            }
        }
    }

    pub fn credentials(&self) -> Result<Option<Credentials>> {
        load_credentials(self.client.store())
    }
}

/// Route guard decision
#[derive(Debug, Clone, PartialEq)]
pub enum Access {
    Granted,
    Redirect(&'static str),
}

/// Decide whether `user` may open a view restricted to `allowed_roles`
pub fn authorize(user: Option<&User>, allowed_roles: &[Role]) -> Access {
    match user {
        None => Access::Redirect(LOGIN_PATH),
        Some(user) if allowed_roles.contains(&user.role) => Access::Granted,
        Some(user) if user.role == Role::User => Access::Redirect(USER_DASHBOARD_PATH),
        Some(_) => Access::Redirect(LOGIN_PATH),
    }
}
