use futures::future::join_all;
use std::collections::HashMap;

use super::{matches_query, read_data};
use crate::error::Result;
use crate::http_client::SecureClient;
use crate::models::user::User;

/// Tabs of the user administration screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserTab {
    Active,
    Blocked,
    Deleted,
}

impl UserTab {
    /// Deleted accounts only show under `Deleted`; the other tabs match on status
    pub fn matches(&self, user: &User) -> bool {
        if *self == UserTab::Deleted {
            return user.is_deleted;
        }
        if user.is_deleted {
            return false;
        }

        let status = user.status.as_deref().unwrap_or_default().to_lowercase();
        match self {
            UserTab::Active => status == "active",
            UserTab::Blocked => status == "blocked",
            UserTab::Deleted => false,
        }
    }
}

pub async fn me(client: &SecureClient) -> Result<User> {
    read_data(client.get("/user/me").await?).await
}

pub async fn all_users(client: &SecureClient) -> Result<Vec<User>> {
    read_data(client.get("/user/all").await?).await
}

pub async fn user(client: &SecureClient, id: &str) -> Result<User> {
    read_data(client.get(&format!("/user/{}", id)).await?).await
}

/// Fetch several users concurrently; users that fail to load are skipped
pub async fn users_by_id(client: &SecureClient, ids: &[String]) -> HashMap<String, User> {
    let results = join_all(ids.iter().map(|id| async move { (id, user(client, id).await) })).await;

    results
        .into_iter()
        .filter_map(|(id, result)| match result {
            Ok(user) => Some((id.clone(), user)),
            Err(e) => {
                tracing::warn!(user_id = %id, "User fetch failed: {}", e);
                None
            }
        })
        .collect()
}

/// Users on `tab` whose name, email or phone contains `query`
pub fn filter_users<'a>(users: &'a [User], tab: UserTab, query: &str) -> Vec<&'a User> {
    users
        .iter()
        .filter(|u| tab.matches(u))
        .filter(|u| {
            matches_query(
                &[Some(u.name.as_str()), u.email.as_deref(), u.phone.as_deref()],
                query,
            )
        })
        .collect()
}
