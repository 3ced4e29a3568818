use super::{matches_query, read_data};
use crate::error::Result;
use crate::http_client::SecureClient;
use crate::models::profile::Profile;

/// Approval tabs of the profile screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileTab {
    Pending,
    Process,
    Approve,
    Deleted,
}

impl ProfileTab {
    pub fn matches(&self, profile: &Profile) -> bool {
        let status = profile
            .account_status
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();

        match self {
            ProfileTab::Deleted => profile.is_deleted,
            ProfileTab::Approve => status == "approve" || status == "approved",
            ProfileTab::Pending => status == "pending",
            ProfileTab::Process => status == "process",
        }
    }
}

pub async fn profiles(client: &SecureClient) -> Result<Vec<Profile>> {
    read_data(client.get("/profile").await?).await
}

/// Profiles on `tab` whose user id, guardian name or WhatsApp number contains `query`
pub fn filter_profiles<'a>(profiles: &'a [Profile], tab: ProfileTab, query: &str) -> Vec<&'a Profile> {
    profiles
        .iter()
        .filter(|p| tab.matches(p))
        .filter(|p| {
            matches_query(
                &[
                    p.user_id.as_ref().map(|r| r.id()),
                    p.guardian_name.as_deref(),
                    p.whatsapp_number.as_deref(),
                ],
                query,
            )
        })
        .collect()
}
