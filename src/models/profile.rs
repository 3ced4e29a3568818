use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::UserRef;
use super::{Identified, NamedRef, Reference};

/// Resident profile awaiting or past admin approval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub user_id: Option<Reference<UserRef>>,
    #[serde(default)]
    pub profile_photo: Option<String>,
    #[serde(default)]
    pub nid_photo: Option<String>,
    #[serde(default)]
    pub guardian_name: Option<String>,
    #[serde(default)]
    pub guardian_phone: Option<String>,
    #[serde(default)]
    pub guardian_relation: Option<String>,
    #[serde(default)]
    pub emergency_contact: Option<String>,
    #[serde(default)]
    pub building_id: Option<Reference<NamedRef>>,
    #[serde(default)]
    pub flat_id: Option<Reference<NamedRef>>,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub whatsapp_number: Option<String>,
    #[serde(default)]
    pub account_status: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Profile {
    pub fn building(&self) -> Option<&str> {
        self.building_id.as_ref().map(|r| r.id())
    }

    pub fn flat(&self) -> Option<&str> {
        self.flat_id.as_ref().map(|r| r.id())
    }
}

impl Identified for Profile {
    fn id(&self) -> &str {
        &self.id
    }
}
