use serde::{Deserialize, Serialize};

use super::{Identified, NamedRef, Reference};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flat {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub building_id: Reference<NamedRef>,
}

impl Identified for Building {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for Flat {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Create/update payload for a building
#[derive(Debug, Clone, Serialize)]
pub struct BuildingInput<'a> {
    pub name: &'a str,
}

/// Create/update payload for a flat
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatInput<'a> {
    pub building_id: &'a str,
    pub name: &'a str,
}
