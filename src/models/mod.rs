// Data models for the hostel backend documents

pub mod meal;
pub mod profile;
pub mod property;
pub mod user;
pub mod wallet;

use serde::{Deserialize, Serialize};

/// Documents that carry a backend `_id`
pub trait Identified {
    fn id(&self) -> &str;
}

/// A foreign key the backend returns either as a bare id or as the
/// populated document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reference<T> {
    Id(String),
    Populated(T),
}

impl<T: Identified> Reference<T> {
    pub fn id(&self) -> &str {
        match self {
            Reference::Id(id) => id,
            Reference::Populated(doc) => doc.id(),
        }
    }

    pub fn populated(&self) -> Option<&T> {
        match self {
            Reference::Id(_) => None,
            Reference::Populated(doc) => Some(doc),
        }
    }
}

/// Minimal populated document: `{ _id, name }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedRef {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl Identified for NamedRef {
    fn id(&self) -> &str {
        &self.id
    }
}
