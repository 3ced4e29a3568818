use super::{read_body, read_data};
use crate::error::{ClientError, Result};
use crate::http_client::SecureClient;
use crate::models::profile::Profile;
use crate::models::property::{Building, BuildingInput, Flat, FlatInput};

fn require_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ClientError::Validation("name is required".to_string()));
    }
    Ok(name)
}

pub async fn buildings(client: &SecureClient) -> Result<Vec<Building>> {
    read_data(client.get("/buildings").await?).await
}

pub async fn create_building(client: &SecureClient, name: &str) -> Result<()> {
    let body = BuildingInput {
        name: require_name(name)?,
    };
    read_body(client.post("/buildings", &body).await?).await?;
    Ok(())
}

pub async fn update_building(client: &SecureClient, id: &str, name: &str) -> Result<()> {
    let body = BuildingInput {
        name: require_name(name)?,
    };
    read_body(client.patch(&format!("/buildings/{}", id), &body).await?).await?;
    Ok(())
}

pub async fn delete_building(client: &SecureClient, id: &str) -> Result<()> {
    read_body(client.delete(&format!("/buildings/{}", id)).await?).await?;
    Ok(())
}

pub async fn flats(client: &SecureClient) -> Result<Vec<Flat>> {
    read_data(client.get("/flats").await?).await
}

pub async fn create_flat(client: &SecureClient, building_id: &str, name: &str) -> Result<()> {
    let body = FlatInput {
        building_id,
        name: require_name(name)?,
    };
    read_body(client.post("/flats", &body).await?).await?;
    Ok(())
}

pub async fn update_flat(
    client: &SecureClient,
    id: &str,
    building_id: &str,
    name: &str,
) -> Result<()> {
    let body = FlatInput {
        building_id,
        name: require_name(name)?,
    };
    read_body(client.patch(&format!("/flats/{}", id), &body).await?).await?;
    Ok(())
}

pub async fn delete_flat(client: &SecureClient, id: &str) -> Result<()> {
    read_body(client.delete(&format!("/flats/{}", id)).await?).await?;
    Ok(())
}

/// Residents whose profile points at `building_id`
pub fn resident_count(profiles: &[Profile], building_id: &str) -> usize {
    profiles
        .iter()
        .filter(|p| p.building() == Some(building_id))
        .count()
}

pub fn flat_residents<'a>(profiles: &'a [Profile], flat_id: &str) -> Vec<&'a Profile> {
    profiles
        .iter()
        .filter(|p| p.flat() == Some(flat_id))
        .collect()
}

/// Flats belonging to `building_id`
pub fn flats_in<'a>(flats: &'a [Flat], building_id: &str) -> Vec<&'a Flat> {
    flats
        .iter()
        .filter(|f| f.building_id.id() == building_id)
        .collect()
}
