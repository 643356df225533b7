use std::collections::HashMap;
use tracing::{debug, instrument};

use crate::errors::ServiceError;
use crate::models::{Item, Location};
use crate::repositories::Repository;
use crate::validation::InputValidator;

/// Locations with their items attached, plus the items assigned nowhere.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocationsView {
    pub locations: Vec<Location>,
    pub remaining_items: Vec<Item>,
}

/// Fetches locations and matching items, then nests each item under its location.
///
/// Items referencing a location outside the fetched set are left out.
#[instrument(skip(repo))]
pub async fn assemble_locations(
    repo: &dyn Repository,
    ids: Option<Vec<String>>,
    tags: Option<Vec<String>>,
) -> Result<LocationsView, ServiceError> {
    let locations = repo
        .get_locations(ids.clone())
        .await
        .map_err(|e| ServiceError::storage("get locations", e))?;

    let items = repo
        .get_items(tags, ids)
        .await
        .map_err(|e| ServiceError::storage("get items", e))?;

    Ok(fill_locations(locations, items))
}

pub(crate) fn fill_locations(mut locations: Vec<Location>, items: Vec<Item>) -> LocationsView {
    let index: HashMap<String, usize> = locations
        .iter()
        .enumerate()
        .map(|(pos, location)| (location.id.clone(), pos))
        .collect();

    let mut remaining_items = Vec::new();
    for item in items {
        let Some(location_id) = item.location_id.as_deref() else {
            remaining_items.push(item);
            continue;
        };
        match index.get(location_id) {
            Some(&pos) => locations[pos].items.push(item),
            None => debug!(item = %item.id, location = %location_id, "dropping item with unknown location"),
        }
    }

    LocationsView {
        locations,
        remaining_items,
    }
}

pub async fn get_locations(
    repo: &dyn Repository,
    tags: Option<Vec<String>>,
) -> Result<LocationsView, ServiceError> {
    assemble_locations(repo, None, tags).await
}

pub async fn get_location(
    repo: &dyn Repository,
    id: &str,
    tags: Option<Vec<String>>,
) -> Result<Location, ServiceError> {
    let view = assemble_locations(repo, Some(vec![id.to_string()]), tags).await?;
    view.locations
        .into_iter()
        .next()
        .ok_or_else(|| ServiceError::NotFound(format!("location {} does not exist", id)))
}

#[instrument(skip(repo, validator))]
pub async fn create_location(
    repo: &dyn Repository,
    validator: &InputValidator,
    name: &str,
) -> Result<Location, ServiceError> {
    validator.validate_location_name(name)?;
    repo.create_location(name)
        .await
        .map_err(|e| ServiceError::storage("create location", e))
}

#[instrument(skip(repo, validator))]
pub async fn update_location(
    repo: &dyn Repository,
    validator: &InputValidator,
    id: &str,
    name: &str,
) -> Result<Location, ServiceError> {
    validator.validate_location_name(name)?;
    repo.update_location(id, name)
        .await
        .map_err(|e| ServiceError::storage("update location", e))
}

#[instrument(skip(repo))]
pub async fn delete_location(repo: &dyn Repository, id: &str) -> Result<(), ServiceError> {
    repo.delete_location(id)
        .await
        .map_err(|e| ServiceError::storage("delete location", e))
}
