use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument};

use super::{new_id, ItemFilter, Repository, RepositoryError};
use crate::models::{Item, Location, WriteItemParams};

/// Operations that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    GetLocations,
    CreateLocation,
    UpdateLocation,
    DeleteLocation,
    /// Fails `delete_location` after items were detached but before the
    /// location is removed.
    DeleteLocationMidway,
    GetItems,
    CreateItem,
    UpdateItem,
    UpdateItemLocation,
    DeleteItem,
}

#[derive(Debug, Default, Clone)]
struct Store {
    locations: Vec<Location>,
    items: Vec<Item>,
}

/// Process-local backend for development and tests. Fetch order is insertion order.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    store: RwLock<Store>,
    faults: Mutex<HashSet<Fault>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call of the matching operation fail until cleared.
    pub async fn inject_fault(&self, fault: Fault) {
        self.faults.lock().await.insert(fault);
    }

    pub async fn clear_faults(&self) {
        self.faults.lock().await.clear();
    }

    async fn check(&self, fault: Fault) -> Result<(), RepositoryError> {
        if self.faults.lock().await.contains(&fault) {
            debug!(?fault, "tripping injected fault");
            return Err(RepositoryError::Fault(format!("{:?}", fault)));
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_locations(
        &self,
        ids: Option<Vec<String>>,
    ) -> Result<Vec<Location>, RepositoryError> {
        self.check(Fault::GetLocations).await?;
        let store = self.store.read().await;
        let locations = match ids {
            None => store.locations.clone(),
            Some(ids) => {
                let wanted: HashSet<String> = ids.into_iter().collect();
                store
                    .locations
                    .iter()
                    .filter(|l| wanted.contains(&l.id))
                    .cloned()
                    .collect()
            }
        };
        Ok(locations)
    }

    #[instrument(skip(self))]
    async fn create_location(&self, name: &str) -> Result<Location, RepositoryError> {
        self.check(Fault::CreateLocation).await?;
        let location = Location::new(new_id(), name);
        self.store.write().await.locations.push(location.clone());
        Ok(location)
    }

    #[instrument(skip(self))]
    async fn update_location(&self, id: &str, name: &str) -> Result<Location, RepositoryError> {
        self.check(Fault::UpdateLocation).await?;
        let mut store = self.store.write().await;
        let location = store
            .locations
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| RepositoryError::location_not_found(id))?;
        location.name = name.to_string();
        Ok(location.clone())
    }

    #[instrument(skip(self))]
    async fn delete_location(&self, id: &str) -> Result<(), RepositoryError> {
        self.check(Fault::DeleteLocation).await?;
        let mut store = self.store.write().await;

        // stage on a copy so a failure leaves the live store untouched
        let mut staged = store.clone();
        staged
            .items
            .iter_mut()
            .filter(|item| item.location_id.as_deref() == Some(id))
            .for_each(|item| item.location_id = None);

        self.check(Fault::DeleteLocationMidway).await?;

        staged.locations.retain(|l| l.id != id);
        *store = staged;
        Ok(())
    }

    async fn get_items(
        &self,
        tags: Option<Vec<String>>,
        location_ids: Option<Vec<String>>,
    ) -> Result<Vec<Item>, RepositoryError> {
        self.check(Fault::GetItems).await?;
        let filter = ItemFilter::new(tags, location_ids);
        let store = self.store.read().await;
        Ok(store
            .items
            .iter()
            .filter(|item| filter.matches(item))
            .cloned()
            .collect())
    }

    #[instrument(skip(self, params), fields(name = %params.name))]
    async fn create_item(&self, params: &WriteItemParams) -> Result<Item, RepositoryError> {
        self.check(Fault::CreateItem).await?;
        let item = Item::from_params(new_id(), params.clone());
        self.store.write().await.items.push(item.clone());
        Ok(item)
    }

    #[instrument(skip(self, params))]
    async fn update_item(
        &self,
        id: &str,
        params: &WriteItemParams,
    ) -> Result<Item, RepositoryError> {
        self.check(Fault::UpdateItem).await?;
        let mut store = self.store.write().await;
        let item = store
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| RepositoryError::item_not_found(id))?;
        item.apply(params.clone());
        Ok(item.clone())
    }

    #[instrument(skip(self))]
    async fn update_item_location(
        &self,
        id: &str,
        location_id: Option<String>,
    ) -> Result<Item, RepositoryError> {
        self.check(Fault::UpdateItemLocation).await?;
        let mut store = self.store.write().await;
        let item = store
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| RepositoryError::item_not_found(id))?;
        item.location_id = location_id;
        Ok(item.clone())
    }

    #[instrument(skip(self))]
    async fn delete_item(&self, id: &str) -> Result<(), RepositoryError> {
        self.check(Fault::DeleteItem).await?;
        self.store.write().await.items.retain(|i| i.id != id);
        Ok(())
    }
}
