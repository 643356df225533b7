//! Storage contract for locations and items, plus the backends implementing it.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

use crate::config::AppConfig;
use crate::models::{Item, Location, WriteItemParams};

pub mod in_memory;
pub mod kv;
pub mod sql;

pub use in_memory::{Fault, InMemoryRepository};
pub use kv::KvRepository;
pub use sql::SqlRepository;

/// Failures raised by a storage backend.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("key-value store error: {0}")]
    KeyValue(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("injected fault: {0}")]
    Fault(String),
}

impl RepositoryError {
    pub fn location_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "location",
            id: id.into(),
        }
    }

    pub fn item_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "item",
            id: id.into(),
        }
    }
}

/// Storage-agnostic access to locations and items.
///
/// `None` filters mean "no restriction"; `Some(vec![])` matches nothing.
/// Updates of unknown ids fail with [`RepositoryError::NotFound`]; deletes of
/// unknown ids succeed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Repository: Send + Sync {
    async fn get_locations(&self, ids: Option<Vec<String>>)
        -> Result<Vec<Location>, RepositoryError>;

    async fn create_location(&self, name: &str) -> Result<Location, RepositoryError>;

    async fn update_location(&self, id: &str, name: &str) -> Result<Location, RepositoryError>;

    /// Clears `location_id` on every referencing item and removes the location,
    /// as one all-or-nothing step.
    async fn delete_location(&self, id: &str) -> Result<(), RepositoryError>;

    async fn get_items(
        &self,
        tags: Option<Vec<String>>,
        location_ids: Option<Vec<String>>,
    ) -> Result<Vec<Item>, RepositoryError>;

    async fn create_item(&self, params: &WriteItemParams) -> Result<Item, RepositoryError>;

    async fn update_item(
        &self,
        id: &str,
        params: &WriteItemParams,
    ) -> Result<Item, RepositoryError>;

    async fn update_item_location(
        &self,
        id: &str,
        location_id: Option<String>,
    ) -> Result<Item, RepositoryError>;

    async fn delete_item(&self, id: &str) -> Result<(), RepositoryError>;
}

/// In-process item filter used by backends that cannot push the predicate down.
#[derive(Debug, Default, Clone)]
pub struct ItemFilter {
    tags: Option<HashSet<String>>,
    location_ids: Option<HashSet<String>>,
}

impl ItemFilter {
    pub fn new(tags: Option<Vec<String>>, location_ids: Option<Vec<String>>) -> Self {
        Self {
            tags: tags.map(|t| t.into_iter().collect()),
            location_ids: location_ids.map(|l| l.into_iter().collect()),
        }
    }

    /// Tags match when the item carries any listed tag; locations match when the
    /// item's location is listed. A missing location never matches a location filter.
    pub fn matches(&self, item: &Item) -> bool {
        let tags_ok = self
            .tags
            .as_ref()
            .map_or(true, |wanted| item.tags.iter().any(|t| wanted.contains(t)));

        let location_ok = self.location_ids.as_ref().map_or(true, |wanted| {
            item.location_id
                .as_ref()
                .map_or(false, |id| wanted.contains(id))
        });

        tags_ok && location_ok
    }
}

/// Generates a fresh record identifier.
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Builds the backend selected by `storage_backend`.
pub async fn build_repository(config: &AppConfig) -> anyhow::Result<Arc<dyn Repository>> {
    match config.storage_backend.to_lowercase().as_str() {
        "sql" => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("database_url is required for the sql backend"))?;
            let db = crate::db::establish_connection(
                url,
                config.db_max_connections,
                config.db_connect_timeout_secs,
            )
            .await?;
            if config.auto_migrate {
                crate::db::run_migrations(&db).await?;
            }
            Ok(Arc::new(SqlRepository::new(db)))
        }
        "redis" => {
            let repo = KvRepository::connect(&config.redis_url, &config.redis_namespace).await?;
            Ok(Arc::new(repo))
        }
        _ => Ok(Arc::new(InMemoryRepository::new())),
    }
}
