use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    Set, TransactionTrait,
};
use tracing::{debug, instrument};

use super::{new_id, ItemFilter, Repository, RepositoryError};
use crate::entities::{item, location};
use crate::models::{Item, Location, WriteItemParams};

/// Relational backend over the `locations` and `items` tables.
#[derive(Debug, Clone)]
pub struct SqlRepository {
    db: DatabaseConnection,
}

impl SqlRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Repository for SqlRepository {
    async fn get_locations(
        &self,
        ids: Option<Vec<String>>,
    ) -> Result<Vec<Location>, RepositoryError> {
        let mut query = location::Entity::find().order_by_asc(location::Column::Id);
        if let Some(ids) = ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            query = query.filter(location::Column::Id.is_in(ids));
        }

        let models = query.all(&self.db).await?;
        Ok(models.into_iter().map(Location::from).collect())
    }

    #[instrument(skip(self))]
    async fn create_location(&self, name: &str) -> Result<Location, RepositoryError> {
        let model = location::ActiveModel {
            id: Set(new_id()),
            name: Set(name.to_string()),
        }
        .insert(&self.db)
        .await?;
        Ok(model.into())
    }

    #[instrument(skip(self))]
    async fn update_location(&self, id: &str, name: &str) -> Result<Location, RepositoryError> {
        let result = location::Entity::update_many()
            .col_expr(location::Column::Name, Expr::value(name.to_string()))
            .filter(location::Column::Id.eq(id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::location_not_found(id));
        }
        Ok(Location::new(id, name))
    }

    #[instrument(skip(self))]
    async fn delete_location(&self, id: &str) -> Result<(), RepositoryError> {
        let txn = self.db.begin().await?;

        let detached = item::Entity::update_many()
            .col_expr(item::Column::LocationId, Expr::value(Option::<String>::None))
            .filter(item::Column::LocationId.eq(id))
            .exec(&txn)
            .await?;

        location::Entity::delete_by_id(id.to_string())
            .exec(&txn)
            .await?;

        txn.commit().await?;
        debug!(detached = detached.rows_affected, "location deleted");
        Ok(())
    }

    async fn get_items(
        &self,
        tags: Option<Vec<String>>,
        location_ids: Option<Vec<String>>,
    ) -> Result<Vec<Item>, RepositoryError> {
        let mut query = item::Entity::find().order_by_asc(item::Column::Id);
        if let Some(ids) = &location_ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            query = query.filter(item::Column::LocationId.is_in(ids.clone()));
        }

        // tags live in a JSON column, so the tag predicate runs here
        let filter = ItemFilter::new(tags, location_ids);
        let mut items = Vec::new();
        for model in query.all(&self.db).await? {
            let item = model.into_item()?;
            if filter.matches(&item) {
                items.push(item);
            }
        }
        Ok(items)
    }

    #[instrument(skip(self, params), fields(name = %params.name))]
    async fn create_item(&self, params: &WriteItemParams) -> Result<Item, RepositoryError> {
        let model = item::ActiveModel::from_params(&new_id(), params)?
            .insert(&self.db)
            .await?;
        Ok(model.into_item()?)
    }

    #[instrument(skip(self, params))]
    async fn update_item(
        &self,
        id: &str,
        params: &WriteItemParams,
    ) -> Result<Item, RepositoryError> {
        let result = item::Entity::update_many()
            .set(item::ActiveModel::from_params(id, params)?)
            .filter(item::Column::Id.eq(id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::item_not_found(id));
        }
        Ok(Item::from_params(id, params.clone()))
    }

    #[instrument(skip(self))]
    async fn update_item_location(
        &self,
        id: &str,
        location_id: Option<String>,
    ) -> Result<Item, RepositoryError> {
        let model = item::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await?
            .ok_or_else(|| RepositoryError::item_not_found(id))?;

        let mut active: item::ActiveModel = model.into();
        active.location_id = Set(location_id);
        let updated = active.update(&self.db).await?;
        Ok(updated.into_item()?)
    }

    #[instrument(skip(self))]
    async fn delete_item(&self, id: &str) -> Result<(), RepositoryError> {
        item::Entity::delete_by_id(id.to_string())
            .exec(&self.db)
            .await?;
        Ok(())
    }
}
