use std::collections::HashMap;
use tracing::instrument;

use crate::errors::ServiceError;
use crate::models::{Item, WriteItemParams};
use crate::repositories::Repository;
use crate::validation::InputValidator;

#[instrument(skip(repo, validator, params), fields(name = %params.name))]
pub async fn create_item(
    repo: &dyn Repository,
    validator: &InputValidator,
    params: &WriteItemParams,
) -> Result<Item, ServiceError> {
    validator.validate_item(params)?;
    repo.create_item(params)
        .await
        .map_err(|e| ServiceError::storage("create item", e))
}

#[instrument(skip(repo, validator, params))]
pub async fn update_item(
    repo: &dyn Repository,
    validator: &InputValidator,
    id: &str,
    params: &WriteItemParams,
) -> Result<Item, ServiceError> {
    validator.validate_item(params)?;
    repo.update_item(id, params)
        .await
        .map_err(|e| ServiceError::storage("update item", e))
}

#[instrument(skip(repo))]
pub async fn update_item_location(
    repo: &dyn Repository,
    id: &str,
    location_id: Option<String>,
) -> Result<Item, ServiceError> {
    repo.update_item_location(id, location_id)
        .await
        .map_err(|e| ServiceError::storage("update item location", e))
}

#[instrument(skip(repo))]
pub async fn delete_item(repo: &dyn Repository, id: &str) -> Result<(), ServiceError> {
    repo.delete_item(id)
        .await
        .map_err(|e| ServiceError::storage("delete item", e))
}

/// Items matching `tags`, each carrying its location when that location exists.
#[instrument(skip(repo))]
pub async fn list_items(
    repo: &dyn Repository,
    tags: Option<Vec<String>>,
) -> Result<Vec<Item>, ServiceError> {
    let locations = repo
        .get_locations(None)
        .await
        .map_err(|e| ServiceError::storage("get locations", e))?;
    let items = repo
        .get_items(tags, None)
        .await
        .map_err(|e| ServiceError::storage("get items", e))?;

    let by_id: HashMap<String, _> = locations.into_iter().map(|l| (l.id.clone(), l)).collect();
    Ok(items
        .into_iter()
        .map(|mut item| {
            item.location = item
                .location_id
                .as_ref()
                .and_then(|id| by_id.get(id))
                .map(|l| Box::new(l.clone()));
            item
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::item::fixtures::item;
    use crate::models::Location;
    use crate::repositories::{MockRepository, RepositoryError};
    use assert_matches::assert_matches;
    use chrono::Utc;

    fn params(name: &str) -> WriteItemParams {
        WriteItemParams {
            name: name.into(),
            item_type: None,
            tags: vec!["veg".into()],
            price: None,
            image_url: None,
            bought_at: Utc::now(),
            opened_at: None,
            expires_at: None,
            lifespan: None,
            location_id: None,
        }
    }

    #[tokio::test]
    async fn invalid_item_never_reaches_repository() {
        let mut repo = MockRepository::new();
        repo.expect_create_item().never();
        repo.expect_update_item().never();
        let validator = InputValidator::new();

        assert_matches!(
            create_item(&repo, &validator, &params("P")).await,
            Err(ServiceError::ValidationError(_))
        );
        let negative = WriteItemParams {
            price: Some(-5),
            ..params("Potato")
        };
        assert_matches!(
            update_item(&repo, &validator, "potato", &negative).await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn valid_item_is_created() {
        let mut repo = MockRepository::new();
        repo.expect_create_item()
            .times(1)
            .returning(|p| Ok(Item::from_params("new-id", p.clone())));

        let created = create_item(&repo, &InputValidator::new(), &params("Potato"))
            .await
            .unwrap();
        assert_eq!(created.id, "new-id");
    }

    #[tokio::test]
    async fn moving_unknown_item_is_not_found() {
        let mut repo = MockRepository::new();
        repo.expect_update_item_location()
            .returning(|id, _| Err(RepositoryError::item_not_found(id)));

        let result = update_item_location(&repo, "ghost", Some("pantry".into())).await;
        assert_matches!(result, Err(ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn listing_embeds_known_locations_only() {
        let mut repo = MockRepository::new();
        repo.expect_get_locations()
            .returning(|_| Ok(vec![Location::new("pantry", "Pantry")]));
        repo.expect_get_items().returning(|_, _| {
            Ok(vec![
                item("potato", "Potato", Some("pantry")),
                item("ghost", "Ghost", Some("attic")),
                item("salt", "Salt", None),
            ])
        });

        let items = list_items(&repo, None).await.unwrap();
        assert_eq!(items[0].location.as_ref().map(|l| l.name.as_str()), Some("Pantry"));
        assert!(items[1].location.is_none());
        assert!(items[2].location.is_none());
    }
}
