use axum::{
    extract::{rejection::JsonRejection, Path, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::{message_response, parse_body, AppState, TagsQuery};
use crate::errors::ServiceError;
use crate::models::{Item, WriteItemParams};
use crate::services::items;

#[derive(Debug, Serialize)]
pub struct ItemsResponse {
    pub items: Vec<Item>,
}

/// Body of `PATCH /items/:id/location`; `null` detaches the item.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemLocationBody {
    #[serde(default)]
    pub location_id: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_items).post(create_item))
        .route("/:id", put(update_item).delete(delete_item))
        .route("/:id/location", patch(update_item_location))
}

async fn list_items(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<impl IntoResponse, ServiceError> {
    let tags = TagsQuery::from_raw(query.as_deref()).tag_filter();
    let items = items::list_items(state.repo.as_ref(), tags).await?;
    Ok(Json(ItemsResponse { items }))
}

async fn create_item(
    State(state): State<AppState>,
    payload: Result<Json<WriteItemParams>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let params = parse_body(payload)?;
    items::create_item(state.repo.as_ref(), &state.validator, &params).await?;
    Ok(message_response(StatusCode::CREATED))
}

async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<WriteItemParams>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let params = parse_body(payload)?;
    items::update_item(state.repo.as_ref(), &state.validator, &id, &params).await?;
    Ok(message_response(StatusCode::OK))
}

async fn update_item_location(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ItemLocationBody>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let body = parse_body(payload)?;
    items::update_item_location(state.repo.as_ref(), &id, body.location_id).await?;
    Ok(message_response(StatusCode::OK))
}

async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    items::delete_item(state.repo.as_ref(), &id).await?;
    Ok(message_response(StatusCode::OK))
}
