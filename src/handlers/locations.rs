use axum::{
    extract::{rejection::JsonRejection, Path, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use super::{message_response, parse_body, AppState, TagsQuery};
use crate::errors::ServiceError;
use crate::models::{Item, Location, LocationWrite};
use crate::services::locations;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationsResponse {
    pub locations: Vec<Location>,
    pub remaining_items: Vec<Item>,
}

#[derive(Debug, Serialize)]
pub struct LocationResponse {
    pub location: Location,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index_locations).post(create_location))
        .route(
            "/:id",
            get(get_location).put(update_location).delete(delete_location),
        )
}

async fn index_locations(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<impl IntoResponse, ServiceError> {
    let tags = TagsQuery::from_raw(query.as_deref()).tag_filter();
    let view = locations::get_locations(state.repo.as_ref(), tags).await?;
    Ok(Json(LocationsResponse {
        locations: view.locations,
        remaining_items: view.remaining_items,
    }))
}

async fn get_location(
    State(state): State<AppState>,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<impl IntoResponse, ServiceError> {
    let tags = TagsQuery::from_raw(query.as_deref()).tag_filter();
    let location = locations::get_location(state.repo.as_ref(), &id, tags).await?;
    Ok(Json(LocationResponse { location }))
}

async fn create_location(
    State(state): State<AppState>,
    payload: Result<Json<LocationWrite>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let body = parse_body(payload)?;
    locations::create_location(state.repo.as_ref(), &state.validator, &body.name).await?;
    Ok(message_response(StatusCode::CREATED))
}

async fn update_location(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<LocationWrite>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let body = parse_body(payload)?;
    locations::update_location(state.repo.as_ref(), &state.validator, &id, &body.name).await?;
    Ok(message_response(StatusCode::OK))
}

async fn delete_location(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    locations::delete_location(state.repo.as_ref(), &id).await?;
    Ok(message_response(StatusCode::OK))
}
