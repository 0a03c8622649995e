use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::db::models::DogRecord;
use crate::error::{AppError, AppResult};
use crate::extractors::AdminUser;
use crate::routes::records::DEFAULT_USER_ID;
use crate::services::token_status::{new_dog_record, refresh_patch};
use crate::services::{filter_dog_records, RecordQuery};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/dog-records", get(list).post(create))
        .route("/api/dog-records/{id}", get(show).put(refresh).delete(remove))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackTokenRequest {
    ca: Option<String>,
    user_id: Option<i64>,
    username: Option<String>,
}

fn not_found() -> AppError {
    AppError::NotFound("Record not found".into())
}

/// GET /api/dog-records
async fn list(
    State(state): State<AppState>,
    query: Result<Query<RecordQuery>, QueryRejection>,
) -> AppResult<Json<Vec<DogRecord>>> {
    let Query(query) = query?;
    let records = state.store.dog_records().await?;
    Ok(Json(filter_dog_records(records, &query)))
}

/// POST /api/dog-records
async fn create(
    State(state): State<AppState>,
    admin: AdminUser,
    payload: Result<Json<TrackTokenRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<DogRecord>)> {
    let Json(req) = payload?;
    let ca = req
        .ca
        .map(|ca| ca.trim().to_string())
        .filter(|ca| !ca.is_empty())
        .ok_or_else(|| AppError::BadRequest("ca is required".into()))?;

    // Duplicates are rejected before the token is quoted.
    let taken = state
        .store
        .dog_records()
        .await?
        .iter()
        .any(|r| r.ca == ca);
    if taken {
        return Err(AppError::Conflict("CA address already exists".into()));
    }

    let quote = state
        .price_feed
        .quote(&ca)
        .await
        .map_err(|e| AppError::Internal(format!("price feed: {e}")))?;
    let username = req
        .username
        .filter(|u| !u.trim().is_empty())
        .unwrap_or(admin.username);
    let new = new_dog_record(ca, req.user_id.unwrap_or(DEFAULT_USER_ID), username, quote);

    let record = state.store.create_dog_record(new).await?;
    tracing::info!(
        "Tracking token {} as {} ({})",
        record.ca,
        record.id,
        record.status.as_str()
    );
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/dog-records/{id}
async fn show(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<DogRecord>> {
    let Path(id) = path?;
    state.store.dog_record(id).await?.map(Json).ok_or_else(not_found)
}

/// PUT /api/dog-records/{id}: re-quote the token and reclassify it.
async fn refresh(
    State(state): State<AppState>,
    _admin: AdminUser,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<DogRecord>> {
    let Path(id) = path?;
    let current = state.store.dog_record(id).await?.ok_or_else(not_found)?;
    let quote = state
        .price_feed
        .quote(&current.ca)
        .await
        .map_err(|e| AppError::Internal(format!("price feed: {e}")))?;

    let record = state
        .store
        .update_dog_record(id, refresh_patch(quote))
        .await?
        .ok_or_else(not_found)?;
    tracing::info!("Refreshed token {}: {}", record.ca, record.status.as_str());
    Ok(Json(record))
}

/// DELETE /api/dog-records/{id}
async fn remove(
    State(state): State<AppState>,
    _admin: AdminUser,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<serde_json::Value>> {
    let Path(id) = path?;
    if !state.store.delete_dog_record(id).await? {
        return Err(not_found());
    }
    tracing::info!("Deleted dog record {}", id);
    Ok(Json(json!({ "message": "Dog record deleted successfully" })))
}
