use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::db::models::{AirdropPatch, AirdropRecord, AirdropStatus, Difficulty, NewAirdropRecord};
use crate::error::{AppError, AppResult};
use crate::extractors::AdminUser;
use crate::services::{filter_records, RecordQuery};
use crate::state::AppState;

pub(crate) const DEFAULT_USER_ID: i64 = 1;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/records", get(list).post(create))
        .route("/api/records/{id}", get(show).put(update).delete(remove))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRecordRequest {
    user_id: Option<i64>,
    username: Option<String>,
    project: Option<String>,
    platform: Option<String>,
    #[serde(default)]
    status: AirdropStatus,
    #[serde(default)]
    reward: String,
    #[serde(default)]
    difficulty: Difficulty,
    #[serde(default)]
    description: String,
    final_reward: Option<f64>,
    #[serde(default)]
    funding: String,
}

fn require_text(field: &str, value: Option<String>) -> AppResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::BadRequest(format!("{} is required", field))),
    }
}

fn check_reward(value: f64) -> AppResult<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(AppError::BadRequest(
            "finalReward must be a non-negative number".into(),
        ))
    }
}

/// GET /api/records
async fn list(
    State(state): State<AppState>,
    query: Result<Query<RecordQuery>, QueryRejection>,
) -> AppResult<Json<Vec<AirdropRecord>>> {
    let Query(query) = query?;
    let records = state.store.records().await?;
    Ok(Json(filter_records(records, &query)))
}

/// POST /api/records
async fn create(
    State(state): State<AppState>,
    admin: AdminUser,
    payload: Result<Json<CreateRecordRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<AirdropRecord>)> {
    let Json(req) = payload?;
    let new = NewAirdropRecord {
        user_id: req.user_id.unwrap_or(DEFAULT_USER_ID),
        username: req
            .username
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(admin.username),
        project: require_text("project", req.project)?,
        platform: require_text("platform", req.platform)?,
        status: req.status,
        reward: req.reward,
        difficulty: req.difficulty,
        description: req.description,
        final_reward: check_reward(req.final_reward.unwrap_or(0.0))?,
        funding: req.funding,
    };

    let record = state.store.create_record(new).await?;
    tracing::info!("Created airdrop record {} ({})", record.id, record.project);
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/records/{id}
async fn show(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<AirdropRecord>> {
    let Path(id) = path?;
    state
        .store
        .record(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Record not found".into()))
}

/// PUT /api/records/{id}
async fn update(
    State(state): State<AppState>,
    _admin: AdminUser,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<AirdropPatch>, JsonRejection>,
) -> AppResult<Json<AirdropRecord>> {
    let Path(id) = path?;
    let Json(patch) = payload?;
    if let Some(project) = &patch.project {
        require_text("project", Some(project.clone()))?;
    }
    if let Some(platform) = &patch.platform {
        require_text("platform", Some(platform.clone()))?;
    }
    if let Some(reward) = patch.final_reward {
        check_reward(reward)?;
    }

    state
        .store
        .update_record(id, patch)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Record not found".into()))
}

/// DELETE /api/records/{id}
async fn remove(
    State(state): State<AppState>,
    _admin: AdminUser,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<serde_json::Value>> {
    let Path(id) = path?;
    if !state.store.delete_record(id).await? {
        return Err(AppError::NotFound("Record not found".into()));
    }
    tracing::info!("Deleted airdrop record {}", id);
    Ok(Json(json!({ "message": "Record deleted successfully" })))
}
