use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::db::models::{Comment, NewComment, RecordKind};
use crate::error::{AppError, AppResult};
use crate::extractors::AdminUser;
use crate::services::{filter_comments, CommentQuery};
use crate::state::AppState;

const MAX_COMMENT_CHARS: usize = 2000;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/comments", get(list).post(create).delete(remove))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCommentRequest {
    record_id: Option<i64>,
    record_type: Option<RecordKind>,
    username: Option<String>,
    content: Option<String>,
}

#[derive(Deserialize)]
struct DeleteQuery {
    id: Option<i64>,
}

fn missing_fields() -> AppError {
    AppError::BadRequest("Missing required fields".into())
}

/// GET /api/comments
async fn list(
    State(state): State<AppState>,
    query: Result<Query<CommentQuery>, QueryRejection>,
) -> AppResult<Json<Vec<Comment>>> {
    let Query(query) = query?;
    let comments = match (query.record_id, query.record_type) {
        (Some(id), Some(kind)) => state.store.comments_by_record(id, kind).await?,
        _ => filter_comments(state.store.comments().await?, &query),
    };
    Ok(Json(comments))
}

/// POST /api/comments
async fn create(
    State(state): State<AppState>,
    payload: Result<Json<CreateCommentRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Comment>)> {
    let Json(req) = payload?;
    let record_id = req.record_id.ok_or_else(missing_fields)?;
    let record_type = req.record_type.ok_or_else(missing_fields)?;
    let username = req
        .username
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(missing_fields)?;
    let content = req
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(missing_fields)?;
    if content.chars().count() > MAX_COMMENT_CHARS {
        return Err(AppError::BadRequest(format!(
            "Comment must be at most {} characters",
            MAX_COMMENT_CHARS
        )));
    }

    let comment = state
        .store
        .create_comment(NewComment {
            record_id,
            record_type,
            username,
            content,
        })
        .await?;
    tracing::info!(
        "Comment {} added to {} {}",
        comment.id,
        comment.record_type.as_str(),
        comment.record_id
    );
    Ok((StatusCode::CREATED, Json(comment)))
}

/// DELETE /api/comments?id=
async fn remove(
    State(state): State<AppState>,
    _admin: AdminUser,
    query: Result<Query<DeleteQuery>, QueryRejection>,
) -> AppResult<Json<serde_json::Value>> {
    let Query(query) = query?;
    let id = query
        .id
        .ok_or_else(|| AppError::BadRequest("Comment ID is required".into()))?;

    if !state.store.delete_comment(id).await? {
        return Err(AppError::NotFound("Comment not found".into()));
    }
    tracing::info!("Deleted comment {}", id);
    Ok(Json(json!({ "message": "Comment deleted successfully" })))
}
