use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::extractors::AdminUser;
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 6;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/login", post(login))
        .route("/api/admin/logout", post(logout))
        .route("/api/admin/change-password", post(change_password))
}

#[derive(Deserialize)]
struct LoginRequest {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest {
    current_password: Option<String>,
    new_password: Option<String>,
}

// -- Cookie helpers --

fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        name,
        token,
        max_age_hours.saturating_mul(3600)
    )
}

fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", name)
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// POST /api/admin/login
async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(req) = payload?;
    let (Some(username), Some(password)) = (required(req.username), required(req.password))
    else {
        return Err(AppError::BadRequest(
            "Username and password are required".into(),
        ));
    };

    if !state.store.validate_admin(&username, &password).await? {
        tracing::warn!("Failed admin login for {}", username);
        return Err(AppError::Unauthorized);
    }

    let token = state.sessions.lock().await.create(&username);
    tracing::info!("Admin {} logged in", username);

    let auth = &state.config.auth;
    let cookie = session_cookie(&auth.cookie_name, &token, auth.session_hours);
    let body = json!({
        "success": true,
        "message": "Login successful",
        "token": token,
        "user": { "username": username, "isAdmin": true },
    });

    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// POST /api/admin/logout
async fn logout(State(state): State<AppState>, admin: AdminUser) -> AppResult<Response> {
    state.sessions.lock().await.revoke(&admin.token);
    tracing::info!("Admin {} logged out", admin.username);

    Ok((
        [(
            header::SET_COOKIE,
            clear_session_cookie(&state.config.auth.cookie_name),
        )],
        Json(json!({ "success": true })),
    )
        .into_response())
}

/// POST /api/admin/change-password
async fn change_password(
    State(state): State<AppState>,
    admin: AdminUser,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> AppResult<Json<serde_json::Value>> {
    let Json(req) = payload?;
    let (Some(current), Some(new)) = (
        required(req.current_password),
        required(req.new_password),
    ) else {
        return Err(AppError::BadRequest(
            "Current and new password are required".into(),
        ));
    };
    if new.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "New password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    if !state.store.update_admin_password(&current, &new).await? {
        return Err(AppError::BadRequest("Current password is incorrect".into()));
    }

    let revoked = state
        .sessions
        .lock()
        .await
        .revoke_all_except(&admin.username, &admin.token);
    tracing::info!(
        "Admin password changed, {} other session(s) revoked",
        revoked
    );

    Ok(Json(json!({
        "success": true,
        "message": "Password changed",
    })))
}
