//! Account endpoints: profile and stored DashScope API key.
//!
//! The stored key is write-only over HTTP; status reads report presence as a
//! boolean and no endpoint ever echoes the key back.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};

use wayfarer_db::queries::users;

use super::{ApiError, AppState, CurrentUser, parse_body};

pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<Value> {
    Json(json!({
        "success": true,
        "user": {
            "id": user.id,
            "name": user.name,
            "email": user.email,
        },
    }))
}

#[derive(Deserialize)]
struct UpdateMeBody {
    name: Option<String>,
}

pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let body: UpdateMeBody = parse_body(body)?;
    let name = body
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::bad_request("Name is required"))?;

    let updated = users::update_user_name(&state.pool, user.id, name)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(json!({
        "success": true,
        "user": {
            "id": updated.id,
            "name": updated.name,
            "email": updated.email,
        },
    }))
    .into_response())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveApiKeyBody {
    api_key: Option<String>,
}

pub async fn save_api_key(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let body: SaveApiKeyBody = parse_body(body)?;
    let api_key = body
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| ApiError::bad_request("API key is required"))?;

    let saved = users::set_dashscope_key(&state.pool, user.id, api_key)
        .await
        .map_err(ApiError::internal)?;
    if !saved {
        return Err(ApiError::not_found("User not found"));
    }

    tracing::info!(user_id = %user.id, "stored DashScope API key updated");

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "API key saved",
            "saved": true,
        })),
    )
        .into_response())
}

pub async fn api_key_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Response, ApiError> {
    let stored = users::get_dashscope_key(&state.pool, user.id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let has_api_key = stored.as_deref().is_some_and(|key| !key.is_empty());

    Ok(Json(json!({
        "success": true,
        "hasApiKey": has_api_key,
    }))
    .into_response())
}
