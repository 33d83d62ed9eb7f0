use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::{ApiError, FieldError};
use crate::store::users::User;
use crate::AppState;

/// POST /api/v1/users — Save (upsert) a user profile.
#[derive(Debug, Deserialize)]
pub struct SaveUserRequest {
    pub uid: String,
    pub name: String,
    pub email: String,
    #[serde(rename = "photoURL", default)]
    pub photo_url: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", post(save_user).get(list_users))
        .route("/users/{uid}", get(get_user))
}

async fn save_user(
    State(state): State<AppState>,
    Json(body): Json<SaveUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    // --- Validation ---
    let mut errors: Vec<FieldError> = Vec::new();

    let uid = body.uid.trim().to_string();
    if uid.is_empty() {
        errors.push(FieldError {
            field: "uid".into(),
            message: "uid is required".into(),
        });
    }

    // Name: 1–64 chars
    let name = body.name.trim().to_string();
    if name.is_empty() || name.len() > 64 {
        errors.push(FieldError {
            field: "name".into(),
            message: "Name must be 1–64 characters".into(),
        });
    }

    // Email: basic shape check
    let email = body.email.trim().to_lowercase();
    if !email.contains('@') || email.len() < 3 {
        errors.push(FieldError {
            field: "email".into(),
            message: "Invalid email address".into(),
        });
    }

    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let photo_url = body.photo_url.unwrap_or_default();
    let user = state.users.upsert(&uid, &name, &email, &photo_url).await?;

    tracing::info!(uid = %user.uid, "user profile saved");

    Ok((StatusCode::CREATED, Json(user)))
}

async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<User>>, ApiError> {
    let users = state.users.list_excluding(&auth.uid).await?;
    Ok(Json(users))
}

async fn get_user(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(uid): Path<String>,
) -> Result<Json<User>, ApiError> {
    let user = state
        .users
        .get_by_uid(&uid)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(user))
}
