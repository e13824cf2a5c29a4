use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use super::UsersState;
use super::error::{ApiError, ResultExt, validate_uuid};
use crate::auth::Auth;
use crate::db::{ProfileUpdate, User, is_unique_violation};
use crate::validation::{normalize_email, normalize_username};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserProfile {
    id: String,
    username: String,
    email: String,
    created_at: String,
    updated_at: String,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.uuid,
            username: user.username,
            email: user.email,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Deserialize)]
pub(super) struct UpdateUserRequest {
    username: Option<String>,
    email: Option<String>,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

pub(super) async fn list_users(
    State(state): State<UsersState>,
    Auth(_): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let users = state
        .db
        .users()
        .list()
        .await
        .db_err("Failed to list users")?;

    Ok(Json(
        users.into_iter().map(UserProfile::from).collect::<Vec<_>>(),
    ))
}

pub(super) async fn get_user(
    State(state): State<UsersState>,
    Auth(_): Auth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&id)?;

    let user = state
        .db
        .users()
        .get_by_uuid(&id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(UserProfile::from(user)))
}

pub(super) async fn update_user(
    State(state): State<UsersState>,
    Auth(auth): Auth,
    Path(id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&id)?;
    if !auth.is(&id) {
        return Err(ApiError::forbidden("Not authorized to update this user"));
    }
    let Json(payload) = payload?;

    let username = payload
        .username
        .as_deref()
        .map(normalize_username)
        .transpose()
        .map_err(ApiError::bad_request)?;
    let email = payload
        .email
        .as_deref()
        .map(normalize_email)
        .transpose()
        .map_err(ApiError::bad_request)?;

    let update = ProfileUpdate {
        username,
        email: email.as_deref(),
    };

    let user = state
        .db
        .users()
        .update_profile(auth.user.id, update)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::bad_request("User with this email or username already exists")
            } else {
                ApiError::db_error("Failed to update user", e)
            }
        })?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    tracing::info!(user = %user.uuid, "Profile updated");
    Ok(Json(UserProfile::from(user)))
}

pub(super) async fn delete_user(
    State(state): State<UsersState>,
    Auth(auth): Auth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&id)?;
    if !auth.is(&id) {
        return Err(ApiError::forbidden("Not authorized to delete this user"));
    }

    let deleted = state
        .db
        .users()
        .delete(auth.user.id)
        .await
        .db_err("Failed to delete user")?;

    if !deleted {
        return Err(ApiError::not_found("User not found"));
    }

    tracing::info!(user = %id, "User deleted");
    Ok(Json(MessageResponse {
        message: "User deleted successfully",
    }))
}
