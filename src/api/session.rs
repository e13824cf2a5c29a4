use axum::{
    Json,
    body::Bytes,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use super::UsersState;
use super::error::ApiError;
use crate::auth::Auth;
use crate::db::User;
use crate::session::TokenPair;

#[derive(Deserialize)]
pub(super) struct RegisterRequest {
    username: String,
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub(super) struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(super) struct RefreshRequest {
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Public part of a user returned alongside fresh tokens.
#[derive(Serialize)]
struct UserSummary {
    id: String,
    username: String,
    email: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.uuid.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }
    }
}

#[derive(Serialize)]
struct RegisterResponse {
    message: &'static str,
    user: UserSummary,
    #[serde(flatten)]
    tokens: TokenResponse,
}

#[derive(Serialize)]
struct LoginResponse {
    user: UserSummary,
    #[serde(flatten)]
    tokens: TokenResponse,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

pub(super) async fn register(
    State(state): State<UsersState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;

    let session = state
        .sessions
        .register(&payload.username, &payload.email, &payload.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully",
            user: UserSummary::from(&session.user),
            tokens: session.tokens.into(),
        }),
    ))
}

pub(super) async fn login(
    State(state): State<UsersState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;

    let session = state
        .sessions
        .login(&payload.email, &payload.password)
        .await?;

    Ok(Json(LoginResponse {
        user: UserSummary::from(&session.user),
        tokens: session.tokens.into(),
    }))
}

pub(super) async fn logout(
    State(state): State<UsersState>,
    Auth(auth): Auth,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let payload: RefreshRequest = parse_optional_body(&body)?;

    state
        .sessions
        .logout(auth.user, payload.refresh_token.as_deref())
        .await?;

    Ok(Json(MessageResponse {
        message: "Logout successful",
    }))
}

/// Parse a body that may be absent. Empty or whitespace-only bodies yield the
/// default, whatever the content type.
fn parse_optional_body<T>(body: &[u8]) -> Result<T, ApiError>
where
    T: serde::de::DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "Rejected request body");
        ApiError::bad_request("Invalid request body")
    })
}

pub(super) async fn refresh(
    State(state): State<UsersState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;

    let refresh_token = payload
        .refresh_token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::bad_request("Refresh token is required"))?;

    let tokens = state.sessions.refresh(&refresh_token).await?;
    Ok(Json(TokenResponse::from(tokens)))
}
