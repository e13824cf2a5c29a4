mod error;
mod session;
mod users;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use crate::db::Database;
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::session::SessionService;

pub use error::ApiError;

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub sessions: SessionService,
}

impl_has_auth_backend!(UsersState);

/// Create the API router.
pub fn create_api_router(db: Database, jwt: Arc<JwtConfig>) -> Router {
    let users_state = UsersState {
        sessions: SessionService::new(db.clone(), jwt.clone()),
        db,
        jwt,
    };

    Router::new().nest("/users", users_router(users_state))
}

fn users_router(state: UsersState) -> Router {
    Router::new()
        .route("/register", post(session::register))
        .route("/login", post(session::login))
        .route("/logout", post(session::logout))
        .route("/refresh", post(session::refresh))
        .route("/", get(users::list_users))
        .route(
            "/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .with_state(state)
}
