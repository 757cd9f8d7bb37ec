//! HTTP API for the open-data portal
//!
//! Routes:
//!
//! - `GET /health`, `GET /version`
//! - `GET /users.csv`: users exported from an in-memory list
//! - `GET /users/export.csv`: users exported through a cursor
//! - `GET /users/:id`: JSON-LD profile, `:id` being a slug or an id
//! - `POST|DELETE /users/:id/apikey`: issue or revoke an API key (the
//!   account's own key or a sysadmin key required)
//! - `DELETE /users/:id`: anonymize an account (sysadmin key required)

pub mod auth;
pub mod error;
pub mod handlers;
pub mod store;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use auth::{CurrentUser, HEADER_API_KEY};
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use handlers::AppState;
pub use store::{InMemoryUserStore, StoreError, StoreResult, UserChange, UserSource};

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let require_key = || middleware::from_fn_with_state(state.clone(), auth::require_api_key);
    let delete_user = delete(handlers::delete_user).route_layer(require_key());
    let apikey = post(handlers::generate_apikey)
        .delete(handlers::clear_apikey)
        .route_layer(require_key());

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/version", get(handlers::version_info))
        .route("/users.csv", get(handlers::export_users_csv))
        .route("/users/export.csv", get(handlers::export_users_cursor))
        .route("/users/:id", get(handlers::get_user).merge(delete_user))
        .route("/users/:id/apikey", apikey)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
