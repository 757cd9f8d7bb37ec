//! API key authentication middleware
//!
//! Protected routes require an `X-API-KEY` header holding a key issued by
//! `POST /users/:id/apikey`. Keys are checked against the signing secret
//! and against the key currently stored on the account, so a cleared key is
//! rejected even though its signature is still valid.
//!
//! On success the middleware inserts the [`CurrentUser`] into the request
//! extensions. Handlers decide what the caller may do.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use opendata_core::User;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::handlers::AppState;

/// Header carrying the caller's API key.
pub const HEADER_API_KEY: &str = "x-api-key";

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    /// Sysadmins act on any account, other users only on their own.
    pub fn may_manage(&self, target: &User) -> bool {
        self.0.id == target.id || self.0.sysadmin()
    }
}

/// Middleware that only lets active users holding their current key through.
pub async fn require_api_key(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let token = request
        .headers()
        .get(HEADER_API_KEY)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| ApiError::unauthorized("Missing required header: X-API-KEY"))?;

    let user_id = User::verify_api_key(state.secret(), &token)
        .map_err(|e| ApiError::unauthorized(format!("Invalid X-API-KEY: {}", e)))?;

    let user = state
        .users
        .get(&user_id)
        .await
        .filter(|user| user.active && !user.is_deleted())
        .filter(|user| user.apikey() == Some(token.as_str()))
        .ok_or_else(|| ApiError::unauthorized("Unknown or revoked API key"))?;

    debug!(user_id = %user.id, "API key authenticated");

    request.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(request).await)
}
