//! API request handlers
//!
//! CSV exports are streamed: the response body pulls encoded chunks from the
//! exporter one row at a time, so a slow client slows row production down
//! and a disconnect stops it.

use axum::{
    body::Body,
    extract::{Extension, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use opendata_core::{User, UserId};
use opendata_export::{CsvExport, Cursor, Streamer, DEFAULT_BASENAME};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::store::{StoreError, UserSource};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// User storage
    pub users: Arc<dyn UserSource>,

    /// CSV exporter holding the adapter and metric registries
    pub streamer: Streamer,

    secret_key: Arc<SecretString>,
    export_basename: Arc<str>,
}

impl AppState {
    /// Create new application state
    pub fn new(users: Arc<dyn UserSource>, streamer: Streamer, secret_key: SecretString) -> Self {
        Self {
            users,
            streamer,
            secret_key: Arc::new(secret_key),
            export_basename: Arc::from(DEFAULT_BASENAME),
        }
    }

    /// Basename used when an export request does not name one
    pub fn with_export_basename(mut self, basename: impl Into<String>) -> Self {
        self.export_basename = Arc::from(basename.into());
        self
    }

    /// API key signing secret
    pub fn secret(&self) -> &[u8] {
        self.secret_key.expose_secret().as_bytes()
    }

    fn basename(&self, requested: Option<&str>) -> String {
        requested
            .map(sanitize_basename)
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| self.export_basename.to_string())
    }

    /// Resolve a user by slug, falling back to its id.
    pub async fn find_user(&self, id_or_slug: &str) -> ApiResult<User> {
        if let Some(user) = self.users.get_by_slug(id_or_slug).await {
            return Ok(user);
        }

        let found = match id_or_slug.parse::<UserId>() {
            Ok(user_id) => self.users.get(&user_id).await,
            Err(_) => None,
        };
        found.ok_or_else(|| ApiError::not_found(format!("User not found: {}", id_or_slug)))
    }

    /// Issue and store a new API key for a live account.
    pub async fn issue_api_key(&self, id: &UserId) -> ApiResult<String> {
        let secret = self.secret();
        let user = self
            .users
            .modify(
                id,
                Box::new(move |user: &mut User| {
                    if user.is_deleted() {
                        return Err(StoreError::Deleted(user.id));
                    }
                    user.generate_api_key(secret, Utc::now())?;
                    Ok(())
                }),
            )
            .await?;

        user.apikey()
            .map(str::to_string)
            .ok_or_else(|| ApiError::internal("API key was not stored"))
    }
}

/// Keep only characters that are safe inside a quoted header filename.
fn sanitize_basename(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect()
}

// ============================================================================
// CSV Export Handlers
// ============================================================================

/// Query parameters accepted by the export endpoints
#[derive(Debug, Default, Deserialize)]
pub struct ExportParams {
    /// Filename prefix; the export timestamp is appended
    pub basename: Option<String>,

    /// Include anonymized accounts
    #[serde(default)]
    pub include_deleted: bool,
}

/// Export users as CSV from an in-memory list
#[instrument(skip(state))]
pub async fn export_users_csv(
    State(state): State<AppState>,
    Query(params): Query<ExportParams>,
) -> ApiResult<Response> {
    let users = state.users.list(params.include_deleted).await;
    let basename = state.basename(params.basename.as_deref());
    info!(basename = %basename, count = users.len(), "Exporting users");

    let export = state.streamer.stream(users, Some(&basename))?;
    Ok(csv_response(export))
}

/// Export users as CSV through a cursor over the store snapshot
#[instrument(skip(state))]
pub async fn export_users_cursor(
    State(state): State<AppState>,
    Query(params): Query<ExportParams>,
) -> ApiResult<Response> {
    let users = state.users.list(params.include_deleted).await;
    let basename = state.basename(params.basename.as_deref());
    info!(basename = %basename, "Exporting users through cursor");

    let export = state
        .streamer
        .stream(Cursor(users.into_iter()), Some(&basename))?;
    Ok(csv_response(export))
}

/// Attachment response whose body streams the export chunks.
fn csv_response<I>(export: CsvExport<I>) -> Response
where
    I: Iterator<Item = Vec<String>> + Send + 'static,
{
    let headers = [
        (header::CONTENT_TYPE, export.content_type().to_string()),
        (header::CONTENT_DISPOSITION, export.content_disposition()),
    ];
    let body = Body::from_stream(futures::stream::iter(export.into_chunks()));

    (headers, body).into_response()
}

// ============================================================================
// User Handlers
// ============================================================================

/// Get a user profile as JSON-LD
#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    debug!("Getting user: {}", id);

    let user = state.find_user(&id).await?;
    Ok(Json(user.json_ld()))
}

/// Newly issued API key
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiKeyResponse {
    pub apikey: String,
}

/// Issue a new API key for a user, replacing any previous one
#[instrument(skip(state, caller))]
pub async fn generate_apikey(
    State(state): State<AppState>,
    Extension(caller): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<ApiKeyResponse>)> {
    let target = state.find_user(&id).await?;
    if !caller.may_manage(&target) {
        return Err(ApiError::forbidden("Only sysadmins may issue keys for other users"));
    }

    let apikey = state.issue_api_key(&target.id).await?;

    info!(user_id = %target.id, issued_by = %caller.0.id, "Generated API key");
    Ok((StatusCode::CREATED, Json(ApiKeyResponse { apikey })))
}

/// Revoke a user's API key
#[instrument(skip(state, caller))]
pub async fn clear_apikey(
    State(state): State<AppState>,
    Extension(caller): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let target = state.find_user(&id).await?;
    if !caller.may_manage(&target) {
        return Err(ApiError::forbidden("Only sysadmins may revoke keys of other users"));
    }

    state
        .users
        .modify(
            &target.id,
            Box::new(|user: &mut User| {
                user.clear_api_key();
                Ok(())
            }),
        )
        .await?;

    info!(user_id = %target.id, cleared_by = %caller.0.id, "Cleared API key");
    Ok(StatusCode::NO_CONTENT)
}

/// Anonymize a user account
#[instrument(skip(state, caller))]
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(caller): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if !caller.0.sysadmin() {
        return Err(ApiError::forbidden("Sysadmin role required"));
    }

    let target = state.find_user(&id).await?;
    state
        .users
        .modify(
            &target.id,
            Box::new(|user: &mut User| {
                user.mark_as_deleted(Utc::now());
                Ok(())
            }),
        )
        .await?;

    info!(user_id = %target.id, deleted_by = %caller.0.id, "Deleted user");
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Health & Version Handlers
// ============================================================================

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub users: usize,
}

/// Health check endpoint
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    debug!("Health check requested");

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        users: state.users.count().await,
    })
}

/// Get API version information
#[instrument]
pub async fn version_info() -> Json<VersionInfo> {
    Json(VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        api_version: "v1".to_string(),
        build_timestamp: option_env!("BUILD_TIMESTAMP")
            .unwrap_or("unknown")
            .to_string(),
    })
}

/// Version information
#[derive(Debug, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Semantic version
    pub version: String,

    /// API version
    pub api_version: String,

    /// Build timestamp
    pub build_timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_basename() {
        assert_eq!(sanitize_basename("users"), "users");
        assert_eq!(sanitize_basename("my users\"; x=1"), "myusersx1");
        assert_eq!(sanitize_basename("données_2024"), "donnes_2024");
        assert_eq!(sanitize_basename("\"\""), "");
    }

    #[tokio::test]
    async fn test_version_info() {
        let Json(info) = version_info().await;
        assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(info.api_version, "v1");
    }
}
