pub mod auth;
pub mod comments;
pub mod dashboard;
pub mod error;
pub mod extract;
pub mod files;
pub mod likes;
pub mod media;
pub mod middleware;
pub mod playlists;
pub mod routes;
pub mod subscriptions;
pub mod tokens;
pub mod tweets;
pub mod users;
pub mod videos;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

use vidtube_types::api::ApiResponse;
use vidtube_types::models::PublicUser;

use crate::auth::{AppState, AppStateInner};
use crate::error::{ApiError, ApiResult};

/// Run a store call on the blocking pool. The closure gets the shared state so
/// it can reach both the database and the token service.
pub(crate) async fn run_blocking<F, T, E>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&AppStateInner) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("blocking task failed"))
        })?
        .map_err(Into::into)
}

/// Wrap `data` in the success envelope.
pub(crate) fn respond<T: Serialize>(status: StatusCode, data: T, message: &str) -> Response {
    (status, Json(ApiResponse::new(status.as_u16(), data, message))).into_response()
}

/// Mutations on owned rows are reserved to the stored owner.
pub(crate) fn ensure_owner(owner: Uuid, user: &PublicUser, action: &str) -> ApiResult<()> {
    if owner != user.id {
        return Err(ApiError::forbidden(format!("Only the owner can {action}")));
    }
    Ok(())
}
