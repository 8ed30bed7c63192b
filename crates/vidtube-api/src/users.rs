use axum::{
    Extension,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
    response::Response,
};
use tracing::info;
use uuid::Uuid;

use vidtube_types::api::{ChangePasswordRequest, Empty, UpdateAccountRequest};
use vidtube_types::models::PublicUser;

use crate::auth::{AppState, AppStateInner, hash_password, verify_password};
use crate::error::{ApiError, ApiResult, required};
use crate::extract::{ApiJson, ApiPath};
use crate::files::{self, FormData};
use crate::media::MediaKind;
use crate::middleware::Viewer;
use crate::{respond, run_blocking};

pub async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> ApiResult<Response> {
    if req.old_password.is_empty() || req.new_password.is_empty() {
        return Err(ApiError::validation("Old and new password are required"));
    }

    let user_id = user.id;
    let stored = run_blocking(&state, move |s| s.db.get_user_by_id(user_id))
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid access token"))?;

    if !verify_password(&req.old_password, &stored.password)? {
        return Err(ApiError::validation("Invalid old password"));
    }

    let hash = hash_password(&req.new_password)?;
    run_blocking(&state, move |s| s.db.update_password(user_id, &hash)).await?;

    info!("User {} changed password", user.username);
    Ok(respond(StatusCode::OK, Empty {}, "Password changed successfully"))
}

pub async fn current_user(Extension(user): Extension<PublicUser>) -> Response {
    respond(StatusCode::OK, user, "Current user fetched successfully")
}

pub async fn update_account(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    ApiJson(req): ApiJson<UpdateAccountRequest>,
) -> ApiResult<Response> {
    let full_name = required(Some(req.full_name.as_str()), "fullName")?;
    let email = required(Some(req.email.as_str()), "email")?;

    let user_id = user.id;
    let updated = run_blocking(&state, move |s| -> ApiResult<PublicUser> {
        if !s.db.update_account(user_id, &full_name, &email)? {
            return Err(ApiError::Conflict("Email is already in use".into()));
        }
        reload(s, user_id)
    })
    .await?;

    Ok(respond(StatusCode::OK, updated, "Account details updated successfully"))
}

pub async fn update_avatar(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Response> {
    let mut form = FormData::read(multipart?, &state.upload_dir).await?;
    let file = form
        .take_file("avatar")
        .ok_or_else(|| ApiError::validation("Avatar file is missing"))?;
    let uploaded = files::publish(&state, file, MediaKind::Image).await?;

    let user_id = user.id;
    let updated = run_blocking(&state, move |s| -> ApiResult<PublicUser> {
        s.db.update_avatar(user_id, &uploaded.url)?;
        reload(s, user_id)
    })
    .await?;

    Ok(respond(StatusCode::OK, updated, "Avatar updated successfully"))
}

pub async fn update_cover_image(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Response> {
    let mut form = FormData::read(multipart?, &state.upload_dir).await?;
    let file = form
        .take_file("coverImage")
        .ok_or_else(|| ApiError::validation("Cover image file is missing"))?;
    let uploaded = files::publish(&state, file, MediaKind::Image).await?;

    let user_id = user.id;
    let updated = run_blocking(&state, move |s| -> ApiResult<PublicUser> {
        s.db.update_cover_image(user_id, &uploaded.url)?;
        reload(s, user_id)
    })
    .await?;

    Ok(respond(StatusCode::OK, updated, "Cover image updated successfully"))
}

/// GET /users/c/{username}: public channel page; `isSubscribed` reflects
/// the caller when one is signed in.
pub async fn channel_profile(
    State(state): State<AppState>,
    Extension(Viewer(viewer)): Extension<Viewer>,
    ApiPath(username): ApiPath<String>,
) -> ApiResult<Response> {
    let username = required(Some(username.as_str()), "username")?;

    let profile = run_blocking(&state, move |s| s.db.channel_profile(&username, viewer))
        .await?
        .ok_or_else(|| ApiError::not_found("Channel does not exist"))?;

    Ok(respond(StatusCode::OK, profile, "User channel fetched successfully"))
}

fn reload(s: &AppStateInner, user_id: Uuid) -> ApiResult<PublicUser> {
    s.db.get_user_by_id(user_id)?
        .map(|u| u.into_public())
        .ok_or_else(|| ApiError::not_found("User not found"))
}
