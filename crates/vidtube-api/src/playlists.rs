use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::Response,
};
use tracing::info;
use uuid::Uuid;

use vidtube_types::api::{CreatePlaylistRequest, Empty, UpdatePlaylistRequest};
use vidtube_types::models::{Playlist, PublicUser};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult, parse_id, required};
use crate::extract::{ApiJson, ApiPath};
use crate::{ensure_owner, respond, run_blocking};

pub async fn create_playlist(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    ApiJson(req): ApiJson<CreatePlaylistRequest>,
) -> ApiResult<Response> {
    let name = required(Some(req.name.as_str()), "name")?;
    let description = req.description.map(|d| d.trim().to_string()).unwrap_or_default();

    let owner = user.id;
    let playlist =
        run_blocking(&state, move |s| s.db.create_playlist(owner, &name, &description)).await?;

    info!("User {} created playlist {}", user.username, playlist.id);
    Ok(respond(StatusCode::CREATED, playlist, "Playlist created successfully"))
}

/// GET /playlist/user/{userId}
pub async fn get_user_playlists(
    State(state): State<AppState>,
    Extension(viewer): Extension<PublicUser>,
    ApiPath(user_id): ApiPath<String>,
) -> ApiResult<Response> {
    let user_id = parse_id(&user_id, "user")?;

    let playlists = run_blocking(&state, move |s| -> ApiResult<_> {
        if !s.db.user_exists(user_id)? {
            return Err(ApiError::not_found("User not found"));
        }
        Ok(s.db.playlists_by_owner(user_id, viewer.id)?)
    })
    .await?;

    Ok(respond(StatusCode::OK, playlists, "User playlists fetched successfully"))
}

pub async fn get_playlist(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    ApiPath(playlist_id): ApiPath<String>,
) -> ApiResult<Response> {
    let playlist_id = parse_id(&playlist_id, "playlist")?;
    let playlist = load_playlist(&state, playlist_id, user.id).await?;
    Ok(respond(StatusCode::OK, playlist, "Playlist fetched successfully"))
}

pub async fn update_playlist(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    ApiPath(playlist_id): ApiPath<String>,
    body: ApiResult<ApiJson<UpdatePlaylistRequest>>,
) -> ApiResult<Response> {
    let playlist_id = parse_id(&playlist_id, "playlist")?;
    let existing = load_playlist(&state, playlist_id, user.id).await?;
    ensure_owner(existing.owner, &user, "edit this playlist")?;

    let ApiJson(req) = body?;
    let name = required(req.name.as_deref(), "name").ok();
    let description = req.description.map(|d| d.trim().to_string());
    if name.is_none() && description.is_none() {
        return Err(ApiError::validation("Name or description is required"));
    }

    let playlist = run_blocking(&state, move |s| {
        s.db.update_playlist(playlist_id, name.as_deref(), description.as_deref())
    })
    .await?
    .ok_or_else(|| ApiError::not_found("Playlist not found"))?;

    Ok(respond(StatusCode::OK, playlist, "Playlist updated successfully"))
}

pub async fn delete_playlist(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    ApiPath(playlist_id): ApiPath<String>,
) -> ApiResult<Response> {
    let playlist_id = parse_id(&playlist_id, "playlist")?;

    let existing = load_playlist(&state, playlist_id, user.id).await?;
    ensure_owner(existing.owner, &user, "delete this playlist")?;

    run_blocking(&state, move |s| s.db.delete_playlist(playlist_id)).await?;
    Ok(respond(StatusCode::OK, Empty {}, "Playlist deleted successfully"))
}

/// PATCH /playlist/add/{videoId}/{playlistId}
pub async fn add_video(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    ApiPath((video_id, playlist_id)): ApiPath<(String, String)>,
) -> ApiResult<Response> {
    let video_id = parse_id(&video_id, "video")?;
    let playlist_id = parse_id(&playlist_id, "playlist")?;

    let existing = load_playlist(&state, playlist_id, user.id).await?;
    ensure_owner(existing.owner, &user, "add videos to this playlist")?;

    let viewer = user.id;
    let playlist = run_blocking(&state, move |s| -> ApiResult<Playlist> {
        if !s.db.video_visible_to(video_id, viewer)? {
            return Err(ApiError::not_found("Video not found"));
        }
        s.db.add_video_to_playlist(playlist_id, video_id)?
            .ok_or_else(|| ApiError::not_found("Playlist not found"))
    })
    .await?;

    Ok(respond(StatusCode::OK, playlist, "Video added to playlist"))
}

/// PATCH /playlist/remove/{videoId}/{playlistId}
pub async fn remove_video(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    ApiPath((video_id, playlist_id)): ApiPath<(String, String)>,
) -> ApiResult<Response> {
    let video_id = parse_id(&video_id, "video")?;
    let playlist_id = parse_id(&playlist_id, "playlist")?;

    let existing = load_playlist(&state, playlist_id, user.id).await?;
    ensure_owner(existing.owner, &user, "remove videos from this playlist")?;

    let playlist = run_blocking(&state, move |s| {
        s.db.remove_video_from_playlist(playlist_id, video_id)
    })
    .await?
    .ok_or_else(|| ApiError::not_found("Playlist not found"))?;

    Ok(respond(StatusCode::OK, playlist, "Video removed from playlist"))
}

async fn load_playlist(state: &AppState, playlist_id: Uuid, viewer: Uuid) -> ApiResult<Playlist> {
    run_blocking(state, move |s| s.db.get_playlist(playlist_id, viewer))
        .await?
        .ok_or_else(|| ApiError::not_found("Playlist not found"))
}
