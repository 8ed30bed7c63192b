use axum::{
    Extension,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
    response::Response,
};
use tracing::info;
use uuid::Uuid;

use vidtube_db::models::{NewVideo, VideoPatch};
use vidtube_db::pagination::PageRequest;
use vidtube_db::query::VideoQuery;
use vidtube_types::api::{Empty, PublishToggleResponse, VideoListParams};
use vidtube_types::models::{PublicUser, Video};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult, parse_id, required};
use crate::extract::{ApiPath, ApiQuery};
use crate::files::{self, FormData};
use crate::media::MediaKind;
use crate::{ensure_owner, respond, run_blocking};

/// GET /videos: search, sort and page. Unpublished videos only show up when
/// the caller lists their own channel.
pub async fn list_videos(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    ApiQuery(params): ApiQuery<VideoListParams>,
) -> ApiResult<Response> {
    let owner = params
        .user_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .map(|id| parse_id(id, "user"))
        .transpose()?;

    let query = VideoQuery::builder()
        .owner(owner)
        .search(params.query)
        .published_only(owner != Some(user.id))
        .sort(params.sort_by, params.sort_type)
        .page(PageRequest::new(params.page, params.limit))
        .build()?;

    let page = run_blocking(&state, move |s| s.db.list_videos(&query)).await?;
    Ok(respond(StatusCode::OK, page, "Videos fetched successfully"))
}

/// POST /videos: multipart `title`, `description`, `videoFile`, `thumbnail`.
pub async fn publish_video(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Response> {
    let mut form = FormData::read(multipart?, &state.upload_dir).await?;
    let title = required(form.text("title"), "title")?;
    let description = required(form.text("description"), "description")?;
    let video_file = form
        .take_file("videoFile")
        .ok_or_else(|| ApiError::validation("Video file is required"))?;
    let thumbnail = form
        .take_file("thumbnail")
        .ok_or_else(|| ApiError::validation("Thumbnail is required"))?;

    let (video_file, thumbnail) = tokio::try_join!(
        files::publish(&state, video_file, MediaKind::Video),
        files::publish(&state, thumbnail, MediaKind::Image),
    )?;

    let new_video = NewVideo {
        title,
        description,
        video_file: video_file.url,
        thumbnail: thumbnail.url,
        duration: video_file.duration.unwrap_or_default(),
        owner: user.id,
    };
    let video = run_blocking(&state, move |s| -> ApiResult<Video> {
        let id = s.db.create_video(&new_video)?;
        s.db.get_video(id)?
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("published video vanished")))
    })
    .await?;

    info!("User {} published video {}", user.username, video.id);
    Ok(respond(StatusCode::CREATED, video, "Video published successfully"))
}

/// GET /videos/{videoId}: counts as a view.
pub async fn get_video(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    ApiPath(video_id): ApiPath<String>,
) -> ApiResult<Response> {
    let video_id = parse_id(&video_id, "video")?;

    let video = run_blocking(&state, move |s| -> ApiResult<Video> {
        let mut video = s
            .db
            .get_video(video_id)?
            .filter(|v| v.is_published || v.owner == user.id)
            .ok_or_else(|| ApiError::not_found("Video not found"))?;
        s.db.increment_views(video_id)?;
        video.views += 1;
        Ok(video)
    })
    .await?;

    Ok(respond(StatusCode::OK, video, "Video fetched successfully"))
}

/// PATCH /videos/{videoId}: multipart `title`, `description`, optional `thumbnail`.
pub async fn update_video(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    ApiPath(video_id): ApiPath<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Response> {
    let video_id = parse_id(&video_id, "video")?;
    let existing = load_video(&state, video_id).await?;
    ensure_owner(existing.owner, &user, "edit this video")?;

    let mut form = FormData::read(multipart?, &state.upload_dir).await?;
    let title = required(form.text("title"), "title").ok();
    let description = required(form.text("description"), "description").ok();
    let thumbnail = form.take_file("thumbnail");
    if title.is_none() && description.is_none() && thumbnail.is_none() {
        return Err(ApiError::validation(
            "Title, description or thumbnail is required",
        ));
    }

    let thumbnail = match thumbnail {
        Some(file) => Some(files::publish(&state, file, MediaKind::Image).await?.url),
        None => None,
    };

    let patch = VideoPatch {
        title,
        description,
        thumbnail,
    };
    let video = run_blocking(&state, move |s| -> ApiResult<Video> {
        s.db.update_video(video_id, &patch)?;
        s.db.get_video(video_id)?
            .ok_or_else(|| ApiError::not_found("Video not found"))
    })
    .await?;

    Ok(respond(StatusCode::OK, video, "Video updated successfully"))
}

pub async fn delete_video(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    ApiPath(video_id): ApiPath<String>,
) -> ApiResult<Response> {
    let video_id = parse_id(&video_id, "video")?;
    let existing = load_video(&state, video_id).await?;
    ensure_owner(existing.owner, &user, "delete this video")?;

    run_blocking(&state, move |s| s.db.delete_video(video_id)).await?;

    info!("User {} deleted video {}", user.username, video_id);
    Ok(respond(StatusCode::OK, Empty {}, "Video deleted successfully"))
}

/// PATCH /videos/toggle/publish/{videoId}
pub async fn toggle_publish(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    ApiPath(video_id): ApiPath<String>,
) -> ApiResult<Response> {
    let video_id = parse_id(&video_id, "video")?;
    let existing = load_video(&state, video_id).await?;
    ensure_owner(existing.owner, &user, "publish or unpublish this video")?;

    let is_published = run_blocking(&state, move |s| s.db.toggle_publish(video_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    Ok(respond(
        StatusCode::OK,
        PublishToggleResponse { is_published },
        "Publish status toggled",
    ))
}

async fn load_video(state: &AppState, video_id: Uuid) -> ApiResult<Video> {
    run_blocking(state, move |s| s.db.get_video(video_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))
}
