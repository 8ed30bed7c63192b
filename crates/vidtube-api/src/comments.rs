use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::Response,
};
use uuid::Uuid;

use vidtube_db::pagination::PageRequest;
use vidtube_types::api::{ContentRequest, Empty, PageParams};
use vidtube_types::models::{Comment, PublicUser};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult, parse_id, required};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::{ensure_owner, respond, run_blocking};

/// GET /comments/{videoId}: newest first, paged.
pub async fn get_video_comments(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    ApiPath(video_id): ApiPath<String>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<Response> {
    let video_id = parse_id(&video_id, "video")?;
    let req = PageRequest::new(params.page, params.limit);

    let page = run_blocking(&state, move |s| -> ApiResult<_> {
        if !s.db.video_visible_to(video_id, user.id)? {
            return Err(ApiError::not_found("Video not found"));
        }
        Ok(s.db.video_comments(video_id, req)?)
    })
    .await?;

    Ok(respond(StatusCode::OK, page, "Comments fetched successfully"))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    ApiPath(video_id): ApiPath<String>,
    ApiJson(req): ApiJson<ContentRequest>,
) -> ApiResult<Response> {
    let video_id = parse_id(&video_id, "video")?;
    let content = required(Some(req.content.as_str()), "content")?;

    let comment = run_blocking(&state, move |s| -> ApiResult<Comment> {
        if !s.db.video_visible_to(video_id, user.id)? {
            return Err(ApiError::not_found("Video not found"));
        }
        Ok(s.db.create_comment(video_id, user.id, &content)?)
    })
    .await?;

    Ok(respond(StatusCode::CREATED, comment, "Comment added successfully"))
}

pub async fn update_comment(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    ApiPath(comment_id): ApiPath<String>,
    body: ApiResult<ApiJson<ContentRequest>>,
) -> ApiResult<Response> {
    let comment_id = parse_id(&comment_id, "comment")?;
    let existing = load_comment(&state, comment_id).await?;
    ensure_owner(existing.owner, &user, "edit this comment")?;

    let ApiJson(req) = body?;
    let content = required(Some(req.content.as_str()), "content")?;

    let comment = run_blocking(&state, move |s| s.db.update_comment(comment_id, &content))
        .await?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;

    Ok(respond(StatusCode::OK, comment, "Comment updated successfully"))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    ApiPath(comment_id): ApiPath<String>,
) -> ApiResult<Response> {
    let comment_id = parse_id(&comment_id, "comment")?;

    let existing = load_comment(&state, comment_id).await?;
    ensure_owner(existing.owner, &user, "delete this comment")?;

    run_blocking(&state, move |s| s.db.delete_comment(comment_id)).await?;
    Ok(respond(StatusCode::OK, Empty {}, "Comment deleted successfully"))
}

async fn load_comment(state: &AppState, comment_id: Uuid) -> ApiResult<Comment> {
    run_blocking(state, move |s| s.db.get_comment(comment_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Comment not found"))
}
