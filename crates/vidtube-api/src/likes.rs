use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::Response,
};
use tracing::debug;

use vidtube_db::models::{LikeTarget, Toggle};
use vidtube_types::api::ToggleResponse;
use vidtube_types::models::PublicUser;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult, parse_id};
use crate::extract::ApiPath;
use crate::{respond, run_blocking};

pub async fn toggle_video_like(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    ApiPath(video_id): ApiPath<String>,
) -> ApiResult<Response> {
    let target = LikeTarget::Video(parse_id(&video_id, "video")?);
    toggle(&state, &user, target).await
}

pub async fn toggle_comment_like(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    ApiPath(comment_id): ApiPath<String>,
) -> ApiResult<Response> {
    let target = LikeTarget::Comment(parse_id(&comment_id, "comment")?);
    toggle(&state, &user, target).await
}

pub async fn toggle_tweet_like(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    ApiPath(tweet_id): ApiPath<String>,
) -> ApiResult<Response> {
    let target = LikeTarget::Tweet(parse_id(&tweet_id, "tweet")?);
    toggle(&state, &user, target).await
}

/// GET /likes/videos: videos the caller liked, most recent like first.
pub async fn get_liked_videos(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
) -> ApiResult<Response> {
    let user_id = user.id;
    let liked = run_blocking(&state, move |s| s.db.liked_videos(user_id)).await?;
    Ok(respond(StatusCode::OK, liked, "Liked videos fetched successfully"))
}

async fn toggle(state: &AppState, user: &PublicUser, target: LikeTarget) -> ApiResult<Response> {
    let user_id = user.id;
    let outcome = run_blocking(state, move |s| -> anyhow::Result<Toggle> {
        // Drafts of other channels behave as if they did not exist.
        if let LikeTarget::Video(video_id) = target {
            if !s.db.video_visible_to(video_id, user_id)? {
                return Ok(Toggle::Missing);
            }
        }
        s.db.toggle_like(user_id, target)
    })
    .await?;
    debug!("Like toggle by {} on {} {}: {:?}", user_id, target.kind(), target.id(), outcome);

    match outcome {
        Toggle::Missing => Err(ApiError::not_found(format!("{} not found", capitalize(target.kind())))),
        Toggle::Created => Ok(respond(
            StatusCode::CREATED,
            ToggleResponse { active: true },
            &format!("Liked {}", target.kind()),
        )),
        Toggle::Removed => Ok(respond(
            StatusCode::OK,
            ToggleResponse { active: false },
            &format!("Unliked {}", target.kind()),
        )),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
