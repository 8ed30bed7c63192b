use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::Response,
};

use vidtube_types::models::{ChannelStats, PublicUser};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult, parse_id};
use crate::extract::ApiPath;
use crate::{respond, run_blocking};

/// GET /dashboard/stats/{userId}: the three rollups run concurrently, each
/// on its own reader connection.
pub async fn get_channel_stats(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<String>,
) -> ApiResult<Response> {
    let channel = parse_id(&user_id, "user")?;
    if !run_blocking(&state, move |s| s.db.user_exists(channel)).await? {
        return Err(ApiError::not_found("User not found"));
    }

    let ((total_videos, total_views), total_subscribers, total_likes) = tokio::try_join!(
        run_blocking(&state, move |s| s.db.owner_video_totals(channel)),
        run_blocking(&state, move |s| s.db.subscriber_count(channel)),
        run_blocking(&state, move |s| s.db.likes_on_owner_videos(channel)),
    )?;

    let stats = ChannelStats {
        total_videos,
        total_views,
        total_subscribers,
        total_likes,
    };
    Ok(respond(StatusCode::OK, stats, "Channel stats fetched successfully"))
}

/// GET /dashboard/videos/{userId}: every video of the channel for its owner,
/// published ones only for anyone else.
pub async fn get_channel_videos(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    ApiPath(user_id): ApiPath<String>,
) -> ApiResult<Response> {
    let channel = parse_id(&user_id, "user")?;

    let mut videos = run_blocking(&state, move |s| -> ApiResult<_> {
        if !s.db.user_exists(channel)? {
            return Err(ApiError::not_found("User not found"));
        }
        Ok(s.db.videos_by_owner(channel)?)
    })
    .await?;
    if channel != user.id {
        videos.retain(|v| v.is_published);
    }

    Ok(respond(StatusCode::OK, videos, "Channel videos fetched successfully"))
}
