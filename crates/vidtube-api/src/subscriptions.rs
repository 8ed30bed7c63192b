use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::Response,
};
use tracing::debug;

use vidtube_db::models::Toggle;
use vidtube_types::api::ToggleResponse;
use vidtube_types::models::PublicUser;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult, parse_id};
use crate::extract::ApiPath;
use crate::{respond, run_blocking};

/// POST /subscriptions/c/{channelId}: subscribe, or unsubscribe when
/// already subscribed.
pub async fn toggle_subscription(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    ApiPath(channel_id): ApiPath<String>,
) -> ApiResult<Response> {
    let channel_id = parse_id(&channel_id, "channel")?;
    if channel_id == user.id {
        return Err(ApiError::validation("Cannot subscribe to your own channel"));
    }

    let subscriber = user.id;
    let outcome =
        run_blocking(&state, move |s| s.db.toggle_subscription(subscriber, channel_id)).await?;
    debug!("Subscription toggle {} -> {}: {:?}", subscriber, channel_id, outcome);

    match outcome {
        Toggle::Missing => Err(ApiError::not_found("Channel not found")),
        Toggle::Created => Ok(respond(
            StatusCode::CREATED,
            ToggleResponse { active: true },
            "Subscribed successfully",
        )),
        Toggle::Removed => Ok(respond(
            StatusCode::OK,
            ToggleResponse { active: false },
            "Unsubscribed successfully",
        )),
    }
}

/// GET /subscriptions/s/{channelId}
pub async fn get_channel_subscribers(
    State(state): State<AppState>,
    ApiPath(channel_id): ApiPath<String>,
) -> ApiResult<Response> {
    let channel_id = parse_id(&channel_id, "channel")?;

    let subscribers = run_blocking(&state, move |s| -> ApiResult<_> {
        if !s.db.user_exists(channel_id)? {
            return Err(ApiError::not_found("Channel not found"));
        }
        Ok(s.db.channel_subscribers(channel_id)?)
    })
    .await?;

    Ok(respond(StatusCode::OK, subscribers, "Subscribers fetched successfully"))
}

/// GET /subscriptions/me
pub async fn get_subscribed_channels(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
) -> ApiResult<Response> {
    let subscriber = user.id;
    let channels = run_blocking(&state, move |s| s.db.subscribed_channels(subscriber)).await?;
    Ok(respond(StatusCode::OK, channels, "Subscribed channels fetched successfully"))
}
