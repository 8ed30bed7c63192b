use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::Response,
};
use uuid::Uuid;

use vidtube_db::pagination::PageRequest;
use vidtube_types::api::{ContentRequest, Empty, PageParams};
use vidtube_types::models::{PublicUser, Tweet};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult, parse_id, required};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::{ensure_owner, respond, run_blocking};

pub async fn create_tweet(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    ApiJson(req): ApiJson<ContentRequest>,
) -> ApiResult<Response> {
    let content = required(Some(req.content.as_str()), "content")?;
    let owner = user.id;
    let tweet = run_blocking(&state, move |s| s.db.create_tweet(owner, &content)).await?;
    Ok(respond(StatusCode::CREATED, tweet, "Tweet created successfully"))
}

/// GET /tweets/all
pub async fn get_all_tweets(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<Response> {
    let req = PageRequest::new(params.page, params.limit);
    let page = run_blocking(&state, move |s| s.db.list_tweets(None, req)).await?;
    Ok(respond(StatusCode::OK, page, "Tweets fetched successfully"))
}

/// GET /tweets/user/{userId}
pub async fn get_user_tweets(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<String>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<Response> {
    let user_id = parse_id(&user_id, "user")?;
    let req = PageRequest::new(params.page, params.limit);

    let page = run_blocking(&state, move |s| -> ApiResult<_> {
        if !s.db.user_exists(user_id)? {
            return Err(ApiError::not_found("User not found"));
        }
        Ok(s.db.list_tweets(Some(user_id), req)?)
    })
    .await?;

    Ok(respond(StatusCode::OK, page, "User tweets fetched successfully"))
}

pub async fn update_tweet(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    ApiPath(tweet_id): ApiPath<String>,
    body: ApiResult<ApiJson<ContentRequest>>,
) -> ApiResult<Response> {
    let tweet_id = parse_id(&tweet_id, "tweet")?;
    let existing = load_tweet(&state, tweet_id).await?;
    ensure_owner(existing.owner, &user, "edit this tweet")?;

    let ApiJson(req) = body?;
    let content = required(Some(req.content.as_str()), "content")?;

    let tweet = run_blocking(&state, move |s| s.db.update_tweet(tweet_id, &content))
        .await?
        .ok_or_else(|| ApiError::not_found("Tweet not found"))?;

    Ok(respond(StatusCode::OK, tweet, "Tweet updated successfully"))
}

pub async fn delete_tweet(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    ApiPath(tweet_id): ApiPath<String>,
) -> ApiResult<Response> {
    let tweet_id = parse_id(&tweet_id, "tweet")?;

    let existing = load_tweet(&state, tweet_id).await?;
    ensure_owner(existing.owner, &user, "delete this tweet")?;

    run_blocking(&state, move |s| s.db.delete_tweet(tweet_id)).await?;
    Ok(respond(StatusCode::OK, Empty {}, "Tweet deleted successfully"))
}

async fn load_tweet(state: &AppState, tweet_id: Uuid) -> ApiResult<Tweet> {
    run_blocking(state, move |s| s.db.get_tweet(tweet_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Tweet not found"))
}
