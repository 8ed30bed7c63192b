use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    response::Response,
    routing::{get, patch, post},
};

use crate::auth::{self, AppState};
use crate::middleware::{optional_auth, require_auth};
use crate::{comments, dashboard, likes, playlists, respond, subscriptions, tweets, users, videos};

/// Multipart uploads (video files) may be large; everything else is tiny.
pub const MAX_BODY_BYTES: usize = 512 * 1024 * 1024;

/// Every route under `/api/v1`. CORS and request tracing are layered on by
/// the binary.
pub fn router(state: AppState) -> Router {
    let gate = || middleware::from_fn_with_state(state.clone(), require_auth);

    let users = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh-token", post(auth::refresh_token))
        .merge(
            Router::new()
                .route("/c/{username}", get(users::channel_profile))
                .route_layer(middleware::from_fn_with_state(state.clone(), optional_auth)),
        )
        .merge(
            Router::new()
                .route("/logout", post(auth::logout))
                .route("/change-password", post(users::change_password))
                .route("/current-user", get(users::current_user))
                .route("/update-account", patch(users::update_account))
                .route("/avatar", patch(users::update_avatar))
                .route("/cover-image", patch(users::update_cover_image))
                .route_layer(gate()),
        );

    let videos = Router::new()
        .route("/", get(videos::list_videos).post(videos::publish_video))
        .route(
            "/{video_id}",
            get(videos::get_video)
                .patch(videos::update_video)
                .delete(videos::delete_video),
        )
        .route("/toggle/publish/{video_id}", patch(videos::toggle_publish))
        .route_layer(gate());

    let comments = Router::new()
        .route(
            "/{video_id}",
            get(comments::get_video_comments).post(comments::add_comment),
        )
        .route(
            "/c/{comment_id}",
            patch(comments::update_comment).delete(comments::delete_comment),
        )
        .route_layer(gate());

    let likes = Router::new()
        .route("/toggle/v/{video_id}", post(likes::toggle_video_like))
        .route("/toggle/c/{comment_id}", post(likes::toggle_comment_like))
        .route("/toggle/t/{tweet_id}", post(likes::toggle_tweet_like))
        .route("/videos", get(likes::get_liked_videos))
        .route_layer(gate());

    let tweets = Router::new()
        .route("/", post(tweets::create_tweet))
        .route("/all", get(tweets::get_all_tweets))
        .route("/user/{user_id}", get(tweets::get_user_tweets))
        .route(
            "/{tweet_id}",
            patch(tweets::update_tweet).delete(tweets::delete_tweet),
        )
        .route_layer(gate());

    let subscriptions = Router::new()
        .route("/c/{channel_id}", post(subscriptions::toggle_subscription))
        .route("/s/{channel_id}", get(subscriptions::get_channel_subscribers))
        .route("/me", get(subscriptions::get_subscribed_channels))
        .route_layer(gate());

    let playlist = Router::new()
        .route("/", post(playlists::create_playlist))
        .route("/user/{user_id}", get(playlists::get_user_playlists))
        .route(
            "/{playlist_id}",
            get(playlists::get_playlist)
                .patch(playlists::update_playlist)
                .delete(playlists::delete_playlist),
        )
        .route("/add/{video_id}/{playlist_id}", patch(playlists::add_video))
        .route("/remove/{video_id}/{playlist_id}", patch(playlists::remove_video))
        .route_layer(gate());

    let dashboard = Router::new()
        .route("/stats/{user_id}", get(dashboard::get_channel_stats))
        .route("/videos/{user_id}", get(dashboard::get_channel_videos))
        .route_layer(gate());

    let api = Router::new()
        .route("/healthcheck", get(healthcheck))
        .nest("/users", users)
        .nest("/videos", videos)
        .nest("/comments", comments)
        .nest("/likes", likes)
        .nest("/tweets", tweets)
        .nest("/subscriptions", subscriptions)
        .nest("/playlist", playlist)
        .nest("/dashboard", dashboard);

    Router::new()
        .nest("/api/v1", api)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

async fn healthcheck() -> Response {
    respond(StatusCode::OK, "OK", "Health check passed")
}
