mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderValue, Method, header::{AUTHORIZATION, CONTENT_TYPE}};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use vidtube_api::auth::{AppState, AppStateInner};
use vidtube_api::media::CloudinaryHost;
use vidtube_api::routes;
use vidtube_api::tokens::TokenService;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vidtube_server=debug,vidtube_api=debug,vidtube_db=debug,tower_http=debug".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {e}.");
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    // Init database
    let db = vidtube_db::Database::open(&config.db_path)?;
    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let media = CloudinaryHost::new(
        &config.cloudinary.cloud_name,
        &config.cloudinary.api_key,
        &config.cloudinary.api_secret,
    );

    let state: AppState = Arc::new(AppStateInner {
        db,
        tokens: TokenService::new(&config.tokens),
        media: Arc::new(media),
        upload_dir: config.upload_dir.clone(),
        secure_cookies: config.secure_cookies,
    });

    // Cookies only cross origins when a concrete origin is configured.
    let cors = match &config.cors_origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin.parse::<HeaderValue>()?)
            .allow_credentials(true),
        None => CorsLayer::new().allow_origin(AllowOrigin::any()),
    }
    .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
    .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("VidTube server listening on {}", addr);
    info!("Database: {}, uploads: {}", config.db_path.display(), config.upload_dir.display());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down...");
}
