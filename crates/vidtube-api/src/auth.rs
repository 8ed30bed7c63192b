use std::path::PathBuf;
use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Extension,
    body::Bytes,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::info;

use vidtube_db::Database;
use vidtube_db::models::NewUser;
use vidtube_types::api::{Empty, LoginRequest, LoginResponse, RefreshRequest, TokenPairResponse};
use vidtube_types::models::PublicUser;

use crate::error::{ApiError, ApiResult, required};
use crate::extract::ApiJson;
use crate::files::{self, FormData};
use crate::media::{MediaHost, MediaKind};
use crate::tokens::{TokenPair, TokenService};
use crate::{respond, run_blocking};

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenService,
    pub media: Arc<dyn MediaHost>,
    /// Scratch directory for multipart uploads before they reach the media host.
    pub upload_dir: PathBuf,
    /// Mark token cookies `Secure`. Off only for plain-HTTP local development.
    pub secure_cookies: bool,
}

/// POST /users/register: multipart form with avatar (required) and cover image.
pub async fn register(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Response> {
    let mut form = FormData::read(multipart?, &state.upload_dir).await?;

    let full_name = required(form.text("fullName"), "fullName");
    let email = required(form.text("email"), "email");
    let username = required(form.text("username"), "username");
    let password = required(form.text("password"), "password");
    let (Ok(full_name), Ok(email), Ok(username), Ok(password)) =
        (full_name, email, username, password)
    else {
        return Err(ApiError::validation("All fields are required"));
    };
    let username = username.to_lowercase();

    let taken = {
        let (username, email) = (username.clone(), email.clone());
        run_blocking(&state, move |s| -> anyhow::Result<bool> {
            Ok(s.db.get_user_by_username(&username)?.is_some()
                || s.db.get_user_by_email(&email)?.is_some())
        })
        .await?
    };
    if taken {
        return Err(ApiError::Conflict(
            "User with email or username already exists".into(),
        ));
    }

    let avatar = form
        .take_file("avatar")
        .ok_or_else(|| ApiError::validation("Avatar file is required"))?;
    let cover_image = form.take_file("coverImage");

    let avatar = files::publish(&state, avatar, MediaKind::Image).await?;
    let cover_image = match cover_image {
        Some(file) => files::publish(&state, file, MediaKind::Image).await?.url,
        None => String::new(),
    };

    let new_user = NewUser {
        username,
        email,
        full_name,
        password_hash: hash_password(&password)?,
        avatar: avatar.url,
        cover_image,
    };

    let user = run_blocking(&state, move |s| -> ApiResult<PublicUser> {
        // A concurrent registration can still win the unique index.
        let id = s.db.create_user(&new_user)?.ok_or_else(|| {
            ApiError::Conflict("User with email or username already exists".into())
        })?;
        s.db.get_user_by_id(id)?
            .map(|u| u.into_public())
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("registered user vanished")))
    })
    .await?;

    info!("Registered user {} ({})", user.username, user.id);
    Ok(respond(StatusCode::CREATED, user, "User registered successfully"))
}

/// POST /users/login: by username or email.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<(CookieJar, Response)> {
    let username = req.username.as_deref().map(str::trim).filter(|u| !u.is_empty());
    let email = req.email.as_deref().map(str::trim).filter(|e| !e.is_empty());
    if username.is_none() && email.is_none() {
        return Err(ApiError::validation("Username or email is required"));
    }
    if req.password.is_empty() {
        return Err(ApiError::validation("password is required"));
    }

    let (username, email) = (username.map(str::to_string), email.map(str::to_string));
    let user = run_blocking(&state, move |s| match username {
        Some(username) => s.db.get_user_by_username(&username),
        None => s.db.get_user_by_email(email.as_deref().unwrap_or_default()),
    })
    .await?
    .ok_or_else(|| ApiError::not_found("User does not exist"))?;

    if !verify_password(&req.password, &user.password)? {
        return Err(ApiError::unauthorized("Invalid user credentials"));
    }

    let pair = {
        let user = user.clone();
        run_blocking(&state, move |s| s.tokens.issue(&s.db, &user)).await?
    };

    info!("User {} logged in", user.username);
    let jar = set_token_cookies(jar, &pair, state.secure_cookies);
    let body = LoginResponse {
        user: user.into_public(),
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    };
    Ok((jar, respond(StatusCode::OK, body, "User logged in successfully")))
}

/// POST /users/logout: drops the persisted refresh token and both cookies.
pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Response)> {
    let user_id = user.id;
    run_blocking(&state, move |s| s.tokens.revoke(&s.db, user_id)).await?;

    info!("User {} logged out", user.username);
    let jar = jar
        .remove(Cookie::build(ACCESS_COOKIE).path("/"))
        .remove(Cookie::build(REFRESH_COOKIE).path("/"));
    Ok((jar, respond(StatusCode::OK, Empty {}, "User logged out")))
}

/// POST /users/refresh-token: cookie first, JSON body as fallback.
pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Bytes,
) -> ApiResult<(CookieJar, Response)> {
    // The body is optional; cookie-only clients send none.
    let body: RefreshRequest = if body.is_empty() {
        RefreshRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::validation(format!("Malformed request body: {e}")))?
    };

    let incoming = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .or(body.refresh_token)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Unauthorized request"))?;

    let pair = run_blocking(&state, move |s| s.tokens.rotate(&s.db, &incoming)).await?;

    let jar = set_token_cookies(jar, &pair, state.secure_cookies);
    let body = TokenPairResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    };
    Ok((jar, respond(StatusCode::OK, body, "Access token refreshed")))
}

fn set_token_cookies(jar: CookieJar, pair: &TokenPair, secure: bool) -> CookieJar {
    jar.add(token_cookie(ACCESS_COOKIE, pair.access_token.clone(), secure))
        .add(token_cookie(REFRESH_COOKIE, pair.refresh_token.clone(), secure))
}

fn token_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

/// Argon2id with a random salt.
pub(crate) fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Password hashing failed: {}", e)))
}

pub(crate) fn verify_password(password: &str, stored_hash: &str) -> ApiResult<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Stored password hash unreadable: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("hunter23", &hash).unwrap());
    }

    #[test]
    fn unreadable_hash_is_internal() {
        assert!(matches!(
            verify_password("x", "not-a-phc-string"),
            Err(ApiError::Internal(_))
        ));
    }

    #[test]
    fn token_cookies_are_http_only() {
        let pair = TokenPair {
            access_token: "a".into(),
            refresh_token: "r".into(),
        };
        let jar = set_token_cookies(CookieJar::new(), &pair, true);
        let access = jar.get(ACCESS_COOKIE).unwrap();
        assert_eq!(access.value(), "a");
        assert_eq!(access.http_only(), Some(true));
        assert_eq!(access.secure(), Some(true));
        assert_eq!(jar.get(REFRESH_COOKIE).unwrap().value(), "r");
    }
}
