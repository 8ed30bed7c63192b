use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, warn};
use uuid::Uuid;

use vidtube_types::api::TokenKind;
use vidtube_types::models::PublicUser;

use crate::auth::{ACCESS_COOKIE, AppState};
use crate::error::{ApiError, ApiResult};
use crate::run_blocking;

/// Identity of the caller on optionally-authenticated routes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Viewer(pub Option<Uuid>);

/// Reject the request unless it carries a valid access token for an
/// existing user. The user's public fields go into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(req.headers())
        .ok_or_else(|| ApiError::unauthorized("Unauthorized request"))?;
    let user = authenticate(&state, &token).await?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Like `require_auth`, but anonymous or invalid credentials pass through
/// as `Viewer(None)`.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let viewer = match extract_token(req.headers()) {
        Some(token) => match authenticate(&state, &token).await {
            Ok(user) => Viewer(Some(user.id)),
            Err(e) => {
                debug!("Ignoring credential on optional route: {}", e);
                Viewer(None)
            }
        },
        None => Viewer(None),
    };

    req.extensions_mut().insert(viewer);
    next.run(req).await
}

/// Access token from the `accessToken` cookie, else from an
/// `Authorization: Bearer` header.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(ACCESS_COOKIE) {
        let value = cookie.value().trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }

    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(char::is_whitespace)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

async fn authenticate(state: &AppState, token: &str) -> ApiResult<PublicUser> {
    let user_id = state.tokens.verify(token, TokenKind::Access)?;

    run_blocking(state, move |s| s.db.get_user_by_id(user_id))
        .await?
        .map(|u| u.into_public())
        .ok_or_else(|| {
            warn!("Access token for unknown user {}", user_id);
            ApiError::unauthorized("Invalid access token")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn bearer_scheme_is_case_insensitive_and_trimmed() {
        let h = headers(&[(header::AUTHORIZATION, "  bEaReR   abc.def.ghi  ")]);
        assert_eq!(extract_token(&h).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn cookie_wins_over_header() {
        let h = headers(&[
            (header::COOKIE, "theme=dark; accessToken=from-cookie"),
            (header::AUTHORIZATION, "Bearer from-header"),
        ]);
        assert_eq!(extract_token(&h).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn missing_or_foreign_scheme_yields_nothing() {
        assert_eq!(extract_token(&HeaderMap::new()), None);
        let basic = headers(&[(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")]);
        assert_eq!(extract_token(&basic), None);
        let empty = headers(&[(header::AUTHORIZATION, "Bearer    ")]);
        assert_eq!(extract_token(&empty), None);
    }
}
