//! Access/refresh token lifecycle.
//!
//! Access tokens are short-lived and never stored. Refresh tokens are
//! long-lived and exactly one is persisted per identity; rotating or
//! revoking replaces it, which invalidates every earlier refresh token.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use vidtube_db::Database;
use vidtube_db::models::UserRow;
use vidtube_types::api::{Claims, TokenKind};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("{0} token expired")]
    Expired(TokenKind),

    #[error("Malformed {0} token")]
    Malformed(TokenKind),

    #[error("Invalid {0} token signature")]
    SignatureInvalid(TokenKind),

    /// Verified, but no longer the persisted refresh token
    #[error("Refresh token is expired or used")]
    Superseded,

    #[error("Token refers to an unknown user")]
    UnknownIdentity,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Secrets and lifetimes, loaded once at startup.
#[derive(Clone)]
pub struct TokenConfig {
    pub access_secret: String,
    pub access_ttl: Duration,
    pub refresh_secret: String,
    pub refresh_ttl: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(config: &TokenConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(config.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
        }
    }

    /// Mint a fresh pair for `user` and persist the refresh half, replacing
    /// whatever refresh token the identity held before.
    pub fn issue(&self, db: &Database, user: &UserRow) -> Result<TokenPair, TokenError> {
        let pair = self.sign_pair(user)?;
        if !db.set_refresh_token(user.id, Some(&pair.refresh_token))? {
            return Err(TokenError::UnknownIdentity);
        }
        debug!("Issued token pair for {}", user.id);
        Ok(pair)
    }

    /// Check signature, expiry and kind; returns the identity id.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Uuid, TokenError> {
        let key = match kind {
            TokenKind::Access => &self.access_decoding,
            TokenKind::Refresh => &self.refresh_decoding,
        };

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<Claims>(token, key, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired(kind),
            ErrorKind::InvalidSignature => TokenError::SignatureInvalid(kind),
            _ => TokenError::Malformed(kind),
        })?;

        if data.claims.kind != kind {
            return Err(TokenError::Malformed(kind));
        }
        Ok(data.claims.sub)
    }

    /// Exchange a refresh token for a new pair. Fails when the token does
    /// not verify or is not the one currently persisted (superseded by a
    /// later issue/rotate, or revoked).
    pub fn rotate(&self, db: &Database, refresh_token: &str) -> Result<TokenPair, TokenError> {
        let user_id = self.verify(refresh_token, TokenKind::Refresh)?;
        let user = db
            .get_user_by_id(user_id)?
            .ok_or(TokenError::UnknownIdentity)?;

        if user.refresh_token.as_deref() != Some(refresh_token) {
            warn!("Rejected superseded refresh token for {}", user_id);
            return Err(TokenError::Superseded);
        }

        let pair = self.sign_pair(&user)?;
        // A concurrent rotation may have won between the read and this write.
        if !db.replace_refresh_token(user_id, refresh_token, &pair.refresh_token)? {
            warn!("Lost refresh rotation race for {}", user_id);
            return Err(TokenError::Superseded);
        }
        Ok(pair)
    }

    /// Forget the persisted refresh token (logout).
    pub fn revoke(&self, db: &Database, user_id: Uuid) -> Result<(), TokenError> {
        db.set_refresh_token(user_id, None)?;
        Ok(())
    }

    fn sign_pair(&self, user: &UserRow) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.sign(user, TokenKind::Access)?,
            refresh_token: self.sign(user, TokenKind::Refresh)?,
        })
    }

    fn sign(&self, user: &UserRow, kind: TokenKind) -> Result<String, TokenError> {
        let (key, ttl) = match kind {
            TokenKind::Access => (&self.access_encoding, self.access_ttl),
            TokenKind::Refresh => (&self.refresh_encoding, self.refresh_ttl),
        };
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            kind,
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, key)
            .map_err(|e| TokenError::Internal(anyhow::anyhow!("Token signing failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vidtube_db::models::NewUser;

    fn config() -> TokenConfig {
        TokenConfig {
            access_secret: "access-test-secret".into(),
            access_ttl: Duration::minutes(15),
            refresh_secret: "refresh-test-secret".into(),
            refresh_ttl: Duration::days(10),
        }
    }

    fn setup() -> (TempDir, Database, UserRow) {
        let dir = TempDir::new().unwrap();
        let db = Database::open(&dir.path().join("tokens.db")).unwrap();
        let id = db
            .create_user(&NewUser {
                username: "alice".into(),
                email: "a@x.com".into(),
                full_name: "Alice".into(),
                password_hash: "hash".into(),
                avatar: "https://media.test/a.png".into(),
                cover_image: String::new(),
            })
            .unwrap()
            .unwrap();
        let user = db.get_user_by_id(id).unwrap().unwrap();
        (dir, db, user)
    }

    #[test]
    fn issued_tokens_verify_for_their_kind_only() {
        let (_dir, db, user) = setup();
        let tokens = TokenService::new(&config());
        let pair = tokens.issue(&db, &user).unwrap();

        assert_eq!(tokens.verify(&pair.access_token, TokenKind::Access).unwrap(), user.id);
        assert_eq!(tokens.verify(&pair.refresh_token, TokenKind::Refresh).unwrap(), user.id);
        assert!(matches!(
            tokens.verify(&pair.refresh_token, TokenKind::Access),
            Err(TokenError::SignatureInvalid(TokenKind::Access))
        ));

        let stored = db.get_user_by_id(user.id).unwrap().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some(pair.refresh_token.as_str()));
    }

    #[test]
    fn kind_mismatch_under_shared_secret_is_malformed() {
        let mut cfg = config();
        cfg.refresh_secret = cfg.access_secret.clone();
        let (_dir, db, user) = setup();
        let tokens = TokenService::new(&cfg);
        let pair = tokens.issue(&db, &user).unwrap();

        assert!(matches!(
            tokens.verify(&pair.refresh_token, TokenKind::Access),
            Err(TokenError::Malformed(TokenKind::Access))
        ));
    }

    #[test]
    fn expired_and_garbage_tokens_fail() {
        let (_dir, db, user) = setup();
        let mut cfg = config();
        cfg.access_ttl = Duration::seconds(-30);
        let tokens = TokenService::new(&cfg);
        let pair = tokens.issue(&db, &user).unwrap();

        assert!(matches!(
            tokens.verify(&pair.access_token, TokenKind::Access),
            Err(TokenError::Expired(TokenKind::Access))
        ));
        assert!(matches!(
            tokens.verify("definitely.not.ajwt", TokenKind::Access),
            Err(TokenError::Malformed(TokenKind::Access))
        ));
    }

    #[test]
    fn rotate_rejects_superseded_token() {
        let (_dir, db, user) = setup();
        let tokens = TokenService::new(&config());

        let first = tokens.issue(&db, &user).unwrap();
        let second = tokens.rotate(&db, &first.refresh_token).unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);

        assert!(matches!(
            tokens.rotate(&db, &first.refresh_token),
            Err(TokenError::Superseded)
        ));
        // The legitimate holder is unaffected by the failed replay.
        tokens.rotate(&db, &second.refresh_token).unwrap();
    }

    #[test]
    fn reissue_supersedes_previous_refresh_token() {
        let (_dir, db, user) = setup();
        let tokens = TokenService::new(&config());

        let old = tokens.issue(&db, &user).unwrap();
        tokens.issue(&db, &user).unwrap();
        assert!(matches!(
            tokens.rotate(&db, &old.refresh_token),
            Err(TokenError::Superseded)
        ));
    }

    #[test]
    fn revoke_blocks_rotation() {
        let (_dir, db, user) = setup();
        let tokens = TokenService::new(&config());

        let pair = tokens.issue(&db, &user).unwrap();
        tokens.revoke(&db, user.id).unwrap();
        assert!(matches!(
            tokens.rotate(&db, &pair.refresh_token),
            Err(TokenError::Superseded)
        ));
    }
}
