use std::path::PathBuf;

use chrono::Duration;
use thiserror::Error;

use vidtube_api::tokens::TokenConfig;

/// Placeholder secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me",
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

const DEFAULT_ACCESS_TTL_SECS: i64 = 24 * 60 * 60;
const DEFAULT_REFRESH_TTL_SECS: i64 = 10 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is unset or still a placeholder")]
    Secret(&'static str),

    #[error("{0} is not a valid {1}: {2:?}")]
    Invalid(&'static str, &'static str, String),

    #[error("{0} is required")]
    Missing(&'static str),
}

pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub upload_dir: PathBuf,
    pub tokens: TokenConfig,
    /// `None` allows any origin (no credentials).
    pub cors_origin: Option<String>,
    pub cloudinary: CloudinaryConfig,
    pub secure_cookies: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let port = var("VIDTUBE_PORT", "8000");
        let port = port
            .parse()
            .map_err(|_| ConfigError::Invalid("VIDTUBE_PORT", "port", port))?;

        let tokens = TokenConfig {
            access_secret: secret(&get, "ACCESS_TOKEN_SECRET")?,
            access_ttl: ttl(&get, "ACCESS_TOKEN_TTL_SECS", DEFAULT_ACCESS_TTL_SECS)?,
            refresh_secret: secret(&get, "REFRESH_TOKEN_SECRET")?,
            refresh_ttl: ttl(&get, "REFRESH_TOKEN_TTL_SECS", DEFAULT_REFRESH_TTL_SECS)?,
        };
        if tokens.access_secret == tokens.refresh_secret {
            return Err(ConfigError::Invalid(
                "REFRESH_TOKEN_SECRET",
                "secret distinct from ACCESS_TOKEN_SECRET",
                "<redacted>".into(),
            ));
        }

        let cloudinary = CloudinaryConfig {
            cloud_name: required(&get, "CLOUDINARY_CLOUD_NAME")?,
            api_key: required(&get, "CLOUDINARY_API_KEY")?,
            api_secret: required(&get, "CLOUDINARY_API_SECRET")?,
        };

        Ok(Self {
            host: var("VIDTUBE_HOST", "0.0.0.0"),
            port,
            db_path: var("VIDTUBE_DB_PATH", "vidtube.db").into(),
            upload_dir: var("VIDTUBE_UPLOAD_DIR", "./public/temp").into(),
            tokens,
            cors_origin: get("CORS_ORIGIN").filter(|o| !o.trim().is_empty() && o != "*"),
            cloudinary,
            secure_cookies: var("VIDTUBE_SECURE_COOKIES", "true") != "false",
        })
    }
}

fn secret(get: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<String, ConfigError> {
    let value = get(key).unwrap_or_default();
    if value.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&value.as_str()) {
        return Err(ConfigError::Secret(key));
    }
    Ok(value)
}

fn required(get: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<String, ConfigError> {
    get(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn ttl(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default_secs: i64,
) -> Result<Duration, ConfigError> {
    match get(key) {
        None => Ok(Duration::seconds(default_secs)),
        Some(raw) => match raw.parse::<i64>() {
            Ok(secs) if secs > 0 => Ok(Duration::seconds(secs)),
            _ => Err(ConfigError::Invalid(key, "positive number of seconds", raw)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    const BASE: &[(&str, &str)] = &[
        ("ACCESS_TOKEN_SECRET", "a-long-access-secret"),
        ("REFRESH_TOKEN_SECRET", "a-long-refresh-secret"),
        ("CLOUDINARY_CLOUD_NAME", "demo"),
        ("CLOUDINARY_API_KEY", "key"),
        ("CLOUDINARY_API_SECRET", "shh"),
    ];

    #[test]
    fn defaults_apply() {
        let config = load(BASE).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.db_path, PathBuf::from("vidtube.db"));
        assert_eq!(config.tokens.access_ttl, Duration::days(1));
        assert_eq!(config.tokens.refresh_ttl, Duration::days(10));
        assert!(config.cors_origin.is_none());
        assert!(config.secure_cookies);
    }

    #[test]
    fn placeholder_secret_is_rejected() {
        let mut pairs = BASE.to_vec();
        pairs[0] = ("ACCESS_TOKEN_SECRET", "dev-secret-change-me");
        assert!(matches!(load(&pairs), Err(ConfigError::Secret("ACCESS_TOKEN_SECRET"))));

        pairs.remove(0);
        assert!(matches!(load(&pairs), Err(ConfigError::Secret("ACCESS_TOKEN_SECRET"))));
    }

    #[test]
    fn shared_secret_is_rejected() {
        let mut pairs = BASE.to_vec();
        pairs[1] = ("REFRESH_TOKEN_SECRET", "a-long-access-secret");
        assert!(matches!(load(&pairs), Err(ConfigError::Invalid("REFRESH_TOKEN_SECRET", _, _))));
    }

    #[test]
    fn bad_ttl_and_port_are_rejected() {
        let mut pairs = BASE.to_vec();
        pairs.push(("ACCESS_TOKEN_TTL_SECS", "0"));
        assert!(matches!(load(&pairs), Err(ConfigError::Invalid("ACCESS_TOKEN_TTL_SECS", _, _))));

        let mut pairs = BASE.to_vec();
        pairs.push(("VIDTUBE_PORT", "eighty"));
        assert!(matches!(load(&pairs), Err(ConfigError::Invalid("VIDTUBE_PORT", _, _))));
    }

    #[test]
    fn media_credentials_are_required() {
        let pairs: Vec<_> = BASE
            .iter()
            .copied()
            .filter(|(k, _)| *k != "CLOUDINARY_API_KEY")
            .collect();
        assert!(matches!(load(&pairs), Err(ConfigError::Missing("CLOUDINARY_API_KEY"))));
    }
}
