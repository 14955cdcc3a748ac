use std::num::NonZeroU32;
use std::str::FromStr;

use thiserror::Error;
use tracing::warn;

pub const DEFAULT_PENDING_TTL_SECS: u64 = 300;
pub const DEFAULT_TEMPORARY_TOKEN_TTL_SECS: i64 = 5 * 60;
pub const DEFAULT_SESSION_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;
pub const DEFAULT_PASSWORD_ITERATIONS: u32 = 100_000;
pub const DEFAULT_APP_NAME: &str = "Gatherly";

/// Workers KV refuses an `expiration_ttl` shorter than this.
pub const MIN_PENDING_TTL_SECS: u64 = 60;
/// Upper bound for every TTL, keeping `iat + ttl` far from overflow.
pub const MAX_TTL_SECS: i64 = 365 * 24 * 60 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Tunables of the registration handshake.
#[derive(Clone, Debug)]
pub struct RegistrationConfig {
    /// HMAC key for both temporary and session credentials.
    pub jwt_secret: Vec<u8>,
    pub pending_ttl_secs: u64,
    pub temporary_token_ttl_secs: i64,
    pub session_token_ttl_secs: i64,
    pub password_iterations: NonZeroU32,
    /// Shown in verification emails.
    pub app_name: String,
}

impl RegistrationConfig {
    pub fn new(jwt_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            pending_ttl_secs: DEFAULT_PENDING_TTL_SECS,
            temporary_token_ttl_secs: DEFAULT_TEMPORARY_TOKEN_TTL_SECS,
            session_token_ttl_secs: DEFAULT_SESSION_TOKEN_TTL_SECS,
            password_iterations: NonZeroU32::new(DEFAULT_PASSWORD_ITERATIONS)
                .unwrap_or(NonZeroU32::MIN),
            app_name: DEFAULT_APP_NAME.to_string(),
        }
    }

    /// Build the config from a key lookup (Worker env vars, a map in tests).
    ///
    /// Values are normalized with [`normalize_env_value`]; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(normalize_env_value)
                .filter(|v| !v.is_empty())
        };

        let secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        let mut config = Self::new(secret.into_bytes());

        if let Some(v) = get("REGISTRATION_TTL_SECONDS") {
            config.pending_ttl_secs = parse_bounded(
                "REGISTRATION_TTL_SECONDS",
                &v,
                MIN_PENDING_TTL_SECS,
                MAX_TTL_SECS as u64,
            )?;
        }
        if let Some(v) = get("TEMPORARY_TOKEN_TTL_SECONDS") {
            config.temporary_token_ttl_secs =
                parse_bounded("TEMPORARY_TOKEN_TTL_SECONDS", &v, 1, MAX_TTL_SECS)?;
        }
        if let Some(v) = get("SESSION_TOKEN_TTL_SECONDS") {
            config.session_token_ttl_secs =
                parse_bounded("SESSION_TOKEN_TTL_SECONDS", &v, 1, MAX_TTL_SECS)?;
        }
        if let Some(v) = get("PASSWORD_ITERATIONS") {
            let iterations = parse_bounded("PASSWORD_ITERATIONS", &v, 1, u32::MAX)?;
            config.password_iterations =
                NonZeroU32::new(iterations).ok_or(ConfigError::Invalid {
                    key: "PASSWORD_ITERATIONS",
                    value: v,
                })?;
        }
        if let Some(v) = get("APP_NAME") {
            config.app_name = v;
        }

        if config.temporary_token_ttl_secs as u64 > config.pending_ttl_secs {
            warn!(
                temporary = config.temporary_token_ttl_secs,
                pending = config.pending_ttl_secs,
                "temporary credential outlives the pending registration"
            );
        }

        Ok(config)
    }
}

fn parse_bounded<T>(key: &'static str, value: &str, min: T, max: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd,
{
    match value.parse::<T>() {
        Ok(parsed) if parsed >= min && parsed <= max => Ok(parsed),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}

/// Strip surrounding whitespace and one level of matching quotes.
pub fn normalize_env_value(raw: String) -> String {
    let trimmed = raw.trim();

    if let Some(inner) = trimmed.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        return inner.trim().to_string();
    }
    if let Some(inner) = trimmed.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        return inner.trim().to_string();
    }

    trimmed.to_string()
}
