use std::time::Duration;

use thiserror::Error;

use crate::auth::token::parse_duration;

/// Fatal startup problems. Surfaced once while the process boots, never per
/// request.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingEnv(&'static str),
    #[error("unparseable duration {0:?} (expected forms like \"15m\" or \"7d\")")]
    InvalidDuration(String),
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    /// Human-readable TTL labels as configured; echoed back to clients.
    pub access_expires_in: String,
    pub refresh_expires_in: String,
    /// Parsed once at startup from the labels above.
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = require("DATABASE_URL")?;
        let access_secret = require("JWT_ACCESS_SECRET")?;
        let refresh_secret = require("JWT_REFRESH_SECRET")?;

        let access_expires_in =
            std::env::var("JWT_ACCESS_EXPIRES_IN").unwrap_or_else(|_| "15m".into());
        let refresh_expires_in =
            std::env::var("JWT_REFRESH_EXPIRES_IN").unwrap_or_else(|_| "7d".into());

        let jwt = JwtConfig {
            access_ttl: parse_duration(&access_expires_in)?,
            refresh_ttl: parse_duration(&refresh_expires_in)?,
            access_secret,
            refresh_secret,
            access_expires_in,
            refresh_expires_in,
        };

        Ok(Self { database_url, jwt })
    }
}

fn require(key: &'static str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingEnv(key))
}
