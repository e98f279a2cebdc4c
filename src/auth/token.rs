use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::config::{ConfigError, JwtConfig};
use crate::error::ApiError;
use crate::state::AppState;

/// Claims carried by short-lived access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: Uuid,
    pub role: String,
    pub iat: usize,
    pub exp: usize,
}

/// Claims carried by refresh tokens. `token_id` names the session row this
/// token redeems against; a token whose row has a different id is rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub role: String,
    pub token_id: Uuid,
    pub iat: usize,
    pub exp: usize,
}

/// Signing and verification material for both token kinds. Access and refresh
/// tokens use distinct secrets, so a token of one kind never verifies as the
/// other.
pub struct JwtKeys {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::from_config(&state.config.jwt)
    }
}

impl JwtKeys {
    pub fn from_config(jwt: &JwtConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(jwt.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(jwt.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(jwt.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(jwt.refresh_secret.as_bytes()),
            access_ttl: jwt.access_ttl,
            refresh_ttl: jwt.refresh_ttl,
        }
    }

    pub fn sign_access(&self, user_id: Uuid, role: &str) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.access_ttl.as_secs() as i64);
        let claims = AccessClaims {
            sub: user_id,
            role: role.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.access_encoding)?;
        debug!(user_id = %user_id, "access token signed");
        Ok(token)
    }

    pub fn sign_refresh(&self, user_id: Uuid, role: &str, token_id: Uuid) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.refresh_ttl.as_secs() as i64);
        let claims = RefreshClaims {
            sub: user_id,
            role: role.to_string(),
            token_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.refresh_encoding)?;
        debug!(user_id = %user_id, token_id = %token_id, "refresh token signed");
        Ok(token)
    }

    /// Every failure (bad signature, expired, malformed, token of the other
    /// kind) collapses to the same opaque rejection.
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, ApiError> {
        decode::<AccessClaims>(token, &self.access_decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| ApiError::Unauthorized("Invalid or expired access token".into()))
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, ApiError> {
        decode::<RefreshClaims>(token, &self.refresh_decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| ApiError::Unauthorized("Invalid or expired refresh token".into()))
    }

    /// Absolute expiry for a refresh-token row created now.
    pub fn refresh_expires_at(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc() + TimeDuration::seconds(self.refresh_ttl.as_secs() as i64)
    }
}

/// Parses TTL strings like `"15m"` or `"7d"` into a [`Duration`]. The value
/// is a non-negative integer followed by one of `ms`, `s`, `m`, `h`, `d`, `w`.
pub fn parse_duration(raw: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidDuration(raw.to_string());
    let trimmed = raw.trim();
    let unit_start = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(invalid)?;
    let (value, unit) = trimmed.split_at(unit_start);
    let value: u64 = value.parse().map_err(|_| invalid())?;
    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3_600)),
        "d" => Ok(Duration::from_secs(value * 86_400)),
        "w" => Ok(Duration::from_secs(value * 604_800)),
        _ => Err(invalid()),
    }
}
