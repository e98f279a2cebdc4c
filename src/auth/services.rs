use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::dto::{AuthResponse, LoginRequest, PublicUser, RegisterRequest};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::repo_types::{RefreshTokenRow, User};
use crate::auth::token::JwtKeys;
use crate::error::{is_unique_violation, ApiError, FieldViolation};
use crate::state::AppState;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn validate_register(req: &RegisterRequest) -> Result<(), ApiError> {
    let mut violations = Vec::new();
    if !is_valid_email(&req.email) {
        violations.push(FieldViolation::new("email", "format", "Invalid email address"));
    }
    if req.password.chars().count() < 8 {
        violations.push(FieldViolation::new(
            "password",
            "min_length",
            "Password must be at least 8 characters",
        ));
    }
    let name_len = req.display_name.chars().count();
    if !(2..=50).contains(&name_len) {
        violations.push(FieldViolation::new(
            "display_name",
            "length",
            "Display name must be between 2 and 50 characters",
        ));
    }
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(violations))
    }
}

fn validate_refresh_token(refresh_token: &str) -> Result<(), ApiError> {
    if refresh_token.chars().count() < 10 {
        return Err(ApiError::validation(
            "refresh_token",
            "min_length",
            "Refresh token must be at least 10 characters",
        ));
    }
    Ok(())
}

/// Create an account and sign the new user in. Emails are stored exactly as
/// given; two addresses differing only in case are two accounts.
pub async fn register(state: &AppState, req: RegisterRequest) -> Result<AuthResponse, ApiError> {
    validate_register(&req)?;

    if User::find_by_email(&state.db, &req.email).await?.is_some() {
        warn!(email = %req.email, "email already registered");
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let hash = hash_password(&req.password)?;
    let user = match User::create(&state.db, &req.email, &hash, &req.display_name).await {
        Ok(u) => u,
        // Concurrent registration of the same email loses the insert race.
        Err(e) if is_unique_violation(&e) => {
            warn!(email = %req.email, "email already registered");
            return Err(ApiError::Conflict("Email already registered".into()));
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = %user.id, email = %user.email, "user registered");
    issue_token_pair(state, &user).await
}

/// Unknown email and wrong password are indistinguishable to the caller.
pub async fn login(state: &AppState, req: LoginRequest) -> Result<AuthResponse, ApiError> {
    let mut violations = Vec::new();
    if !is_valid_email(&req.email) {
        violations.push(FieldViolation::new("email", "format", "Invalid email address"));
    }
    if req.password.is_empty() {
        violations.push(FieldViolation::new("password", "required", "Password is required"));
    }
    if !violations.is_empty() {
        return Err(ApiError::Validation(violations));
    }

    let user = match User::find_by_email(&state.db, &req.email).await? {
        Some(u) => u,
        None => {
            warn!(email = %req.email, "login unknown email");
            return Err(ApiError::Unauthorized("Invalid email or password".into()));
        }
    };

    if !verify_password(&req.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthorized("Invalid email or password".into()));
    }

    info!(user_id = %user.id, "user logged in");
    issue_token_pair(state, &user).await
}

/// Redeem a refresh token for a fresh pair. The presented token is spent by
/// this call no matter the verdict: the session row is removed atomically
/// before any check, so a second redemption of the same token always fails.
pub async fn refresh(state: &AppState, refresh_token: &str) -> Result<AuthResponse, ApiError> {
    validate_refresh_token(refresh_token)?;

    let keys = JwtKeys::from_config(&state.config.jwt);
    let claims = keys.verify_refresh(refresh_token)?;

    let row = RefreshTokenRow::consume(&state.db, refresh_token)
        .await?
        .ok_or_else(|| {
            warn!(user_id = %claims.sub, "refresh token not recognized");
            ApiError::Unauthorized("Refresh token not recognized".into())
        })?;

    if row.expires_at < OffsetDateTime::now_utc() {
        warn!(user_id = %claims.sub, token_id = %row.id, "refresh token expired");
        return Err(ApiError::Unauthorized("Refresh token expired".into()));
    }
    if row.id != claims.token_id {
        warn!(user_id = %claims.sub, token_id = %row.id, "refresh token mismatch");
        return Err(ApiError::Unauthorized("Refresh token mismatch".into()));
    }

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    info!(user_id = %user.id, "refresh token rotated");
    issue_token_pair(state, &user).await
}

/// Forget the session for a refresh token. Unknown tokens are already logged
/// out, so this never fails on a missing row.
pub async fn logout(state: &AppState, refresh_token: &str) -> Result<(), ApiError> {
    validate_refresh_token(refresh_token)?;

    let removed = RefreshTokenRow::delete_by_token(&state.db, refresh_token).await?;
    debug!(removed, "logout");
    Ok(())
}

pub async fn current_user(state: &AppState, user_id: Uuid) -> Result<PublicUser, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(PublicUser::from(user))
}

/// Mint an access/refresh pair and record the refresh session. Every pair in
/// the system is created here, so each refresh token is born with exactly one
/// session row, and claims always carry the user's current stored role.
pub async fn issue_token_pair(state: &AppState, user: &User) -> Result<AuthResponse, ApiError> {
    let keys = JwtKeys::from_config(&state.config.jwt);
    let token_id = Uuid::new_v4();
    let access_token = keys.sign_access(user.id, &user.role)?;
    let refresh_token = keys.sign_refresh(user.id, &user.role, token_id)?;
    let refresh_expires_at = keys.refresh_expires_at();

    RefreshTokenRow::record(&state.db, token_id, &refresh_token, user.id, refresh_expires_at)
        .await?;

    Ok(AuthResponse {
        user: PublicUser::from(user.clone()),
        access_token,
        refresh_token,
        refresh_expires_at,
        expires_in: state.config.jwt.access_expires_in.clone(),
    })
}
