//! Registration, login and bearer-token resolution.
//!
//! Tokens are opaque random strings stored server-side with an expiry;
//! the poll core only ever sees the resolved [`RequestContext`].

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{DateTime, Duration, Utc};
use http::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    context::RequestContext,
    error::{AppError, AppResult},
    models::{NewUser, User},
    state::AppState,
    store::{AccountStore, Store},
};

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub access: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

pub fn validate_email(email: &str) -> AppResult<String> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        return Err(AppError::validation("Enter a valid email address."));
    }
    Ok(email.to_string())
}

pub fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(AppError::validation(
            "Password must contain at least one uppercase letter",
        ));
    }
    Ok(())
}

fn required(field: &str, value: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::validation(format!("{field} cannot be blank.")));
    }
    Ok(value.to_string())
}

async fn hash_password(password: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(e.to_string()))
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

async fn verify_password(password: String, hash: String) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || match PasswordHash::new(&hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))
}

pub async fn register<S: AccountStore>(
    store: &S,
    registration: &Registration,
    now: DateTime<Utc>,
) -> AppResult<User> {
    let first_name = required("First name", &registration.first_name)?;
    let last_name = required("Last name", &registration.last_name)?;
    let email = validate_email(&registration.email)?;
    validate_password(&registration.password)?;

    let password_hash = hash_password(registration.password.clone()).await?;
    let user = store
        .insert_user(NewUser {
            first_name,
            last_name,
            email,
            password_hash,
            created_at: now,
        })
        .await?;

    info!(user = %user.id, "User registered");
    Ok(user)
}

pub async fn login<S: AccountStore>(
    store: &S,
    credentials: &Credentials,
    now: DateTime<Utc>,
    ttl: Duration,
) -> AppResult<Session> {
    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

    let user = store
        .find_user_by_email(credentials.email.trim())
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(credentials.password.clone(), user.password_hash.clone()).await? {
        debug!(user = %user.id, "Login with wrong password");
        return Err(invalid());
    }

    let access = Uuid::new_v4().simple().to_string();
    let expires_at = now + ttl;
    store
        .insert_session(access.clone(), user.id, expires_at)
        .await?;

    info!(user = %user.id, "Session issued");
    Ok(Session {
        access,
        expires_at,
        user,
    })
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl<S: Store> FromRequestParts<Arc<AppState<S>>> for RequestContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| {
            AppError::Unauthorized("Authentication credentials were not provided.".to_string())
        })?;

        let now = Utc::now();
        let user = state
            .store
            .find_session_user(token, now)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid or expired token.".to_string()))?;

        Ok(RequestContext::at(user.id, now))
    }
}
