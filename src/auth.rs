use axum::http::{header, HeaderMap};
use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use thiserror::Error;

use crate::db::timestamps::parse_storage;

const AUTH_COOKIE_NAME: &str = "auth_token";

#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing token")]
    MissingToken,
    #[error("invalid token")]
    InvalidToken,
    #[error("database error: {0}")]
    Database(String),
}

pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = get_cookie(headers, AUTH_COOKIE_NAME) {
        return Some(token);
    }

    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| value.to_string())
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Resolves a raw session token to its user. Sessions are issued elsewhere;
/// only the SHA-256 of the token is stored.
pub async fn verify_session(pool: &SqlitePool, token: &str) -> Result<AuthUser, AuthError> {
    let row = sqlx::query(
        r#"
        SELECT s."expires_at", u."id", u."username"
        FROM "sessions" s
        JOIN "users" u ON u."id" = s."user_id"
        WHERE s."token" = ?1
        "#,
    )
    .bind(hash_token(token))
    .fetch_optional(pool)
    .await
    .map_err(|err| AuthError::Database(err.to_string()))?;

    let Some(row) = row else {
        return Err(AuthError::InvalidToken);
    };

    let expires_at: Option<String> = row
        .try_get("expires_at")
        .map_err(|err| AuthError::Database(err.to_string()))?;
    if let Some(raw) = expires_at.as_deref().filter(|v| !v.trim().is_empty()) {
        let expires_at = parse_storage(raw).ok_or(AuthError::InvalidToken)?;
        if expires_at <= Utc::now() {
            return Err(AuthError::InvalidToken);
        }
    }

    Ok(AuthUser {
        id: row
            .try_get("id")
            .map_err(|err| AuthError::Database(err.to_string()))?,
        username: row
            .try_get("username")
            .map_err(|err| AuthError::Database(err.to_string()))?,
    })
}

pub async fn authenticate(pool: &SqlitePool, headers: &HeaderMap) -> Result<AuthUser, AuthError> {
    let token = extract_token(headers).ok_or(AuthError::MissingToken)?;
    verify_session(pool, &token).await
}

fn get_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|part| {
        let (key, value) = part.trim().split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}
