use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method};
use axum::middleware::Next;
use axum::response::Response;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::state::AppState;
use crate::types::{PublicUser, User};

pub const SESSION_COOKIE: &str = "session";
pub const CSRF_COOKIE: &str = "csrftoken";
pub const CSRF_HEADER: &str = "x-csrf-token";
pub const ADMIN_HEADER: &str = "x-admin-password";
pub const SESSION_TTL_DAYS: i64 = 14;

pub fn new_salt() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    hex::encode(bytes)
}

pub fn new_csrf_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    hex::encode(bytes)
}

pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn verify_password(user: &User, password: &str) -> bool {
    constant_time_eq(
        hash_password(&user.salt, password).as_bytes(),
        user.password_hash.as_bytes(),
    )
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn validate_username(username: &str) -> Result<(), AppError> {
    if username.len() < 3 {
        return Err(AppError::BadRequest(
            "Username cannot be less than 3 characters".to_string(),
        ));
    }
    if username.len() > 20 {
        return Err(AppError::BadRequest(
            "Username cannot exceed 20 characters".to_string(),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(AppError::BadRequest(
            "Username may only contain letters, digits and underscores".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < 8 {
        return Err(AppError::BadRequest(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    Ok(())
}

// ─── Cookies ──────────────────────────────────────────────────────

pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|c| c.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
        .filter(|v| !v.is_empty())
}

fn cookie(name: &str, value: &str, max_age: i64, http_only: bool, secure: bool) -> String {
    let mut out = format!("{name}={value}; Max-Age={max_age}; Path=/; SameSite=Lax");
    if http_only {
        out.push_str("; HttpOnly");
    }
    if secure {
        out.push_str("; Secure");
    }
    out
}

pub fn session_cookie(token: &str, secure: bool) -> String {
    cookie(SESSION_COOKIE, token, SESSION_TTL_DAYS * 86_400, true, secure)
}

pub fn clear_session_cookie(secure: bool) -> String {
    cookie(SESSION_COOKIE, "", 0, true, secure)
}

/// Readable by scripts so the frontend can echo it in the CSRF header.
pub fn csrf_cookie(token: &str, secure: bool) -> String {
    cookie(CSRF_COOKIE, token, SESSION_TTL_DAYS * 86_400, false, secure)
}

// ─── Extractors ───────────────────────────────────────────────────

/// The logged-in user behind the request's session cookie.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub PublicUser);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = cookie_value(&parts.headers, SESSION_COOKIE).ok_or(AppError::Unauthorized)?;
        state
            .store
            .session_user(token, chrono::Utc::now())
            .map(CurrentUser)
            .ok_or(AppError::Unauthorized)
    }
}

/// Guard for grading endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Admin;

impl FromRequestParts<AppState> for Admin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let given = parts
            .headers
            .get(ADMIN_HEADER)
            .and_then(|h| h.to_str().ok())
            .unwrap_or_default();
        if constant_time_eq(given.as_bytes(), state.league.admin_password.as_bytes()) {
            Ok(Admin)
        } else {
            tracing::warn!("Rejected admin request to {}", parts.uri.path());
            Err(AppError::Forbidden("Invalid admin password"))
        }
    }
}

/// Double-submit CSRF check for every state-changing API call outside the
/// admin surface, which authenticates by header instead of cookie.
pub async fn require_csrf(request: Request, next: Next) -> Result<Response, AppError> {
    let safe = matches!(*request.method(), Method::GET | Method::HEAD | Method::OPTIONS);
    let path = request.uri().path();
    if safe || !path.starts_with("/api/") || path.starts_with("/api/admin/") {
        return Ok(next.run(request).await);
    }

    let cookie = cookie_value(request.headers(), CSRF_COOKIE);
    let header = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|h| h.to_str().ok());

    let valid = match (cookie, header) {
        (Some(c), Some(h)) => constant_time_eq(c.as_bytes(), h.as_bytes()),
        _ => false,
    };
    if !valid {
        return Err(AppError::Forbidden("CSRF token missing or invalid"));
    }
    Ok(next.run(request).await)
}
