//! Signed-cookie sessions and the extractors built on them.

use std::convert::Infallible;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, Key, SameSite, SignedCookieJar};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha512};

use crate::auth::models::SessionUser;
use crate::error::AppError;

/// Name of the cookie carrying the session.
pub const SESSION_COOKIE: &str = "session";

/// Derive the cookie signing key from the configured secret.
///
/// SHA-512 stretches secrets of any length to the 64 bytes `Key` requires.
pub fn derive_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

/// Decode the session from the jar. Tampered or malformed cookies read as anonymous.
pub fn read_session(jar: &SignedCookieJar) -> Option<SessionUser> {
    let cookie = jar.get(SESSION_COOKIE)?;
    let raw = URL_SAFE_NO_PAD.decode(cookie.value()).ok()?;
    serde_json::from_slice(&raw).ok()
}

/// Store `user` in a fresh session cookie.
pub fn start_session(jar: SignedCookieJar, user: &SessionUser) -> Result<SignedCookieJar, AppError> {
    let json = serde_json::to_vec(user)
        .map_err(|e| AppError::Internal(format!("Failed to serialize session: {}", e)))?;

    let cookie = Cookie::build((SESSION_COOKIE, URL_SAFE_NO_PAD.encode(json)))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();

    Ok(jar.add(cookie))
}

pub fn end_session(jar: SignedCookieJar) -> SignedCookieJar {
    let cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .removal()
        .build();

    jar.remove(cookie)
}

/// The session user, if any.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<SessionUser>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
    Key: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = SignedCookieJar::<Key>::from_request_parts(parts, state).await?;
        Ok(MaybeUser(read_session(&jar)))
    }
}

/// A logged-in user. Rejects anonymous requests with 401.
#[derive(Debug, Clone)]
pub struct RequireUser(pub SessionUser);

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
    Key: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let MaybeUser(user) = match MaybeUser::from_request_parts(parts, state).await {
            Ok(user) => user,
            Err(never) => match never {},
        };

        user.map(RequireUser)
            .ok_or_else(|| AppError::Auth("Please login to access this page".into()))
    }
}

/// A logged-in administrator. 401 when anonymous, 403 for regular users.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub SessionUser);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
    Key: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireUser(user) = RequireUser::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            tracing::warn!(user_id = %user.user_id, "non-admin tried to reach the admin area");
            return Err(AppError::Forbidden("Admin access required".into()));
        }

        Ok(RequireAdmin(user))
    }
}
