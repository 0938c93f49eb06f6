//! Session authentication
//!
//! Sessions are HS256 tokens carried in the `token` cookie with a `userId`
//! claim. Issuing them at login is outside this service; [`SessionKeys::issue`]
//! exists for seeding and tests.

use axum::{extract::FromRequestParts, http::header, http::request::Parts};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use market_core::{Course, MarketError, User, UserId};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "token";
const SESSION_TTL_HOURS: i64 = 24;

const LOGIN_REQUIRED: &str = "Please login first";
const INVALID_TOKEN: &str = "Invalid or expired token";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Claims {
    user_id: UserId,
    iat: i64,
    exp: i64,
}

/// Signing and verification keys for session tokens
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SessionKeys {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Token valid for one day from `now`
    pub fn issue(&self, user_id: UserId, now: DateTime<Utc>) -> Result<String, MarketError> {
        let claims = Claims {
            user_id,
            iat: now.timestamp(),
            exp: (now + Duration::hours(SESSION_TTL_HOURS)).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| MarketError::Storage(format!("token signing failed: {e}")))
    }

    pub fn verify(&self, token: &str) -> Result<UserId, MarketError> {
        decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims.user_id)
            .map_err(|_| MarketError::Unauthorized(INVALID_TOKEN.into()))
    }
}

fn session_cookie(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

async fn load_user(state: &AppState, token: &str) -> Result<User, ApiError> {
    let user_id = state.sessions.verify(token)?;
    state
        .catalog
        .get_user(user_id)
        .await?
        .ok_or_else(|| MarketError::Unauthorized(INVALID_TOKEN.into()).into())
}

/// Authenticated caller; rejects with 401
#[derive(Clone, Debug)]
pub struct AuthUser(pub User);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_cookie(parts)
            .ok_or_else(|| MarketError::Unauthorized(LOGIN_REQUIRED.into()))?;
        load_user(state, token).await.map(Self)
    }
}

/// Caller if a valid session is present, anonymous otherwise
#[derive(Clone, Debug)]
pub struct MaybeUser(pub Option<User>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = session_cookie(parts) else {
            return Ok(Self(None));
        };
        match load_user(state, token).await {
            Ok(user) => Ok(Self(Some(user))),
            Err(ApiError::Market(MarketError::Unauthorized(_))) => Ok(Self(None)),
            Err(err) => Err(err),
        }
    }
}

impl AuthUser {
    /// Course authoring needs the instructor or admin role
    pub fn require_instructor(&self) -> Result<(), ApiError> {
        if self.0.role.can_author() {
            Ok(())
        } else {
            Err(MarketError::forbidden("Only instructors can perform this action").into())
        }
    }

    /// Mutating a course needs its creator or an admin
    pub fn require_owner(&self, course: &Course) -> Result<(), ApiError> {
        if course.is_creator(self.0.id) || self.0.role == market_core::Role::Admin {
            Ok(())
        } else {
            Err(MarketError::forbidden("You are not the creator of this course").into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn test_issue_and_verify() {
        let keys = SessionKeys::new(b"test-secret");
        let user = UserId::new();
        let token = keys.issue(user, Utc::now()).unwrap();
        assert_eq!(keys.verify(&token).unwrap(), user);
    }

    #[test]
    fn test_rejects_foreign_and_expired_tokens() {
        let keys = SessionKeys::new(b"test-secret");
        let other = SessionKeys::new(b"other-secret");
        let user = UserId::new();

        let foreign = other.issue(user, Utc::now()).unwrap();
        assert!(matches!(
            keys.verify(&foreign),
            Err(MarketError::Unauthorized(_))
        ));

        let expired = keys.issue(user, Utc::now() - Duration::days(2)).unwrap();
        assert!(keys.verify(&expired).is_err());
        assert!(keys.verify("garbage").is_err());
    }

    #[test]
    fn test_cookie_parsing() {
        let (parts, ()) = Request::builder()
            .header(header::COOKIE, "theme=dark; token=abc.def.ghi; lang=en")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(session_cookie(&parts), Some("abc.def.ghi"));

        let (parts, ()) = Request::builder()
            .header(header::COOKIE, "token=")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(session_cookie(&parts), None);
    }
}
