//! Who is making a request: an account holder or an anonymous guest.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use axum_extra::{
    extract::cookie::{Cookie, CookieJar, SameSite},
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    routes::auth::{generate_token, verify_token, TokenKind},
    state::AppState,
};

pub const GUEST_COOKIE: &str = "tavernkeep_guest";

/// Each variant has at most one participant record per room, keyed by
/// [`Actor::key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Identified(Uuid),
    /// Guest identity carried in a signed session cookie
    Guest(Uuid),
}

impl Actor {
    pub fn key(&self) -> String {
        match self {
            Actor::Identified(id) => format!("user:{id}"),
            Actor::Guest(id) => format!("guest:{id}"),
        }
    }

    pub fn user_id(&self) -> Option<String> {
        match self {
            Actor::Identified(id) => Some(id.to_string()),
            Actor::Guest(_) => None,
        }
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, Actor::Guest(_))
    }

    pub fn is_user(&self, user_id: &str) -> bool {
        matches!(self, Actor::Identified(id) if id.to_string() == user_id)
    }
}

pub fn is_guest_key(key: &str) -> bool {
    key.starts_with("guest:")
}

/// The request's actor plus the cookie jar to send back.
///
/// A guest without a valid cookie gets a freshly minted identity; handlers
/// return `jar` so the cookie reaches the browser.
pub struct RequestActor {
    pub actor: Actor,
    pub jar: CookieJar,
}

impl RequestActor {
    /// Reject anonymous callers
    pub fn user_id(&self) -> Result<String, AppError> {
        self.actor
            .user_id()
            .ok_or_else(|| AppError::AuthError("Sign in required".to_string()))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for RequestActor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let secret = &state.config.auth.jwt_secret;

        // any Authorization header must be a valid bearer token; it never
        // falls back to a guest identity
        if parts.headers.contains_key(header::AUTHORIZATION) {
            let TypedHeader(Authorization(bearer)) =
                TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                    .await
                    .map_err(|_| AppError::AuthError("Expected a bearer token".to_string()))?;
            let claims = verify_token(bearer.token(), TokenKind::User, secret)?;
            let user_id = Uuid::parse_str(&claims.sub)
                .map_err(|_| AppError::AuthError("Malformed token subject".to_string()))?;
            return Ok(Self { actor: Actor::Identified(user_id), jar });
        }

        let existing = jar
            .get(GUEST_COOKIE)
            .and_then(|c| verify_token(c.value(), TokenKind::Guest, secret).ok())
            .and_then(|claims| Uuid::parse_str(&claims.sub).ok());

        if let Some(guest_id) = existing {
            return Ok(Self { actor: Actor::Guest(guest_id), jar });
        }

        let guest_id = Uuid::new_v4();
        let token = generate_token(&guest_id.to_string(), TokenKind::Guest, &state.config.auth)?;
        let cookie = Cookie::build((GUEST_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax);
        tracing::debug!("Minted guest identity {}", guest_id);

        Ok(Self {
            actor: Actor::Guest(guest_id),
            jar: jar.add(cookie),
        })
    }
}
