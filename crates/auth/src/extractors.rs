//! Axum extractors for authentication.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::CookieJar;
use gatehouse_core::directory::User;

use crate::error::AuthError;
use crate::AuthState;

/// Extractor for the authenticated user. Rejects with 401 if the request
/// has no valid session token.
///
/// The token is read from `Authorization: Bearer <jwt>` first (API clients)
/// and then from the session cookie (browsers).
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    AuthState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = AuthState::from_ref(state);

        let bearer = match parts.headers.get(AUTHORIZATION) {
            Some(value) => {
                let value = value
                    .to_str()
                    .map_err(|_| AuthError::Unauthorized("invalid authorization header"))?;
                value.strip_prefix("Bearer ").map(str::to_string)
            }
            None => None,
        };

        let token = match bearer {
            Some(token) => token,
            None => CookieJar::from_headers(&parts.headers)
                .get(&auth_state.config.cookie_name)
                .map(|cookie| cookie.value().to_string())
                .ok_or(AuthError::Unauthorized("no session"))?,
        };

        let claims = auth_state
            .sessions
            .decode(&token)
            .map_err(|_| AuthError::Unauthorized("invalid or expired session"))?;

        let user_id: uuid::Uuid = claims
            .sub
            .parse()
            .map_err(|_| AuthError::Unauthorized("invalid session subject"))?;

        let user = auth_state
            .users
            .get_user(user_id)
            .await?
            .ok_or(AuthError::Unauthorized("user not found"))?;

        Ok(CurrentUser(user))
    }
}
