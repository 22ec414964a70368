use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use gatehouse_core::directory::RepositoryError;
use thiserror::Error;

/// Auth errors for the gatehouse_auth crate.
///
/// This wraps the core `AuthError` and directory `RepositoryError` and adds
/// the variants that only exist at the HTTP edge.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Error from the core auth module (token parsing, flow state, storage)
    #[error(transparent)]
    Core(#[from] gatehouse_core::auth::AuthError),

    /// Error from the user/membership/invite directory
    #[error(transparent)]
    Directory(#[from] RepositoryError),

    /// The invite-only gate refused the email
    #[error("sign-in not permitted")]
    SignInDenied,

    /// Emailed code was wrong, already used, or expired
    #[error("invalid or expired verification code")]
    InvalidCode,

    /// Request is missing a valid session
    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Provider not configured
    #[error("provider not configured: {0}")]
    ProviderNotConfigured(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        use gatehouse_core::auth::AuthError as CoreError;

        let (status, message) = match &self {
            AuthError::Core(core_err) => match core_err {
                CoreError::InvalidState => (StatusCode::BAD_REQUEST, self.to_string()),
                CoreError::InvalidToken(_) | CoreError::MissingClaim(_) => {
                    (StatusCode::UNAUTHORIZED, self.to_string())
                }
                CoreError::CodeExchange(_) | CoreError::Provider(_) => {
                    tracing::error!("Provider error during auth: {}", self);
                    (
                        StatusCode::BAD_GATEWAY,
                        "Authentication provider error".to_string(),
                    )
                }
                CoreError::Storage(_) | CoreError::Delivery(_) => {
                    tracing::error!("Auth error: {}", self);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                    )
                }
            },
            AuthError::Directory(_) => {
                tracing::error!("Directory error during auth: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            // Which rule refused the email is only logged, never returned.
            AuthError::SignInDenied => (StatusCode::FORBIDDEN, self.to_string()),
            AuthError::InvalidCode => (StatusCode::BAD_REQUEST, self.to_string()),
            AuthError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            AuthError::Config(_) => {
                tracing::error!("Config error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Server configuration error".to_string(),
                )
            }
            AuthError::ProviderNotConfigured(provider) => (
                StatusCode::NOT_FOUND,
                format!("Authentication provider '{}' is not configured", provider),
            ),
        };

        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denial_maps_to_forbidden_with_generic_message() {
        let response = AuthError::SignInDenied.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn invalid_state_maps_to_bad_request() {
        let response = AuthError::Core(gatehouse_core::auth::AuthError::InvalidState).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn directory_failure_maps_to_internal_error() {
        let err = AuthError::from(RepositoryError::ConnectionFailed("down".to_string()));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn failed_code_exchange_maps_to_bad_gateway() {
        let err = AuthError::Core(gatehouse_core::auth::AuthError::CodeExchange(
            "invalid_grant".to_string(),
        ));
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn unconfigured_provider_maps_to_not_found() {
        let response = AuthError::ProviderNotConfigured("Apple".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
