use async_trait::async_trait;
use url::Url;

use super::{AuthError, AuthFlowState, OidcClaims, OidcProvider, VerificationCode};

/// Result type for auth operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Abstraction over OIDC identity providers.
#[async_trait]
pub trait OidcProviderClient: Send + Sync {
    /// Generate authorization URL for user redirect.
    async fn authorization_url(&self, state: &str, pkce_challenge: &str) -> Result<Url>;

    /// Exchange authorization code for claims.
    async fn exchange_code(&self, code: &str, pkce_verifier: &str) -> Result<OidcClaims>;

    /// Which provider this client represents.
    fn provider(&self) -> OidcProvider;
}

/// Short-lived storage for in-progress OIDC flows.
#[async_trait]
pub trait AuthFlowRepository: Send + Sync {
    /// Store PKCE/state for auth flow (short TTL).
    async fn store_auth_flow(&self, state: &str, flow: &AuthFlowState) -> Result<()>;

    /// Retrieve and delete auth flow state. Flows older than
    /// [`auth_flow_ttl`](super::auth_flow_ttl) are not returned.
    async fn take_auth_flow(&self, state: &str) -> Result<Option<AuthFlowState>>;
}

/// Storage for emailed one-time sign-in codes.
///
/// At most one code is live per email: storing a new code replaces the
/// previous one.
#[async_trait]
pub trait VerificationCodeRepository: Send + Sync {
    /// Store a code, replacing any earlier code for the same email.
    async fn store_code(&self, code: &VerificationCode) -> Result<()>;

    /// Consume the code if it matches the one stored for `email`.
    ///
    /// A mismatching code counts as a failed attempt against the stored
    /// code; once [`MAX_CODE_ATTEMPTS`](super::MAX_CODE_ATTEMPTS) attempts
    /// have failed the code is discarded. Expiry is not checked here.
    async fn take_code(&self, email: &str, code: &str) -> Result<Option<VerificationCode>>;
}

/// Delivers sign-in codes to the address they were issued for.
#[async_trait]
pub trait CodeMailer: Send + Sync {
    async fn send_code(&self, code: &VerificationCode) -> Result<()>;
}
