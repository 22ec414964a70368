//! Application state for auth.

use axum::extract::FromRef;
use gatehouse_core::auth::{
    AuthFlowRepository, CodeMailer, OidcProvider, OidcProviderClient, VerificationCodeRepository,
};
use gatehouse_core::directory::{InviteRepository, MembershipRepository, UserRepository};
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::directory::InMemoryDirectory;
use crate::error::AuthError;
use crate::jwt::SessionCodec;
use crate::mailer::LogMailer;
use crate::policy::SignupPolicy;
use crate::providers::{AppleProvider, GoogleProvider};
use crate::stores::MemoryAuthStore;

/// Storage the auth routes depend on, constructed once at startup.
#[derive(Clone)]
pub struct AuthStores {
    pub flows: Arc<dyn AuthFlowRepository>,
    pub codes: Arc<dyn VerificationCodeRepository>,
    pub users: Arc<dyn UserRepository>,
    pub memberships: Arc<dyn MembershipRepository>,
    pub invites: Arc<dyn InviteRepository>,
}

impl AuthStores {
    /// Everything in memory. Handy for tests and local development.
    pub fn in_memory(store: MemoryAuthStore, directory: InMemoryDirectory) -> Self {
        let store = Arc::new(store);
        let directory = Arc::new(directory);
        Self {
            flows: store.clone(),
            codes: store,
            users: directory.clone(),
            memberships: directory.clone(),
            invites: directory,
        }
    }
}

/// Shared state for auth handlers.
#[derive(Clone)]
pub struct AuthState {
    pub flows: Arc<dyn AuthFlowRepository>,
    pub codes: Arc<dyn VerificationCodeRepository>,
    pub users: Arc<dyn UserRepository>,
    pub mailer: Arc<dyn CodeMailer>,
    pub policy: SignupPolicy,
    pub sessions: SessionCodec,
    pub config: AuthConfig,
    google: Option<Arc<dyn OidcProviderClient>>,
    apple: Option<Arc<dyn OidcProviderClient>>,
}

impl AuthState {
    /// Creates the auth state, wiring the sign-in policy to the directory
    /// and discovering the configured OIDC providers.
    ///
    /// # Errors
    ///
    /// Returns an error if provider initialization fails (e.g., OIDC discovery).
    pub async fn new(
        stores: AuthStores,
        mailer: Arc<dyn CodeMailer>,
        config: AuthConfig,
    ) -> Result<Self, AuthError> {
        let google: Option<Arc<dyn OidcProviderClient>> = match config.google {
            Some(ref cfg) => Some(Arc::new(GoogleProvider::new(cfg).await?)),
            None => None,
        };

        let apple: Option<Arc<dyn OidcProviderClient>> = match config.apple {
            Some(ref cfg) => Some(Arc::new(AppleProvider::new(cfg).await?)),
            None => None,
        };

        let policy = SignupPolicy::new(
            &config.signup,
            stores.users.clone(),
            stores.memberships,
            stores.invites,
        );

        tracing::info!(
            google = google.is_some(),
            apple = apple.is_some(),
            allow_listed = config.signup.allow_list.len(),
            "auth state initialized"
        );

        Ok(Self {
            flows: stores.flows,
            codes: stores.codes,
            users: stores.users,
            mailer,
            policy,
            sessions: SessionCodec::new(&config.jwt_secret, config.session_ttl),
            config,
            google,
            apple,
        })
    }

    /// In-memory state that logs sign-in codes instead of emailing them.
    pub async fn local(config: AuthConfig, directory: InMemoryDirectory) -> Result<Self, AuthError> {
        Self::new(
            AuthStores::in_memory(MemoryAuthStore::new(), directory),
            Arc::new(LogMailer),
            config,
        )
        .await
    }

    /// Replaces the client used for `client.provider()`.
    pub fn with_provider(mut self, client: Arc<dyn OidcProviderClient>) -> Self {
        match client.provider() {
            OidcProvider::Google => self.google = Some(client),
            OidcProvider::Apple => self.apple = Some(client),
        }
        self
    }

    /// Gets the provider client for the given OIDC provider.
    ///
    /// # Errors
    ///
    /// Returns `ProviderNotConfigured` if the provider is not enabled.
    pub fn get_provider(
        &self,
        provider: OidcProvider,
    ) -> Result<&dyn OidcProviderClient, AuthError> {
        match provider {
            OidcProvider::Google => self
                .google
                .as_deref()
                .ok_or_else(|| AuthError::ProviderNotConfigured("Google".to_string())),
            OidcProvider::Apple => self
                .apple
                .as_deref()
                .ok_or_else(|| AuthError::ProviderNotConfigured("Apple".to_string())),
        }
    }
}

/// Allows AuthState to be extracted from a parent state.
impl<S> FromRef<S> for AuthState
where
    S: AsRef<AuthState>,
{
    fn from_ref(state: &S) -> Self {
        state.as_ref().clone()
    }
}
