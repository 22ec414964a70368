//! Google OIDC provider implementation.

use async_trait::async_trait;
use gatehouse_core::auth::{AuthError, OidcClaims, OidcProvider, OidcProviderClient, Result};
use openidconnect::{reqwest, AuthorizationCode, Nonce, PkceCodeVerifier, TokenResponse};
use url::Url;

use super::oidc::{self, ConfiguredCoreClient};
use crate::config::ProviderConfig;

const ISSUER: &str = "https://accounts.google.com";

/// Google OIDC provider.
pub struct GoogleProvider {
    client: ConfiguredCoreClient,
    http_client: reqwest::Client,
}

impl GoogleProvider {
    /// Create a new Google provider by discovering the OIDC metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery fails or the redirect URI is invalid.
    pub async fn new(config: &ProviderConfig) -> Result<Self> {
        let http_client = oidc::http_client()?;
        let client = oidc::discover(
            ISSUER,
            &http_client,
            &config.client_id,
            config.client_secret.as_deref(),
            &config.redirect_uri,
        )
        .await?;

        Ok(Self {
            client,
            http_client,
        })
    }
}

#[async_trait]
impl OidcProviderClient for GoogleProvider {
    async fn authorization_url(&self, state: &str, pkce_challenge: &str) -> Result<Url> {
        Ok(oidc::authorization_url(
            &self.client,
            state,
            pkce_challenge,
            &["openid", "email", "profile"],
            &[],
        ))
    }

    async fn exchange_code(&self, code: &str, pkce_verifier: &str) -> Result<OidcClaims> {
        let token_response = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .map_err(|e| AuthError::CodeExchange(e.to_string()))?
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| AuthError::CodeExchange(e.to_string()))?;

        let id_token = token_response
            .id_token()
            .ok_or_else(|| AuthError::InvalidToken("No ID token in response".to_string()))?;

        let claims = id_token
            .claims(&self.client.id_token_verifier(), |_: Option<&Nonce>| Ok(()))
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        Ok(oidc::claims_from_id_token(OidcProvider::Google, claims))
    }

    fn provider(&self) -> OidcProvider {
        OidcProvider::Google
    }
}
