//! Scripted `OidcProviderClient` for exercising the callback path in tests.

use async_trait::async_trait;
use gatehouse_core::auth::{AuthError, OidcClaims, OidcProvider, OidcProviderClient, Result};
use url::Url;

/// Provider that skips the network: the authorization URL carries the
/// state back and every code exchange yields the same scripted claims.
pub struct StubProvider {
    provider: OidcProvider,
    email: Option<String>,
    name: Option<String>,
}

impl StubProvider {
    pub fn new(provider: OidcProvider, email: Option<&str>) -> Self {
        Self {
            provider,
            email: email.map(str::to_string),
            name: None,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }
}

#[async_trait]
impl OidcProviderClient for StubProvider {
    async fn authorization_url(&self, state: &str, pkce_challenge: &str) -> Result<Url> {
        let mut url = Url::parse("https://idp.test/authorize")
            .map_err(|e| AuthError::Provider(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("provider", &self.provider.to_string())
            .append_pair("state", state)
            .append_pair("code_challenge", pkce_challenge);
        Ok(url)
    }

    async fn exchange_code(&self, code: &str, _pkce_verifier: &str) -> Result<OidcClaims> {
        if code == "rejected" {
            return Err(AuthError::CodeExchange("invalid_grant".to_string()));
        }

        Ok(OidcClaims {
            subject: format!("{}-subject", self.provider),
            email: self.email.clone(),
            name: self.name.clone(),
            provider: self.provider,
        })
    }

    fn provider(&self) -> OidcProvider {
        self.provider
    }
}
