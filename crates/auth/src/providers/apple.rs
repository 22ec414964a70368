//! Apple OIDC provider implementation.
//!
//! Apple requires a signed ES256 JWT as the client secret on every token
//! request, and posts the callback back as a form.

use async_trait::async_trait;
use chrono::Utc;
use gatehouse_core::auth::{AuthError, OidcClaims, OidcProvider, OidcProviderClient, Result};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use openidconnect::{reqwest, AuthorizationCode, Nonce, PkceCodeVerifier, TokenResponse};
use serde::Serialize;
use url::Url;

use super::oidc::{self, ConfiguredCoreClient};
use crate::config::AppleConfig;

const ISSUER: &str = "https://appleid.apple.com";
/// Apple caps client secret lifetime at six months.
const CLIENT_SECRET_TTL_SECS: i64 = 86_400 * 180;

/// Apple OIDC provider.
pub struct AppleProvider {
    client: ConfiguredCoreClient,
    http_client: reqwest::Client,
    encoding_key: EncodingKey,
    config: AppleConfig,
}

#[derive(Serialize)]
struct ClientSecretClaims<'a> {
    iss: &'a str,
    iat: i64,
    exp: i64,
    aud: &'static str,
    sub: &'a str,
}

impl AppleProvider {
    /// Create a new Apple provider by discovering the OIDC metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the private key is not a valid EC PEM, discovery
    /// fails, or the redirect URI is invalid.
    pub async fn new(config: &AppleConfig) -> Result<Self> {
        let encoding_key = EncodingKey::from_ec_pem(config.private_key.as_bytes())
            .map_err(|e| AuthError::Provider(format!("Invalid Apple private key: {}", e)))?;

        let http_client = oidc::http_client()?;
        // No static secret: one is signed per token request.
        let client = oidc::discover(
            ISSUER,
            &http_client,
            &config.client_id,
            None,
            &config.redirect_uri,
        )
        .await?;

        Ok(Self {
            client,
            http_client,
            encoding_key,
            config: config.clone(),
        })
    }

    /// See: <https://developer.apple.com/documentation/sign_in_with_apple/generate_and_validate_tokens>
    fn client_secret(&self) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = ClientSecretClaims {
            iss: &self.config.team_id,
            iat: now,
            exp: now + CLIENT_SECRET_TTL_SECS,
            aud: ISSUER,
            sub: &self.config.client_id,
        };

        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.config.key_id.clone());

        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| AuthError::Provider(format!("Failed to sign Apple JWT: {}", e)))
    }
}

#[async_trait]
impl OidcProviderClient for AppleProvider {
    async fn authorization_url(&self, state: &str, pkce_challenge: &str) -> Result<Url> {
        Ok(oidc::authorization_url(
            &self.client,
            state,
            pkce_challenge,
            &["openid", "email", "name"],
            &[("response_mode", "form_post")],
        ))
    }

    async fn exchange_code(&self, code: &str, pkce_verifier: &str) -> Result<OidcClaims> {
        let client_secret = self.client_secret()?;

        let token_response = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .map_err(|e| AuthError::CodeExchange(e.to_string()))?
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_string()))
            .add_extra_param("client_secret", &client_secret)
            .request_async(&self.http_client)
            .await
            .map_err(|e| AuthError::CodeExchange(e.to_string()))?;

        let id_token = token_response
            .id_token()
            .ok_or_else(|| AuthError::InvalidToken("No ID token in response".to_string()))?;

        let claims = id_token
            .claims(&self.client.id_token_verifier(), |_: Option<&Nonce>| Ok(()))
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        Ok(oidc::claims_from_id_token(OidcProvider::Apple, claims))
    }

    fn provider(&self) -> OidcProvider {
        OidcProvider::Apple
    }
}
