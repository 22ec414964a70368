//! Discovery, authorization URLs and claim extraction shared by the
//! OIDC providers.

use gatehouse_core::auth::{generate_state, AuthError, OidcClaims, OidcProvider, Result};
use openidconnect::{
    core::{CoreAuthenticationFlow, CoreClient, CoreIdTokenClaims, CoreProviderMetadata},
    reqwest, ClientId, ClientSecret, CsrfToken, EndpointMaybeSet, EndpointSet, IssuerUrl, Nonce,
    RedirectUrl, Scope,
};
use url::Url;

/// Type alias for a CoreClient configured from provider metadata.
///
/// `from_provider_metadata` returns a client with:
/// - HasAuthUrl = EndpointSet (always set from discovery)
/// - HasDeviceAuthUrl = EndpointNotSet
/// - HasIntrospectionUrl = EndpointNotSet
/// - HasRevocationUrl = EndpointNotSet
/// - HasTokenUrl = EndpointMaybeSet (may or may not be in discovery)
/// - HasUserInfoUrl = EndpointMaybeSet (may or may not be in discovery)
///
/// Calling `set_redirect_uri` preserves these type parameters.
pub(crate) type ConfiguredCoreClient = CoreClient<
    EndpointSet,
    openidconnect::EndpointNotSet,
    openidconnect::EndpointNotSet,
    openidconnect::EndpointNotSet,
    EndpointMaybeSet,
    EndpointMaybeSet,
>;

/// HTTP client for discovery and token requests. Redirects are not followed.
pub(crate) fn http_client() -> Result<reqwest::Client> {
    reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| AuthError::Provider(format!("Failed to build HTTP client: {}", e)))
}

/// Discover the issuer's metadata and build a client for it.
pub(crate) async fn discover(
    issuer: &str,
    http_client: &reqwest::Client,
    client_id: &str,
    client_secret: Option<&str>,
    redirect_uri: &Url,
) -> Result<ConfiguredCoreClient> {
    let issuer_url =
        IssuerUrl::new(issuer.to_string()).map_err(|e| AuthError::Provider(e.to_string()))?;

    let provider_metadata = CoreProviderMetadata::discover_async(issuer_url, http_client)
        .await
        .map_err(|e| AuthError::Provider(e.to_string()))?;

    tracing::debug!(issuer, "discovered OIDC provider metadata");

    Ok(CoreClient::from_provider_metadata(
        provider_metadata,
        ClientId::new(client_id.to_string()),
        client_secret.map(|s| ClientSecret::new(s.to_string())),
    )
    .set_redirect_uri(
        RedirectUrl::new(redirect_uri.to_string())
            .map_err(|e| AuthError::Provider(e.to_string()))?,
    ))
}

/// Build the authorization URL using our own CSRF state and a precomputed
/// S256 PKCE challenge.
pub(crate) fn authorization_url(
    client: &ConfiguredCoreClient,
    state: &str,
    pkce_challenge: &str,
    scopes: &[&str],
    extra_params: &[(&'static str, &'static str)],
) -> Url {
    let state_owned = state.to_string();

    let mut request = client
        .authorize_url(
            CoreAuthenticationFlow::AuthorizationCode,
            move || CsrfToken::new(state_owned),
            || Nonce::new(generate_state()),
        )
        .add_extra_param("code_challenge", pkce_challenge.to_string())
        .add_extra_param("code_challenge_method", "S256");

    for scope in scopes {
        request = request.add_scope(Scope::new(scope.to_string()));
    }
    for (name, value) in extra_params {
        request = request.add_extra_param(*name, *value);
    }

    let (url, _csrf_token, _nonce) = request.url();
    url
}

/// Map verified ID token claims to provider-agnostic claims.
///
/// The email is dropped when the provider marks it as unverified, so an
/// unverified address can never satisfy the invite-only gate.
pub(crate) fn claims_from_id_token(
    provider: OidcProvider,
    claims: &CoreIdTokenClaims,
) -> OidcClaims {
    let email = match claims.email_verified() {
        Some(false) => {
            tracing::warn!(
                %provider,
                subject = claims.subject().as_str(),
                "ignoring unverified email claim"
            );
            None
        }
        _ => claims.email().map(|e| e.to_string()),
    };

    OidcClaims {
        subject: claims.subject().to_string(),
        email,
        name: claims
            .name()
            .and_then(|n| n.get(None))
            .map(|n| n.to_string()),
        provider,
    }
}
