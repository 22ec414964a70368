//! HTTP handlers for auth routes.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    Form, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use gatehouse_core::auth::{
    auth_flow_ttl, calculate_expiry, email_to_name, generate_state, generate_verification_code,
    is_code_expired, is_flow_expired, is_well_formed_code, validate_return_to, AuthFlowState,
    OidcProvider, SignInMethod, VerificationCode,
};
use gatehouse_core::directory::{RepositoryError, User};
use gatehouse_core::signup::{normalize_email, parse_candidate_email};
use openidconnect::PkceCodeChallenge;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::extractors::CurrentUser;
use crate::AuthState;

/// Query parameters for OAuth callback.
#[derive(Deserialize)]
pub struct CallbackQuery {
    pub code: String,
    pub state: String,
}

/// Apple sends callback as POST with form data.
#[derive(Deserialize)]
pub struct AppleCallbackForm {
    pub code: String,
    pub state: String,
    /// JSON string with the user's name, only sent on first login.
    pub user: Option<String>,
}

/// The `user` payload Apple posts on first login. Unsigned, so only the
/// name is taken from it.
#[derive(Deserialize)]
struct AppleUserPayload {
    name: Option<AppleName>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppleName {
    first_name: Option<String>,
    last_name: Option<String>,
}

/// Query parameters for login endpoints.
#[derive(Deserialize, Default)]
pub struct LoginQuery {
    /// URL to redirect to after successful authentication.
    pub return_to: Option<String>,
}

/// Body of `POST /auth/email/start`.
#[derive(Deserialize)]
pub struct EmailStartRequest {
    pub email: String,
    pub return_to: Option<String>,
}

/// Body of `POST /auth/email/verify`.
#[derive(Deserialize)]
pub struct EmailVerifyRequest {
    pub email: String,
    pub code: String,
}

/// Response of a successful code verification.
#[derive(Serialize, Deserialize)]
pub struct EmailVerifyResponse {
    pub user: User,
    pub return_to: String,
}

/// Creates the auth router with all authentication routes.
///
/// Routes:
/// - `GET /auth/google/login` - Initiate Google OIDC flow
/// - `GET /auth/google/callback` - Handle Google OIDC callback
/// - `GET /auth/apple/login` - Initiate Apple OIDC flow
/// - `POST /auth/apple/callback` - Handle Apple OIDC callback (form POST)
/// - `POST /auth/email/start` - Email a one-time sign-in code
/// - `POST /auth/email/verify` - Redeem a sign-in code
/// - `POST /auth/logout` - Clear the session cookie
/// - `GET /auth/me` - Get current authenticated user
pub fn auth_routes() -> Router<AuthState> {
    Router::new()
        .route("/auth/google/login", get(google_login))
        .route("/auth/google/callback", get(google_callback))
        .route("/auth/apple/login", get(apple_login))
        .route("/auth/apple/callback", post(apple_callback))
        .route("/auth/email/start", post(email_start))
        .route("/auth/email/verify", post(email_verify))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}

async fn google_login(
    State(state): State<AuthState>,
    Query(query): Query<LoginQuery>,
) -> Result<Redirect, AuthError> {
    initiate_login(&state, OidcProvider::Google, query.return_to).await
}

async fn apple_login(
    State(state): State<AuthState>,
    Query(query): Query<LoginQuery>,
) -> Result<Redirect, AuthError> {
    initiate_login(&state, OidcProvider::Apple, query.return_to).await
}

async fn initiate_login(
    state: &AuthState,
    provider: OidcProvider,
    return_to: Option<String>,
) -> Result<Redirect, AuthError> {
    // Fail before storing anything if the provider is disabled
    let provider_client = state.get_provider(provider)?;

    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
    let csrf_state = generate_state();

    let flow = AuthFlowState {
        pkce_verifier: pkce_verifier.secret().to_string(),
        provider,
        created_at: Utc::now(),
        return_to: checked_return_to(return_to.as_deref()),
    };
    state.flows.store_auth_flow(&csrf_state, &flow).await?;

    let auth_url = provider_client
        .authorization_url(&csrf_state, pkce_challenge.as_str())
        .await?;

    Ok(Redirect::to(auth_url.as_str()))
}

async fn google_callback(
    State(state): State<AuthState>,
    Query(params): Query<CallbackQuery>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), AuthError> {
    handle_callback(&state, &params.code, &params.state, jar, None).await
}

async fn apple_callback(
    State(state): State<AuthState>,
    jar: CookieJar,
    Form(form): Form<AppleCallbackForm>,
) -> Result<(CookieJar, Redirect), AuthError> {
    let name = form
        .user
        .as_deref()
        .and_then(|u| serde_json::from_str::<AppleUserPayload>(u).ok())
        .and_then(|payload| payload.name)
        .and_then(|name| match (name.first_name, name.last_name) {
            (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
            (Some(only), None) | (None, Some(only)) => Some(only),
            (None, None) => None,
        });

    handle_callback(&state, &form.code, &form.state, jar, name).await
}

async fn handle_callback(
    state: &AuthState,
    code: &str,
    csrf_state: &str,
    jar: CookieJar,
    name_hint: Option<String>,
) -> Result<(CookieJar, Redirect), AuthError> {
    let flow = state
        .flows
        .take_auth_flow(csrf_state)
        .await?
        .ok_or(AuthError::Core(
            gatehouse_core::auth::AuthError::InvalidState,
        ))?;

    if is_flow_expired(&flow, Utc::now(), auth_flow_ttl()) {
        tracing::debug!(provider = %flow.provider, "auth flow expired before callback");
        return Err(AuthError::Core(
            gatehouse_core::auth::AuthError::InvalidState,
        ));
    }

    let provider_client = state.get_provider(flow.provider)?;
    let claims = provider_client
        .exchange_code(code, &flow.pkce_verifier)
        .await?;

    let email = admit(state, claims.email.as_deref()).await?;
    let name = name_hint.or(claims.name);
    let user = find_or_create_user(state, &email, name.as_deref()).await?;

    tracing::info!(user_id = %user.id, provider = %flow.provider, "signed in");

    let jar = issue_session(state, jar, &user, flow.provider.into())?;
    let redirect_url = flow.return_to.unwrap_or_else(|| "/".to_string());
    Ok((jar, Redirect::to(&redirect_url)))
}

async fn email_start(
    State(state): State<AuthState>,
    Json(request): Json<EmailStartRequest>,
) -> Result<StatusCode, AuthError> {
    let email = admit(&state, Some(&request.email)).await?;

    let ttl = chrono::Duration::from_std(state.config.verification_code_ttl)
        .map_err(|e| AuthError::Config(e.to_string()))?;
    let now = Utc::now();
    let code = VerificationCode {
        email,
        code: generate_verification_code(),
        created_at: now,
        expires_at: calculate_expiry(now, ttl),
        return_to: checked_return_to(request.return_to.as_deref()),
    };

    state.codes.store_code(&code).await?;
    state.mailer.send_code(&code).await?;

    tracing::debug!(email = %code.email, "verification code sent");
    Ok(StatusCode::ACCEPTED)
}

async fn email_verify(
    State(state): State<AuthState>,
    jar: CookieJar,
    Json(request): Json<EmailVerifyRequest>,
) -> Result<(CookieJar, Json<EmailVerifyResponse>), AuthError> {
    let code = request.code.trim();
    if !is_well_formed_code(code) {
        return Err(AuthError::InvalidCode);
    }

    let stored = state
        .codes
        .take_code(&normalize_email(&request.email), code)
        .await?
        .ok_or(AuthError::InvalidCode)?;

    if is_code_expired(&stored, Utc::now()) {
        return Err(AuthError::InvalidCode);
    }

    // Membership or invite may have been revoked since the code was sent.
    let email = admit(&state, Some(&stored.email)).await?;
    let user = find_or_create_user(&state, &email, None).await?;

    tracing::info!(user_id = %user.id, provider = "email", "signed in");

    let jar = issue_session(&state, jar, &user, SignInMethod::Email)?;
    Ok((
        jar,
        Json(EmailVerifyResponse {
            user,
            return_to: stored.return_to.unwrap_or_else(|| "/".to_string()),
        }),
    ))
}

async fn logout(State(state): State<AuthState>, jar: CookieJar) -> CookieJar {
    let cookie = Cookie::build((state.config.cookie_name.clone(), ""))
        .path("/")
        .build();
    jar.remove(cookie)
}

async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

/// Run the invite-only gate and return the normalized email on success.
async fn admit(state: &AuthState, candidate_email: Option<&str>) -> Result<String, AuthError> {
    if !state.policy.authorize(candidate_email).await {
        return Err(AuthError::SignInDenied);
    }
    parse_candidate_email(candidate_email).ok_or(AuthError::SignInDenied)
}

fn checked_return_to(return_to: Option<&str>) -> Option<String> {
    return_to.and_then(validate_return_to).map(String::from)
}

async fn find_or_create_user(
    state: &AuthState,
    email: &str,
    name: Option<&str>,
) -> Result<User, AuthError> {
    if let Some(user) = state.users.find_user_by_email(email).await? {
        return Ok(user);
    }

    let name = name
        .map(str::to_string)
        .unwrap_or_else(|| email_to_name(email));
    let user = User::new(email, name);

    match state.users.create_user(&user).await {
        Ok(()) => {
            tracing::info!(user_id = %user.id, "created user on first sign-in");
            Ok(user)
        }
        // Lost a race with a concurrent first sign-in for the same email
        Err(RepositoryError::AlreadyExists { .. }) => state
            .users
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| {
                AuthError::Directory(RepositoryError::NotFound {
                    entity_type: "User",
                    id: email.to_string(),
                })
            }),
        Err(e) => Err(e.into()),
    }
}

fn issue_session(
    state: &AuthState,
    jar: CookieJar,
    user: &User,
    method: SignInMethod,
) -> Result<CookieJar, AuthError> {
    let token = state.sessions.issue(user, method)?;
    let max_age = i64::try_from(state.sessions.ttl().as_secs())
        .map_err(|_| AuthError::Config("session TTL is too large".to_string()))?;

    let cookie = Cookie::build((state.config.cookie_name.clone(), token))
        .path("/")
        .http_only(true)
        .secure(state.config.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(max_age))
        .build();

    Ok(jar.add(cookie))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{header, Request, Response},
    };
    use gatehouse_core::auth::{CodeMailer, Result as CoreResult};
    use gatehouse_core::directory::{
        OrganizationInvite, OrganizationMembership, OrganizationRole, UserRepository,
    };
    use gatehouse_core::signup::AllowList;
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::config::AuthConfig;
    use crate::directory::InMemoryDirectory;
    use crate::providers::stub::StubProvider;
    use crate::state::AuthStores;
    use crate::stores::MemoryAuthStore;

    /// Captures codes instead of sending them.
    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<VerificationCode>>,
    }

    impl RecordingMailer {
        fn last_code(&self) -> Option<VerificationCode> {
            self.sent.lock().unwrap().last().cloned()
        }

        fn count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CodeMailer for RecordingMailer {
        async fn send_code(&self, code: &VerificationCode) -> CoreResult<()> {
            self.sent.lock().unwrap().push(code.clone());
            Ok(())
        }
    }

    struct Harness {
        router: Router,
        state: AuthState,
        directory: InMemoryDirectory,
        mailer: Arc<RecordingMailer>,
    }

    async fn harness() -> Harness {
        harness_with_providers(Vec::new()).await
    }

    async fn harness_with_providers(providers: Vec<StubProvider>) -> Harness {
        let directory = InMemoryDirectory::new();
        let mailer = Arc::new(RecordingMailer::default());
        let config = AuthConfig::local("test-secret", AllowList::from_csv("boss@acme.test"));
        let mut state = AuthState::new(
            AuthStores::in_memory(MemoryAuthStore::new(), directory.clone()),
            mailer.clone(),
            config,
        )
        .await
        .unwrap();
        for provider in providers {
            state = state.with_provider(Arc::new(provider));
        }

        Harness {
            router: auth_routes().with_state(state.clone()),
            state,
            directory,
            mailer,
        }
    }

    fn json_request(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
        router.clone().oneshot(request).await.unwrap()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: Response<Body>) -> T {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn session_cookie(response: &Response<Body>) -> String {
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("session cookie set")
            .to_str()
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    async fn start(router: &Router, email: &str) -> StatusCode {
        send(
            router,
            json_request("/auth/email/start", serde_json::json!({ "email": email })),
        )
        .await
        .status()
    }

    async fn verify(router: &Router, email: &str, code: &str) -> Response<Body> {
        send(
            router,
            json_request(
                "/auth/email/verify",
                serde_json::json!({ "email": email, "code": code }),
            ),
        )
        .await
    }

    // ==================== email start ====================

    #[tokio::test]
    async fn email_start_sends_code_to_allow_listed_email() {
        let h = harness().await;

        assert_eq!(start(&h.router, " Boss@Acme.test").await, StatusCode::ACCEPTED);

        let code = h.mailer.last_code().unwrap();
        assert_eq!(code.email, "boss@acme.test");
        assert!(is_well_formed_code(&code.code));
    }

    #[tokio::test]
    async fn email_start_rejects_uninvited_email() {
        let h = harness().await;

        assert_eq!(start(&h.router, "random@nowhere.com").await, StatusCode::FORBIDDEN);
        assert_eq!(h.mailer.count(), 0);
    }

    #[tokio::test]
    async fn email_start_accepts_invited_email() {
        let h = harness().await;
        h.directory
            .add_invite(OrganizationInvite::pending(Uuid::new_v4(), "new@acme.test"))
            .await;

        assert_eq!(start(&h.router, "new@acme.test").await, StatusCode::ACCEPTED);
        assert_eq!(h.mailer.count(), 1);
    }

    #[tokio::test]
    async fn email_start_drops_unsafe_return_to() {
        let h = harness().await;
        let response = send(
            &h.router,
            json_request(
                "/auth/email/start",
                serde_json::json!({ "email": "boss@acme.test", "return_to": "//evil.com" }),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(h.mailer.last_code().unwrap().return_to, None);
    }

    // ==================== email verify ====================

    #[tokio::test]
    async fn verify_signs_in_and_session_resolves_user() {
        let h = harness().await;
        start(&h.router, "boss@acme.test").await;
        let code = h.mailer.last_code().unwrap().code;

        let response = verify(&h.router, "BOSS@acme.test", &code).await;
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = session_cookie(&response);
        let body: EmailVerifyResponse = body_json(response).await;
        assert_eq!(body.user.email, "boss@acme.test");
        assert_eq!(body.user.name, "boss");
        assert_eq!(body.return_to, "/");

        let me = send(
            &h.router,
            Request::builder()
                .uri("/auth/me")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(me.status(), StatusCode::OK);
        let user: User = body_json(me).await;
        assert_eq!(user.id, body.user.id);
    }

    #[tokio::test]
    async fn verify_accepts_bearer_token_for_me() {
        let h = harness().await;
        start(&h.router, "boss@acme.test").await;
        let code = h.mailer.last_code().unwrap().code;
        let response = verify(&h.router, "boss@acme.test", &code).await;
        let cookie = session_cookie(&response);
        let token = cookie.trim_start_matches("session=");

        let me = send(
            &h.router,
            Request::builder()
                .uri("/auth/me")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(me.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn verify_rejects_wrong_code_without_consuming_it() {
        let h = harness().await;
        start(&h.router, "boss@acme.test").await;
        let code = h.mailer.last_code().unwrap().code;
        let wrong = if code == "000000" { "000001" } else { "000000" };

        let response = verify(&h.router, "boss@acme.test", wrong).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = verify(&h.router, "boss@acme.test", &code).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn verify_code_is_single_use() {
        let h = harness().await;
        start(&h.router, "boss@acme.test").await;
        let code = h.mailer.last_code().unwrap().code;

        assert_eq!(verify(&h.router, "boss@acme.test", &code).await.status(), StatusCode::OK);
        assert_eq!(
            verify(&h.router, "boss@acme.test", &code).await.status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn verify_discards_code_after_repeated_wrong_guesses() {
        let h = harness().await;
        start(&h.router, "boss@acme.test").await;
        let code = h.mailer.last_code().unwrap().code;

        let mut wrong = (0..1_000_000)
            .map(|n| format!("{:06}", n))
            .filter(|guess| *guess != code);
        for _ in 0..gatehouse_core::auth::MAX_CODE_ATTEMPTS {
            let guess = wrong.next().unwrap();
            let response = verify(&h.router, "boss@acme.test", &guess).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }

        let response = verify(&h.router, "boss@acme.test", &code).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // A fresh code works again
        start(&h.router, "boss@acme.test").await;
        let code = h.mailer.last_code().unwrap().code;
        let response = verify(&h.router, "boss@acme.test", &code).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn verify_rejects_malformed_code() {
        let h = harness().await;
        let response = verify(&h.router, "boss@acme.test", "abc").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn repeated_sign_in_reuses_user() {
        let h = harness().await;

        start(&h.router, "boss@acme.test").await;
        let first = h.mailer.last_code().unwrap().code;
        let first: EmailVerifyResponse =
            body_json(verify(&h.router, "boss@acme.test", &first).await).await;

        start(&h.router, "boss@acme.test").await;
        let second = h.mailer.last_code().unwrap().code;
        let second: EmailVerifyResponse =
            body_json(verify(&h.router, "boss@acme.test", &second).await).await;

        assert_eq!(first.user.id, second.user.id);
    }

    #[tokio::test]
    async fn existing_member_can_sign_in_with_code() {
        let h = harness().await;
        let user = User::new("member@acme.test", "Member");
        h.directory.create_user(&user).await.unwrap();
        h.directory
            .add_membership(OrganizationMembership::new(
                Uuid::new_v4(),
                user.id,
                OrganizationRole::Member,
            ))
            .await;

        assert_eq!(start(&h.router, "member@acme.test").await, StatusCode::ACCEPTED);
        let code = h.mailer.last_code().unwrap().code;
        let body: EmailVerifyResponse =
            body_json(verify(&h.router, "member@acme.test", &code).await).await;
        assert_eq!(body.user.id, user.id);
        assert_eq!(body.user.name, "Member");
    }

    // ==================== session ====================

    #[tokio::test]
    async fn me_without_session_is_unauthorized() {
        let h = harness().await;
        let response = send(
            &h.router,
            Request::builder().uri("/auth/me").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn me_with_forged_token_is_unauthorized() {
        let h = harness().await;
        let response = send(
            &h.router,
            Request::builder()
                .uri("/auth/me")
                .header(header::COOKIE, "session=not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_clears_cookie() {
        let h = harness().await;
        let response = send(
            &h.router,
            Request::builder()
                .method("POST")
                .uri("/auth/logout")
                .header(header::COOKIE, "session=abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(set_cookie.starts_with("session=;"));
        assert!(set_cookie.contains("Max-Age=0"));
        assert!(set_cookie.contains("Path=/"));
    }

    // ==================== OIDC ====================

    #[tokio::test]
    async fn login_with_unconfigured_provider_is_not_found() {
        let h = harness().await;
        let response = send(
            &h.router,
            Request::builder()
                .uri("/auth/google/login")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn callback_with_unknown_state_is_bad_request() {
        let h = harness().await;
        let response = send(
            &h.router,
            Request::builder()
                .uri("/auth/google/callback?code=abc&state=unknown")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    fn location(response: &Response<Body>) -> String {
        response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    /// Runs the login redirect and returns the CSRF state the provider got.
    async fn login_state(router: &Router, uri: &str) -> String {
        let response = send(
            router,
            Request::builder().uri(uri).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let url = url::Url::parse(&location(&response)).unwrap();
        url.query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned())
            .unwrap()
    }

    async fn google_callback_with(router: &Router, state: &str) -> Response<Body> {
        send(
            router,
            Request::builder()
                .uri(format!("/auth/google/callback?code=abc&state={state}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    #[tokio::test]
    async fn google_callback_signs_in_invited_email() {
        let h = harness_with_providers(vec![StubProvider::new(
            OidcProvider::Google,
            Some("New@Acme.test"),
        )
        .with_name("New Person")])
        .await;
        h.directory
            .add_invite(OrganizationInvite::pending(Uuid::new_v4(), "new@acme.test"))
            .await;

        let state = login_state(&h.router, "/auth/google/login?return_to=/orgs/acme").await;
        let response = google_callback_with(&h.router, &state).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/orgs/acme");
        let cookie = session_cookie(&response);
        assert!(cookie.starts_with("session="));

        let user = h
            .directory
            .find_user_by_email("new@acme.test")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.name, "New Person");

        let me = send(
            &h.router,
            Request::builder()
                .uri("/auth/me")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        let me: User = body_json(me).await;
        assert_eq!(me.id, user.id);
    }

    #[tokio::test]
    async fn google_callback_rejects_uninvited_email() {
        let h = harness_with_providers(vec![StubProvider::new(
            OidcProvider::Google,
            Some("stranger@elsewhere.test"),
        )])
        .await;

        let state = login_state(&h.router, "/auth/google/login").await;
        let response = google_callback_with(&h.router, &state).await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert!(h
            .directory
            .find_user_by_email("stranger@elsewhere.test")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn google_callback_without_email_is_rejected() {
        let h = harness_with_providers(vec![StubProvider::new(OidcProvider::Google, None)]).await;

        let state = login_state(&h.router, "/auth/google/login").await;
        let response = google_callback_with(&h.router, &state).await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn callback_state_is_single_use() {
        let h = harness_with_providers(vec![StubProvider::new(
            OidcProvider::Google,
            Some("boss@acme.test"),
        )])
        .await;

        let state = login_state(&h.router, "/auth/google/login").await;
        assert_eq!(
            google_callback_with(&h.router, &state).await.status(),
            StatusCode::SEE_OTHER
        );
        assert_eq!(
            google_callback_with(&h.router, &state).await.status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn callback_with_expired_flow_is_bad_request() {
        let h = harness_with_providers(vec![StubProvider::new(
            OidcProvider::Google,
            Some("boss@acme.test"),
        )])
        .await;
        let flow = AuthFlowState {
            pkce_verifier: "verifier".to_string(),
            provider: OidcProvider::Google,
            created_at: Utc::now() - chrono::Duration::minutes(11),
            return_to: None,
        };
        h.state.flows.store_auth_flow("stale", &flow).await.unwrap();

        let response = google_callback_with(&h.router, "stale").await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn failed_code_exchange_is_bad_gateway() {
        let h = harness_with_providers(vec![StubProvider::new(
            OidcProvider::Google,
            Some("boss@acme.test"),
        )])
        .await;

        let state = login_state(&h.router, "/auth/google/login").await;
        let response = send(
            &h.router,
            Request::builder()
                .uri(format!("/auth/google/callback?code=rejected&state={state}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn apple_callback_takes_name_from_form_only() {
        let h = harness_with_providers(vec![StubProvider::new(
            OidcProvider::Apple,
            Some("boss@acme.test"),
        )])
        .await;

        let state = login_state(&h.router, "/auth/apple/login").await;
        let user = r#"{"name":{"firstName":"Grace","lastName":"Hopper"},"email":"stranger@elsewhere.test"}"#;
        let form = format!(
            "code=abc&state={}&user={}",
            state,
            url::form_urlencoded::byte_serialize(user.as_bytes()).collect::<String>()
        );
        let response = send(
            &h.router,
            Request::builder()
                .method("POST")
                .uri("/auth/apple/callback")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form))
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
        let user = h
            .directory
            .find_user_by_email("boss@acme.test")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.name, "Grace Hopper");
        assert!(h
            .directory
            .find_user_by_email("stranger@elsewhere.test")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn apple_callback_with_uninvited_email_is_forbidden() {
        let h = harness_with_providers(vec![StubProvider::new(
            OidcProvider::Apple,
            Some("stranger@elsewhere.test"),
        )])
        .await;

        let state = login_state(&h.router, "/auth/apple/login").await;
        let response = send(
            &h.router,
            Request::builder()
                .method("POST")
                .uri("/auth/apple/callback")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(format!("code=abc&state={state}")))
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }
}
