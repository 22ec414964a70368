use std::time::Duration;

use gatehouse_core::signup::AllowList;
use url::Url;

use crate::error::AuthError;

/// Configuration for a single OIDC provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: Url,
}

/// Apple-specific configuration (uses signed JWT for client secret).
#[derive(Debug, Clone)]
pub struct AppleConfig {
    pub client_id: String,
    pub team_id: String,
    pub key_id: String,
    pub private_key: String, // PEM-encoded ES256 private key
    pub redirect_uri: Url,
}

/// Settings for the invite-only sign-in gate.
#[derive(Debug, Clone)]
pub struct SignupConfig {
    pub allow_list: AllowList,
    /// Upper bound for each directory lookup made by the gate.
    pub lookup_timeout: Duration,
}

impl Default for SignupConfig {
    fn default() -> Self {
        Self {
            allow_list: AllowList::default(),
            lookup_timeout: Duration::from_millis(DEFAULT_LOOKUP_TIMEOUT_MS),
        }
    }
}

/// Complete auth configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub google: Option<ProviderConfig>,
    pub apple: Option<AppleConfig>,
    pub signup: SignupConfig,
    pub jwt_secret: String,
    pub session_ttl: Duration,
    pub verification_code_ttl: Duration,
    pub base_url: Url,
    pub cookie_name: String,
    pub cookie_secure: bool,
}

const DEFAULT_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_SESSION_TTL_DAYS: u64 = 30;
const DEFAULT_CODE_TTL_MINUTES: u64 = 10;
const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 2_000;

impl AuthConfig {
    /// Load from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `AUTH_BASE_URL`: Base URL for callback redirects (default: `http://localhost:3000`)
    /// - `JWT_SECRET`: HMAC secret for session tokens (required)
    /// - `GOOGLE_CLIENT_ID`: Google OAuth client ID (optional, enables Google auth)
    /// - `GOOGLE_CLIENT_SECRET`: Google OAuth client secret (required if Google enabled)
    /// - `APPLE_CLIENT_ID`: Apple OAuth client ID (optional, enables Apple auth)
    /// - `APPLE_TEAM_ID`: Apple developer team ID (required if Apple enabled)
    /// - `APPLE_KEY_ID`: Apple key ID (required if Apple enabled)
    /// - `APPLE_PRIVATE_KEY`: Apple ES256 private key PEM (required if Apple enabled)
    /// - `ALLOWED_EMAILS`: Comma separated emails that may always sign in
    /// - `SIGNUP_LOOKUP_TIMEOUT_MS`: Timeout per directory lookup (default: 2000)
    /// - `SESSION_TTL_DAYS`: Session TTL in days (default: 30)
    /// - `VERIFICATION_CODE_TTL_MINUTES`: Emailed code lifetime (default: 10)
    /// - `COOKIE_SECURE`: Whether to set secure flag on cookies (default: true)
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Config` if `JWT_SECRET` is missing, the base URL is
    /// invalid, or a provider is partially configured.
    pub fn from_env() -> Result<Self, AuthError> {
        let base_url: Url = std::env::var("AUTH_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
            .parse()
            .map_err(|e| AuthError::Config(format!("AUTH_BASE_URL: {e}")))?;

        let jwt_secret = required_var("JWT_SECRET")?;

        let google = match std::env::var("GOOGLE_CLIENT_ID") {
            Ok(client_id) => Some(ProviderConfig {
                client_id,
                client_secret: Some(required_var("GOOGLE_CLIENT_SECRET")?),
                redirect_uri: callback_url(&base_url, "/auth/google/callback")?,
            }),
            Err(_) => None,
        };

        let apple = match std::env::var("APPLE_CLIENT_ID") {
            Ok(client_id) => Some(AppleConfig {
                client_id,
                team_id: required_var("APPLE_TEAM_ID")?,
                key_id: required_var("APPLE_KEY_ID")?,
                private_key: required_var("APPLE_PRIVATE_KEY")?,
                redirect_uri: callback_url(&base_url, "/auth/apple/callback")?,
            }),
            Err(_) => None,
        };

        let signup = SignupConfig {
            allow_list: AllowList::from_csv(&std::env::var("ALLOWED_EMAILS").unwrap_or_default()),
            lookup_timeout: Duration::from_millis(parse_var(
                "SIGNUP_LOOKUP_TIMEOUT_MS",
                DEFAULT_LOOKUP_TIMEOUT_MS,
            )),
        };

        let session_ttl = lifetime(
            "SESSION_TTL_DAYS",
            parse_var("SESSION_TTL_DAYS", DEFAULT_SESSION_TTL_DAYS),
            24 * 60 * 60,
        )?;

        let verification_code_ttl = lifetime(
            "VERIFICATION_CODE_TTL_MINUTES",
            parse_var("VERIFICATION_CODE_TTL_MINUTES", DEFAULT_CODE_TTL_MINUTES),
            60,
        )?;

        let cookie_secure = std::env::var("COOKIE_SECURE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(true);

        Ok(Self {
            google,
            apple,
            signup,
            jwt_secret,
            session_ttl,
            verification_code_ttl,
            base_url,
            cookie_name: "session".to_string(),
            cookie_secure,
        })
    }

    /// Configuration with no OIDC providers, suitable for tests and local
    /// development with emailed codes only.
    pub fn local(jwt_secret: impl Into<String>, allow_list: AllowList) -> Self {
        Self {
            google: None,
            apple: None,
            signup: SignupConfig {
                allow_list,
                ..SignupConfig::default()
            },
            jwt_secret: jwt_secret.into(),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_DAYS * 24 * 60 * 60),
            verification_code_ttl: Duration::from_secs(DEFAULT_CODE_TTL_MINUTES * 60),
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            cookie_name: "session".to_string(),
            cookie_secure: false,
        }
    }
}

fn required_var(name: &str) -> Result<String, AuthError> {
    std::env::var(name).map_err(|_| AuthError::Config(format!("{name} must be set")))
}

fn parse_var(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(default)
}

/// `value` units of `unit_secs` seconds, rejected when the result cannot
/// be added to the current time.
fn lifetime(name: &str, value: u64, unit_secs: u64) -> Result<Duration, AuthError> {
    let too_long = || AuthError::Config(format!("{name}={value} is too large"));

    let secs = value.checked_mul(unit_secs).ok_or_else(too_long)?;
    i64::try_from(secs)
        .ok()
        .and_then(chrono::TimeDelta::try_seconds)
        .and_then(|delta| chrono::Utc::now().checked_add_signed(delta))
        .ok_or_else(too_long)?;

    Ok(Duration::from_secs(secs))
}

fn callback_url(base_url: &Url, path: &str) -> Result<Url, AuthError> {
    base_url
        .join(path)
        .map_err(|e| AuthError::Config(format!("invalid callback URL {path}: {e}")))
}
