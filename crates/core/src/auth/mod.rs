mod error;
mod functions;
mod traits;
mod types;
mod validation;

pub use error::AuthError;
pub use functions::{
    attempts_exhausted, auth_flow_ttl, calculate_expiry, email_to_name, generate_state,
    generate_verification_code, is_code_expired, is_flow_expired, session_claims,
    AUTH_FLOW_TTL_MINUTES, MAX_CODE_ATTEMPTS, VERIFICATION_CODE_LENGTH,
};
pub use traits::{
    AuthFlowRepository, CodeMailer, OidcProviderClient, Result, VerificationCodeRepository,
};
pub use types::{
    AuthFlowState, OidcClaims, OidcProvider, SessionClaims, SignInMethod, VerificationCode,
};
pub use validation::{is_well_formed_code, validate_return_to};
