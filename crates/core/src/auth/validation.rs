use super::VERIFICATION_CODE_LENGTH;

/// Validates a post-login `return_to` target so it cannot become an open redirect.
///
/// Only same-origin relative paths are accepted: the value must start with a
/// single `/`, must not start with `//`, must not contain `://` anywhere and
/// must not contain control characters.
///
/// # Examples
///
/// ```
/// use gatehouse_core::auth::validate_return_to;
///
/// assert_eq!(validate_return_to("/orgs/acme"), Some("/orgs/acme"));
/// assert_eq!(validate_return_to("//evil.com"), None);
/// assert_eq!(validate_return_to("https://evil.com"), None);
/// ```
pub fn validate_return_to(url: &str) -> Option<&str> {
    if !url.starts_with('/') || url.starts_with("//") {
        return None;
    }

    if url.chars().any(|c| c.is_control()) {
        return None;
    }

    if url.contains("://") {
        return None;
    }

    Some(url)
}

/// Checks that a submitted verification code has the issued shape:
/// exactly six ASCII digits.
pub fn is_well_formed_code(code: &str) -> bool {
    code.len() == VERIFICATION_CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}
