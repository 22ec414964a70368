/// Canonical form of an email address: surrounding whitespace removed,
/// lower-cased. Every comparison and lookup uses this form.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Normalizes a best-effort resolved email and rejects unusable input.
///
/// Returns `None` when the email is absent, blank, or does not have the
/// shape `local@domain` with exactly one `@` and non-empty parts.
///
/// # Examples
///
/// ```
/// use gatehouse_core::signup::parse_candidate_email;
///
/// assert_eq!(
///     parse_candidate_email(Some(" Foo@Bar.com ")),
///     Some("foo@bar.com".to_string())
/// );
/// assert_eq!(parse_candidate_email(None), None);
/// assert_eq!(parse_candidate_email(Some("   ")), None);
/// ```
pub fn parse_candidate_email(candidate: Option<&str>) -> Option<String> {
    let email = normalize_email(candidate?);

    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }

    if email.chars().any(char::is_whitespace) {
        return None;
    }

    Some(email)
}
