use std::collections::HashSet;

use super::normalize_email;

/// Emails that may always sign in, bypassing membership and invite checks.
///
/// Built once at startup and never mutated afterwards. Entries are stored
/// normalized, so lookups must use normalized emails as well.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    emails: HashSet<String>,
}

impl AllowList {
    /// Parses a comma-separated list, as found in `ALLOWED_EMAILS`.
    /// Blank entries are skipped.
    pub fn from_csv(value: &str) -> Self {
        value.split(',').collect()
    }

    /// Whether the normalized email is allow-listed.
    pub fn contains(&self, normalized_email: &str) -> bool {
        self.emails.contains(normalized_email)
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for AllowList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let emails = iter
            .into_iter()
            .map(|email| normalize_email(email.as_ref()))
            .filter(|email| !email.is_empty())
            .collect();
        Self { emails }
    }
}
