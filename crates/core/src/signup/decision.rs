use std::fmt::{Display, Formatter};

/// Why an email was admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowReason {
    AllowListed,
    Member,
    Invited,
}

/// Why an email was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No usable email could be resolved for the attempt.
    MissingEmail,
    /// Not allow-listed, not a member and not invited.
    NotInvited,
    /// A directory lookup failed or timed out; the gate fails closed.
    LookupFailed,
}

/// Outcome of the invite-only sign-in gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupDecision {
    Allowed(AllowReason),
    Denied(DenyReason),
}

impl SignupDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed(_))
    }
}

impl Display for SignupDecision {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Self::Allowed(AllowReason::AllowListed) => "allowed: allow-listed",
            Self::Allowed(AllowReason::Member) => "allowed: organization member",
            Self::Allowed(AllowReason::Invited) => "allowed: pending invite",
            Self::Denied(DenyReason::MissingEmail) => "denied: missing email",
            Self::Denied(DenyReason::NotInvited) => "denied: not invited",
            Self::Denied(DenyReason::LookupFailed) => "denied: lookup failed",
        };
        f.write_str(reason)
    }
}
