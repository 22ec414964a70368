//! Inputs and outcome of the invite-only sign-in gate.

mod allow_list;
mod decision;
mod email;

pub use allow_list::AllowList;
pub use decision::{AllowReason, DenyReason, SignupDecision};
pub use email::{normalize_email, parse_candidate_email};
