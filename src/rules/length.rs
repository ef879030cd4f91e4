//! Length rules - enforce the configured minimum and maximum password length.
//!
//! Length is measured in Unicode scalar values, not bytes.

use super::RuleResult;
use crate::context::ValidationContext;
use crate::failure::ValidationFailure;
use crate::policy::PolicyConfig;

/// Rejects passwords shorter than `min_length`.
pub fn min_length_rule(ctx: &ValidationContext, policy: &PolicyConfig) -> RuleResult {
    let min_length = policy.min_length()?;
    if ctx.password_len() < min_length {
        return Some(ValidationFailure::MinLengthNotMet { min_length });
    }
    None
}

/// Rejects passwords longer than `max_length`.
pub fn max_length_rule(ctx: &ValidationContext, policy: &PolicyConfig) -> RuleResult {
    let max_length = policy.max_length()?;
    if ctx.password_len() > max_length {
        return Some(ValidationFailure::MaxLengthExceeded { max_length });
    }
    None
}
