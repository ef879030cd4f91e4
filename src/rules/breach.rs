//! Breach count rule - rejects passwords seen too often in known data breaches.

use secrecy::ExposeSecret;

use super::RuleResult;
use crate::context::ValidationContext;
use crate::failure::ValidationFailure;
use crate::policy::PolicyConfig;
use crate::pwned::{parse_range_response, sha1_hex, split_digest, BreachLookup};

/// Looks up the password's digest prefix and rejects it when the breach count
/// is strictly above `breach_threshold`.
///
/// Fails open: when the lookup service is unreachable or answers with an
/// error, the rule passes.
pub async fn breach_count_rule<C: BreachLookup>(
    ctx: &ValidationContext,
    policy: &PolicyConfig,
    client: &C,
) -> RuleResult {
    let threshold = policy.breach_threshold()?;

    let digest = sha1_hex(ctx.password().expose_secret());
    let (prefix, _) = split_digest(&digest);

    let body = match client.lookup(prefix).await {
        Ok(body) => body,
        Err(_e) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(entity = %ctx.entity(), error = %_e, "Breach lookup failed, failing open");
            return None;
        }
    };

    let count = parse_range_response(prefix, &body)
        .get(&digest)
        .copied()
        .unwrap_or(0);

    if count > threshold {
        return Some(ValidationFailure::BreachCountExceeded { count });
    }
    None
}
