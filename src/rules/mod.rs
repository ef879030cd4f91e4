//! Password policy rules
//!
//! Each rule checks one aspect of the password against the resolved policy.
//! The rule set is closed and evaluated in [`Rule::ORDER`].

mod breach;
mod characters;
mod length;

pub use breach::breach_count_rule;
pub use characters::{count_class, required_characters_rule};
pub use length::{max_length_rule, min_length_rule};

use crate::context::ValidationContext;
use crate::failure::{RuleId, ValidationFailure};
use crate::policy::PolicyConfig;
use crate::pwned::BreachLookup;

/// Result type for rule functions.
/// - `Some(failure)` - Rule rejected the password
/// - `None` - Rule passed (or is not configured)
pub type RuleResult = Option<ValidationFailure>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    MinLength,
    MaxLength,
    RequiredCharacters,
    BreachCount,
}

impl Rule {
    /// Fixed evaluation order. The only networked rule runs last.
    pub const ORDER: [Rule; 4] = [
        Rule::MinLength,
        Rule::MaxLength,
        Rule::RequiredCharacters,
        Rule::BreachCount,
    ];

    pub fn id(&self) -> RuleId {
        match self {
            Rule::MinLength => RuleId::MinLength,
            Rule::MaxLength => RuleId::MaxLength,
            Rule::RequiredCharacters => RuleId::RequiredCharacters,
            Rule::BreachCount => RuleId::BreachCount,
        }
    }

    pub async fn check<C: BreachLookup>(
        &self,
        ctx: &ValidationContext,
        policy: &PolicyConfig,
        client: &C,
    ) -> RuleResult {
        match self {
            Rule::MinLength => min_length_rule(ctx, policy),
            Rule::MaxLength => max_length_rule(ctx, policy),
            Rule::RequiredCharacters => required_characters_rule(ctx, policy),
            Rule::BreachCount => breach_count_rule(ctx, policy, client).await,
        }
    }
}
