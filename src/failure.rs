//! Structured validation failures and the evaluation result.
//!
//! Failures carry a symbolic message key plus ordered parameters. Rendering them
//! into user-facing text (and translating them) is left to the caller.

use std::fmt;

use crate::policy::CharacterClass;

/// Identifies the rule that produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleId {
    MinLength,
    MaxLength,
    RequiredCharacters,
    BreachCount,
}

impl RuleId {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleId::MinLength => "min_length",
            RuleId::MaxLength => "max_length",
            RuleId::RequiredCharacters => "required_characters",
            RuleId::BreachCount => "breach_count",
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimums reported by the summary failure when several classes fail at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequirementSummary {
    pub uppercase: usize,
    pub lowercase: usize,
    pub numbers: usize,
    pub other: usize,
    pub other_chars: String,
}

/// A single reason a password was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    MinLengthNotMet {
        min_length: usize,
    },
    MaxLengthExceeded {
        max_length: usize,
    },
    /// Exactly one character class is below its minimum.
    MissingCharacters {
        class: CharacterClass,
        minimum: usize,
        /// Set only for [`CharacterClass::Other`].
        other_chars: Option<String>,
    },
    /// More than one character class is below its minimum.
    MissingCharactersSummary(RequirementSummary),
    BreachCountExceeded {
        count: u64,
    },
}

impl ValidationFailure {
    pub fn rule_id(&self) -> RuleId {
        match self {
            ValidationFailure::MinLengthNotMet { .. } => RuleId::MinLength,
            ValidationFailure::MaxLengthExceeded { .. } => RuleId::MaxLength,
            ValidationFailure::MissingCharacters { .. }
            | ValidationFailure::MissingCharactersSummary(_) => RuleId::RequiredCharacters,
            ValidationFailure::BreachCountExceeded { .. } => RuleId::BreachCount,
        }
    }

    /// Symbolic reason code for the presentation layer.
    pub fn message_key(&self) -> &'static str {
        match self {
            ValidationFailure::MinLengthNotMet { .. } => "min_length_not_met",
            ValidationFailure::MaxLengthExceeded { .. } => "max_length_exceeded",
            ValidationFailure::MissingCharacters { class, .. } => match class {
                CharacterClass::Uppercase => "required.uppercase",
                CharacterClass::Lowercase => "required.lowercase",
                CharacterClass::Numbers => "required.numbers",
                CharacterClass::Other => "required.other",
            },
            ValidationFailure::MissingCharactersSummary(_) => "required.summary",
            ValidationFailure::BreachCountExceeded { .. } => "breach_count_exceeded",
        }
    }

    /// Ordered values to interpolate into the message for [`message_key`](Self::message_key).
    pub fn parameters(&self) -> Vec<String> {
        match self {
            ValidationFailure::MinLengthNotMet { min_length } => vec![min_length.to_string()],
            ValidationFailure::MaxLengthExceeded { max_length } => vec![max_length.to_string()],
            ValidationFailure::MissingCharacters {
                minimum,
                other_chars,
                ..
            } => {
                let mut params = vec![minimum.to_string()];
                params.extend(other_chars.iter().cloned());
                params
            }
            ValidationFailure::MissingCharactersSummary(summary) => vec![
                summary.uppercase.to_string(),
                summary.lowercase.to_string(),
                summary.numbers.to_string(),
                summary.other.to_string(),
                summary.other_chars.clone(),
            ],
            ValidationFailure::BreachCountExceeded { count } => vec![count.to_string()],
        }
    }
}

/// Outcome of evaluating a password against its entity's policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Accepted,
    /// Never empty.
    Rejected(Vec<ValidationFailure>),
}

impl ValidationResult {
    /// Builds a rejection; an empty list yields [`ValidationResult::Accepted`].
    pub fn rejected(failures: Vec<ValidationFailure>) -> Self {
        if failures.is_empty() {
            ValidationResult::Accepted
        } else {
            ValidationResult::Rejected(failures)
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationResult::Accepted)
    }

    pub fn failures(&self) -> &[ValidationFailure] {
        match self {
            ValidationResult::Accepted => &[],
            ValidationResult::Rejected(failures) => failures,
        }
    }
}
