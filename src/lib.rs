//! Password policy validation library
//!
//! Checks a candidate password against the policy configured for its entity
//! kind (length bounds, required character classes, breached-password
//! threshold) and reports structured reasons when it is rejected.
//!
//! # Features
//!
//! - `async` (default): Enables cancellable evaluation and channel delivery
//! - `http` (default): Enables the Pwned Passwords range API client
//! - `tracing`: Enables logging via tracing crate
//!
//! # Environment Variables
//!
//! - `PWD_POLICY_PATH`: Custom path to the policy configuration file
//!   (default: `./config/password_policy.json`)
//!
//! # Example
//!
//! ```rust,no_run
//! use pwd_policy::{PolicyEvaluator, PolicyStore};
//! use secrecy::SecretString;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! // Load policies (once at startup)
//! let store = Arc::new(PolicyStore::from_env()?);
//! let evaluator = PolicyEvaluator::with_pwned_passwords(store)?;
//!
//! // Validate a password
//! let password = SecretString::new("MyP@ssw0rd!".to_string().into());
//! let result = evaluator.validate("backend_user", password).await;
//!
//! for failure in result.failures() {
//!     println!("{}: {:?}", failure.message_key(), failure.parameters());
//! }
//! # Ok(())
//! # }
//! ```

// Internal modules
mod context;
mod evaluator;
mod failure;
mod policy;
mod rules;

pub mod pwned;

// Public API
pub use context::ValidationContext;
pub use evaluator::PolicyEvaluator;
pub use failure::{RequirementSummary, RuleId, ValidationFailure, ValidationResult};
pub use policy::{
    policy_path, CharacterClass, EntityKind, OtherChars, PolicyConfig, PolicyError, PolicyStore,
    RequirementSet, POLICY_PATH_ENV,
};
pub use pwned::{BreachLookup, LookupError};
pub use rules::{count_class, Rule};

#[cfg(feature = "async")]
pub use evaluator::EvaluationCancelled;

#[cfg(feature = "http")]
pub use pwned::PwnedPasswordsClient;
