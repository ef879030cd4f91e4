//! Policy evaluator - resolves the entity's policy and runs the rules.

use secrecy::SecretString;
use std::sync::Arc;

#[cfg(feature = "async")]
use tokio::sync::mpsc;

#[cfg(feature = "async")]
use tokio_util::sync::CancellationToken;

use crate::context::ValidationContext;
use crate::failure::{ValidationFailure, ValidationResult};
use crate::policy::{EntityKind, PolicyStore};
use crate::pwned::BreachLookup;
use crate::rules::Rule;

/// Returned when an evaluation is cancelled before it completes.
#[cfg(feature = "async")]
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Password evaluation cancelled")]
pub struct EvaluationCancelled;

/// Runs [`Rule::ORDER`] against a context and stops at the first failure.
///
/// Holds no mutable state: one evaluator can serve any number of concurrent
/// evaluations.
#[derive(Debug)]
pub struct PolicyEvaluator<C> {
    store: Arc<PolicyStore>,
    client: C,
}

#[cfg(feature = "http")]
impl PolicyEvaluator<crate::pwned::PwnedPasswordsClient> {
    /// Evaluator backed by the public Pwned Passwords range API.
    pub fn with_pwned_passwords(store: Arc<PolicyStore>) -> Result<Self, crate::pwned::LookupError> {
        Ok(Self::new(store, crate::pwned::PwnedPasswordsClient::new()?))
    }
}

impl<C: BreachLookup> PolicyEvaluator<C> {
    pub fn new(store: Arc<PolicyStore>, client: C) -> Self {
        Self { store, client }
    }

    pub fn store(&self) -> &PolicyStore {
        &self.store
    }

    /// Checks `password` against the policy of `entity`.
    pub async fn validate(
        &self,
        entity: impl Into<EntityKind>,
        password: SecretString,
    ) -> ValidationResult {
        let ctx = ValidationContext::new(entity, password);
        self.evaluate(&ctx).await
    }

    /// Evaluates `ctx` against its entity's policy.
    ///
    /// # Returns
    /// - `Accepted` if the entity has no policy or every rule passes
    /// - `Rejected([failure])` with the first failing rule's reason
    pub async fn evaluate(&self, ctx: &ValidationContext) -> ValidationResult {
        if !self.store.has_policy(ctx.entity()) {
            return ValidationResult::Accepted;
        }
        let Ok(policy) = self.store.get_policy(ctx.entity()) else {
            return ValidationResult::Accepted;
        };

        for rule in Rule::ORDER {
            if let Some(failure) = rule.check(ctx, policy, &self.client).await {
                return rejected(ctx, rule, failure);
            }
        }

        ValidationResult::Accepted
    }

    /// Same as [`evaluate`](Self::evaluate), but gives up as soon as `token` is
    /// cancelled, including while the breach lookup is in flight.
    #[cfg(feature = "async")]
    pub async fn evaluate_cancellable(
        &self,
        ctx: &ValidationContext,
        token: CancellationToken,
    ) -> Result<ValidationResult, EvaluationCancelled> {
        if !self.store.has_policy(ctx.entity()) {
            return Ok(ValidationResult::Accepted);
        }
        let Ok(policy) = self.store.get_policy(ctx.entity()) else {
            return Ok(ValidationResult::Accepted);
        };

        for rule in Rule::ORDER {
            // Check cancellation before each rule
            if token.is_cancelled() {
                return Err(EvaluationCancelled);
            }

            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(EvaluationCancelled),
                outcome = rule.check(ctx, policy, &self.client) => outcome,
            };

            if let Some(failure) = outcome {
                return Ok(rejected(ctx, rule, failure));
            }
        }

        Ok(ValidationResult::Accepted)
    }

    /// Async version that sends the evaluation outcome via channel.
    #[cfg(feature = "async")]
    pub async fn evaluate_tx(
        &self,
        ctx: &ValidationContext,
        token: CancellationToken,
        tx: mpsc::Sender<Result<ValidationResult, EvaluationCancelled>>,
    ) {
        #[cfg(feature = "tracing")]
        tracing::debug!(entity = %ctx.entity(), "password evaluation is about to start");

        let outcome = self.evaluate_cancellable(ctx, token).await;

        if let Err(_e) = tx.send(outcome).await {
            #[cfg(feature = "tracing")]
            tracing::error!("Failed to send password evaluation result: {}", _e);
        }
    }
}

fn rejected(_ctx: &ValidationContext, _rule: Rule, failure: ValidationFailure) -> ValidationResult {
    #[cfg(feature = "tracing")]
    tracing::debug!(
        entity = %_ctx.entity(),
        rule = %_rule.id(),
        reason = failure.message_key(),
        "Password rejected"
    );
    ValidationResult::rejected(vec![failure])
}


#[cfg(all(test, feature = "async"))]
mod async_tests {
    use super::*;
    use crate::pwned::testing::{PendingLookup, StaticLookup};

    fn secret(password: &str) -> SecretString {
        SecretString::new(password.to_string().into())
    }

    fn store(json: &str) -> Arc<PolicyStore> {
        Arc::new(PolicyStore::from_json_str(json).expect("valid policy json"))
    }

    #[tokio::test]
    async fn test_evaluate_with_cancellation() {
        let evaluator = PolicyEvaluator::new(
            store(r#"{"member": {"max_length": 4}}"#),
            StaticLookup::default(),
        );
        let token = CancellationToken::new();
        token.cancel();

        let ctx = ValidationContext::new("member", secret("SomePassword123!"));
        let outcome = evaluator.evaluate_cancellable(&ctx, token).await;
        assert_eq!(outcome, Err(EvaluationCancelled));
    }

    #[tokio::test]
    async fn test_evaluate_without_cancellation() {
        let evaluator = PolicyEvaluator::new(
            store(r#"{"member": {"max_length": 4}}"#),
            StaticLookup::default(),
        );
        let token = CancellationToken::new();

        let ctx = ValidationContext::new("member", secret("SomePassword123!"));
        let outcome = evaluator.evaluate_cancellable(&ctx, token).await.unwrap();
        assert_eq!(
            outcome,
            ValidationResult::Rejected(vec![ValidationFailure::MaxLengthExceeded { max_length: 4 }])
        );
    }

    #[tokio::test]
    async fn test_cancel_during_breach_lookup() {
        let evaluator = PolicyEvaluator::new(
            store(r#"{"member": {"breach_threshold": 1}}"#),
            PendingLookup,
        );
        let token = CancellationToken::new();
        let canceller = token.clone();

        let ctx = ValidationContext::new("member", secret("password"));
        let (outcome, _) = tokio::join!(evaluator.evaluate_cancellable(&ctx, token), async move {
            tokio::task::yield_now().await;
            canceller.cancel();
        });
        assert_eq!(outcome, Err(EvaluationCancelled));
    }

    #[tokio::test]
    async fn test_evaluate_tx() {
        let evaluator = PolicyEvaluator::new(
            store(r#"{"member": {"min_length": 12}}"#),
            StaticLookup::default(),
        );
        let (tx, mut rx) = mpsc::channel(1);
        let token = CancellationToken::new();

        let ctx = ValidationContext::new("member", secret("TestPass123!"));
        evaluator.evaluate_tx(&ctx, token, tx).await;

        let outcome = rx.recv().await.expect("Should receive evaluation");
        assert_eq!(outcome, Ok(ValidationResult::Accepted));
    }

    #[tokio::test]
    async fn test_evaluate_tx_closed_channel() {
        let evaluator = PolicyEvaluator::new(
            store(r#"{"member": {"min_length": 12}}"#),
            StaticLookup::default(),
        );
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let ctx = ValidationContext::new("member", secret("short"));
        evaluator.evaluate_tx(&ctx, CancellationToken::new(), tx).await;
    }
}
