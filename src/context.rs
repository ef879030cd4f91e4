//! Validation context passed to every rule.

use secrecy::{ExposeSecret, SecretString};

use crate::policy::EntityKind;

/// Immutable input of one evaluation: the entity kind and the candidate password.
///
/// The password is kept in a [`SecretString`] so it never shows up in `Debug`
/// output or logs.
#[derive(Debug)]
pub struct ValidationContext {
    entity: EntityKind,
    password: SecretString,
}

impl ValidationContext {
    pub fn new(entity: impl Into<EntityKind>, password: SecretString) -> Self {
        Self {
            entity: entity.into(),
            password,
        }
    }

    pub fn entity(&self) -> &EntityKind {
        &self.entity
    }

    pub fn password(&self) -> &SecretString {
        &self.password
    }

    /// Password length in Unicode scalar values.
    pub fn password_len(&self) -> usize {
        self.password.expose_secret().chars().count()
    }
}
