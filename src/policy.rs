//! Policy store module
//!
//! Holds the per-entity password policies and loads them from configuration.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming the policy configuration file.
pub const POLICY_PATH_ENV: &str = "PWD_POLICY_PATH";

const DEFAULT_POLICY_PATH: &str = "./config/password_policy.json";

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("No password policy configured for entity: {0}")]
    NotConfigured(EntityKind),
    #[error("Policy file not found: {0}")]
    FileNotFound(PathBuf),
    #[error("Failed to read policy file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse policy configuration: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Entity kind must not be empty")]
    InvalidEntityKind,
}

/// Category of account a policy applies to (e.g. `backend_user`, `front_end_member`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct EntityKind(String);

impl EntityKind {
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityKind {
    fn from(kind: &str) -> Self {
        Self::new(kind)
    }
}

impl From<String> for EntityKind {
    fn from(kind: String) -> Self {
        Self(kind)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Minimum counts per character class. Absent and zero both mean "not required".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RequirementSet {
    pub uppercase: Option<usize>,
    pub lowercase: Option<usize>,
    pub numbers: Option<usize>,
    pub other: Option<usize>,
}

impl RequirementSet {
    /// Returns the positive minimum for `class`, if any.
    pub fn minimum(&self, class: CharacterClass) -> Option<usize> {
        let value = match class {
            CharacterClass::Uppercase => self.uppercase,
            CharacterClass::Lowercase => self.lowercase,
            CharacterClass::Numbers => self.numbers,
            CharacterClass::Other => self.other,
        };
        value.filter(|&min| min > 0)
    }

    pub fn is_empty(&self) -> bool {
        CharacterClass::ALL
            .iter()
            .all(|&class| self.minimum(class).is_none())
    }
}

/// Character classes a [`RequirementSet`] can demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacterClass {
    Uppercase,
    Lowercase,
    Numbers,
    Other,
}

impl CharacterClass {
    /// Evaluation order of the classes.
    pub const ALL: [CharacterClass; 4] = [
        CharacterClass::Uppercase,
        CharacterClass::Lowercase,
        CharacterClass::Numbers,
        CharacterClass::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CharacterClass::Uppercase => "uppercase",
            CharacterClass::Lowercase => "lowercase",
            CharacterClass::Numbers => "numbers",
            CharacterClass::Other => "other",
        }
    }
}

impl fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deduplicated set of characters counted as the "other" class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtherChars {
    set: HashSet<char>,
    display: String,
}

impl OtherChars {
    /// Builds the set from `chars`, keeping the first occurrence of each character.
    /// Returns `None` when `chars` is empty.
    pub fn new(chars: &str) -> Option<Self> {
        let mut set = HashSet::new();
        let display: String = chars.chars().filter(|c| set.insert(*c)).collect();
        if display.is_empty() {
            return None;
        }
        Some(Self { set, display })
    }

    pub fn contains(&self, c: char) -> bool {
        self.set.contains(&c)
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Deduplicated characters in first-occurrence order.
    pub fn as_str(&self) -> &str {
        &self.display
    }
}

/// Password policy for one entity kind. Every field is optional; an unset field
/// disables the corresponding rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    /// Parsed but not enforced here; lockout needs per-account state.
    pub invalid_attempts: Option<usize>,
    /// Parsed but not enforced here; history needs stored password hashes.
    pub password_history: Option<usize>,
    /// Parsed but not enforced here; ageing needs the last change date.
    pub change_days: Option<usize>,
    pub other_chars: Option<String>,
    pub require: RequirementSet,
    #[serde(alias = "haveibeenpwned")]
    pub breach_threshold: Option<u64>,
}

impl PolicyConfig {
    /// The `min_length` bound, if set and positive.
    pub fn min_length(&self) -> Option<usize> {
        self.min_length.filter(|&len| len > 0)
    }

    /// The `max_length` bound, if set and positive.
    pub fn max_length(&self) -> Option<usize> {
        self.max_length.filter(|&len| len > 0)
    }

    /// The breach threshold, if set and positive.
    pub fn breach_threshold(&self) -> Option<u64> {
        self.breach_threshold.filter(|&threshold| threshold > 0)
    }

    /// The deduplicated "other" character set, if configured and non-empty.
    pub fn other_chars(&self) -> Option<OtherChars> {
        self.other_chars.as_deref().and_then(OtherChars::new)
    }

    /// True when no enforced field is set, which is the same as having no policy.
    pub fn is_empty(&self) -> bool {
        self.min_length().is_none()
            && self.max_length().is_none()
            && self.breach_threshold().is_none()
            && self.require.is_empty()
    }
}

/// Read-only mapping from entity kind to policy.
///
/// Built once from configuration and never mutated afterwards; share it
/// between evaluators with `Arc`.
#[derive(Debug, Clone, Default)]
pub struct PolicyStore {
    policies: HashMap<EntityKind, PolicyConfig>,
}

impl PolicyStore {
    pub fn new(policies: HashMap<EntityKind, PolicyConfig>) -> Result<Self, PolicyError> {
        if policies.keys().any(|kind| kind.as_str().is_empty()) {
            return Err(PolicyError::InvalidEntityKind);
        }
        Ok(Self { policies })
    }

    /// Parses a JSON object keyed by entity kind.
    ///
    /// ```rust
    /// let store = pwd_policy::PolicyStore::from_json_str(
    ///     r#"{"backend_user": {"max_length": 64, "require": {"numbers": 1}}}"#,
    /// ).unwrap();
    /// assert!(store.has_policy(&"backend_user".into()));
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self, PolicyError> {
        let policies: HashMap<EntityKind, PolicyConfig> = serde_json::from_str(json)?;
        Self::new(policies)
    }

    /// Loads the store from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File does not exist
    /// - File cannot be read
    /// - File is not a valid policy configuration
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, PolicyError> {
        let path = path.as_ref();

        if !path.exists() {
            #[cfg(feature = "tracing")]
            tracing::error!("Policy loading FAILED: FileNotFound {:?}", path);
            return Err(PolicyError::FileNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        let store = Self::from_json_str(&content).inspect_err(|_e| {
            #[cfg(feature = "tracing")]
            tracing::error!("Policy loading FAILED: {} ({:?})", _e, path);
        })?;

        #[cfg(feature = "tracing")]
        tracing::info!("Password policies loaded: {} entities from {:?}", store.len(), path);

        Ok(store)
    }

    /// Loads the store from the file named by `PWD_POLICY_PATH`.
    pub fn from_env() -> Result<Self, PolicyError> {
        Self::from_path(policy_path())
    }

    /// True when `entity` has a policy with at least one enforced field.
    pub fn has_policy(&self, entity: &EntityKind) -> bool {
        self.policies
            .get(entity)
            .is_some_and(|policy| !policy.is_empty())
    }

    /// Returns the policy for `entity`.
    ///
    /// Fails with [`PolicyError::NotConfigured`] whenever [`has_policy`](Self::has_policy)
    /// would return `false`.
    pub fn get_policy(&self, entity: &EntityKind) -> Result<&PolicyConfig, PolicyError> {
        self.policies
            .get(entity)
            .filter(|policy| !policy.is_empty())
            .ok_or_else(|| PolicyError::NotConfigured(entity.clone()))
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

/// Returns the policy file path.
///
/// Priority:
/// 1. Environment variable `PWD_POLICY_PATH`
/// 2. Default path `./config/password_policy.json`
pub fn policy_path() -> PathBuf {
    std::env::var(POLICY_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_POLICY_PATH))
}
