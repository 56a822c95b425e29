//! Rule evaluation seam.
//!
//! Attribute values written to the destination are computed by evaluating
//! a per-deployment, user-authored rule expression instead of a straight
//! copy. This module defines the contract only; the concrete evaluator
//! lives behind the [`MappingEvaluator`] trait and is swappable without
//! touching reconciliation logic.

use std::sync::Arc;

use crate::client::DirectoryClient;
use crate::entry::{AttributeMap, DirectoryEntry};
use crate::error::SyncResult;

/// The conversion rule set: destination attribute name → rule expression.
///
/// Loaded once per process and treated as immutable for the run's
/// lifetime; all entries in one poll cycle are evaluated against the same
/// rules, in file order.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<(String, String)>,
}

impl RuleSet {
    /// Builds a rule set from `(attribute, expression)` pairs.
    #[must_use]
    pub fn new(rules: Vec<(String, String)>) -> Self {
        Self { rules }
    }

    /// Iterates over `(attribute, expression)` pairs in load order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.rules
            .iter()
            .map(|(attribute, rule)| (attribute.as_str(), rule.as_str()))
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true when no rules are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl FromIterator<(String, String)> for RuleSet {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Read-only bundle a rule is evaluated against.
///
/// Rules see the raw source entry, a case-insensitive view of its
/// attributes, the current destination attributes (an empty map when the
/// destination entry is being created), and both client handles for
/// secondary lookups.
pub struct EvaluationContext<'a> {
    /// The changed source entry being reconciled.
    pub source_entry: &'a DirectoryEntry,

    /// Current destination attributes; empty when creating.
    pub destination_attributes: &'a AttributeMap,

    /// Handle to the source directory.
    pub source: &'a Arc<dyn DirectoryClient>,

    /// Handle to the destination directory.
    pub destination: &'a Arc<dyn DirectoryClient>,
}

/// Evaluates one transformation rule against an [`EvaluationContext`].
///
/// `Ok(None)` means "this attribute should be absent/removed". This is
/// the system's single extension point for per-deployment business logic.
pub trait MappingEvaluator {
    /// Evaluates `rule` and returns the computed value, or no-value.
    fn evaluate(&self, rule: &str, context: &EvaluationContext<'_>) -> SyncResult<Option<String>>;
}
