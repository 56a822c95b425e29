//! Failure memoization.

use std::collections::HashSet;

/// Remembers entry ids that permanently failed create or update.
///
/// Purely additive, in-memory, scoped to one process run; cleared only by
/// restart. Whether the registry is consulted at all is a policy decided
/// by the engine configuration, not by the registry itself.
#[derive(Debug, Default)]
pub struct FailureRegistry {
    failed: HashSet<String>,
}

impl FailureRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a permanently-failed id.
    pub fn record(&mut self, id: impl Into<String>) {
        self.failed.insert(id.into());
    }

    /// Returns true when `id` has been recorded this process run.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.failed.contains(id)
    }

    /// Number of recorded ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.failed.len()
    }

    /// Returns true when nothing has failed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_additive_and_idempotent() {
        let mut registry = FailureRegistry::new();
        assert!(registry.is_empty());

        registry.record("jdoe");
        registry.record("jdoe");
        registry.record("asmith");

        assert!(registry.contains("jdoe"));
        assert!(registry.contains("asmith"));
        assert!(!registry.contains("unknown"));
        assert_eq!(registry.len(), 2);
    }
}
