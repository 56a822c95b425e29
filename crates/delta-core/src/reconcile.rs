//! Per-entry reconciliation.
//!
//! For every changed source entry the engine decides create-vs-update,
//! computes the minimal attribute diff through the configured
//! [`MappingEvaluator`], and applies it through the destination
//! [`DirectoryClient`]. One bad entry never aborts the cycle.

use std::sync::Arc;

use tracing::{debug, error, trace, warn};

use crate::client::{DirectoryClient, Modification, SyncWindow};
use crate::entry::{AttributeMap, DirectoryEntry};
use crate::error::SyncResult;
use crate::evaluate::{EvaluationContext, MappingEvaluator, RuleSet};
use crate::registry::FailureRegistry;

/// Counters for one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Source entries seen this pass.
    pub scanned: u64,

    /// Destination entries created.
    pub created: u64,

    /// Destination entries updated with at least one modification.
    pub updated: u64,

    /// Entries already in sync; no network call was made.
    pub unchanged: u64,

    /// Entries skipped (missing unique id, or memoized failure).
    pub skipped: u64,

    /// Entries that failed to create or update.
    pub failed: u64,
}

impl CycleStats {
    /// One-line summary for lifecycle logging.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} scanned, {} created, {} updated, {} unchanged, {} skipped, {} failed",
            self.scanned, self.created, self.updated, self.unchanged, self.skipped, self.failed
        )
    }
}

/// Reconciles changed source entries against the destination directory.
pub struct ReconciliationEngine<E: MappingEvaluator> {
    source: Arc<dyn DirectoryClient>,
    destination: Arc<dyn DirectoryClient>,
    rules: RuleSet,
    evaluator: E,
    registry: FailureRegistry,
    memoize_failures: bool,
}

impl<E: MappingEvaluator> ReconciliationEngine<E> {
    /// Creates an engine over a source/destination pair.
    ///
    /// With `memoize_failures` disabled every cycle retries every failing
    /// entry.
    pub fn new(
        source: Arc<dyn DirectoryClient>,
        destination: Arc<dyn DirectoryClient>,
        rules: RuleSet,
        evaluator: E,
        memoize_failures: bool,
    ) -> Self {
        Self {
            source,
            destination,
            rules,
            evaluator,
            registry: FailureRegistry::new(),
            memoize_failures,
        }
    }

    /// Ids that permanently failed so far this process run.
    #[must_use]
    pub fn registry(&self) -> &FailureRegistry {
        &self.registry
    }

    /// Runs one full reconciliation pass over the given window.
    ///
    /// Per-entry failures are absorbed into the returned counters; an
    /// error here means the source search itself broke and the pass was
    /// aborted.
    pub fn run_pass(&mut self, window: &SyncWindow) -> SyncResult<CycleStats> {
        let mut stats = CycleStats::default();
        let source = Arc::clone(&self.source);
        source.search_changed(window, &mut |entry| {
            stats.scanned += 1;
            self.reconcile_entry(&entry, &mut stats);
        })?;
        debug!(summary = %stats.summary(), "reconciliation pass complete");
        Ok(stats)
    }

    fn reconcile_entry(&mut self, entry: &DirectoryEntry, stats: &mut CycleStats) {
        let id_attribute = self.source.unique_id_attribute().to_string();
        let id = match entry.single_value(&id_attribute) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                warn!(
                    dn = %entry.dn,
                    attribute = %id_attribute,
                    "source entry has no unique id value; skipping"
                );
                stats.skipped += 1;
                return;
            }
        };

        match self.destination.find_by_id(&id) {
            Ok(Some(existing)) => self.update_entry(&id, entry, &existing, stats),
            Ok(None) => self.create_entry(&id, entry, stats),
            Err(err) => {
                error!(%id, error = %err, "destination lookup failed");
                stats.failed += 1;
            }
        }
    }

    fn create_entry(&mut self, id: &str, source_entry: &DirectoryEntry, stats: &mut CycleStats) {
        if self.memoize_failures && self.registry.contains(id) {
            warn!(%id, "previously failed to create; not retrying this run");
            stats.skipped += 1;
            return;
        }

        debug!(%id, "destination entry absent; creating");
        let empty = AttributeMap::new();
        let mut attributes = Vec::new();
        for (attribute, rule) in self.rules.iter() {
            match evaluate_rule(
                &self.evaluator,
                rule,
                source_entry,
                &empty,
                &self.source,
                &self.destination,
            ) {
                Ok(Some(value)) => attributes.push((attribute.to_string(), value)),
                Ok(None) => {}
                Err(err) => {
                    warn!(%id, %attribute, error = %err, "rule failed; attribute skipped");
                }
            }
        }

        match self.destination.create(id, attributes) {
            Ok(()) => stats.created += 1,
            Err(err) => {
                error!(%id, error = %err, "failed to create entry");
                stats.failed += 1;
                if self.memoize_failures && err.is_permanent() {
                    self.registry.record(id);
                    warn!(%id, "will not try again to create this id");
                }
            }
        }
    }

    fn update_entry(
        &mut self,
        id: &str,
        source_entry: &DirectoryEntry,
        existing: &DirectoryEntry,
        stats: &mut CycleStats,
    ) {
        if self.memoize_failures && self.registry.contains(id) {
            warn!(%id, "previously failed; not retrying this run");
            stats.skipped += 1;
            return;
        }

        trace!(%id, dn = %existing.dn, "destination entry present; diffing");
        let mut modifications = Vec::new();
        if let Some(modification) = self.object_class_update(existing) {
            modifications.push(modification);
        }

        for (attribute, rule) in self.rules.iter() {
            let evaluated = match evaluate_rule(
                &self.evaluator,
                rule,
                source_entry,
                &existing.attributes,
                &self.source,
                &self.destination,
            ) {
                Ok(evaluated) => evaluated,
                Err(err) => {
                    warn!(%id, %attribute, error = %err, "rule failed; attribute skipped");
                    continue;
                }
            };

            let current = existing.attributes.single(attribute).unwrap_or("");
            match evaluated {
                Some(value) => {
                    if current.is_empty() && !value.is_empty() {
                        trace!(%attribute, %value, "adding attribute");
                        modifications.push(Modification::Add {
                            attribute: attribute.to_string(),
                            value,
                        });
                    } else if value != current {
                        trace!(%attribute, from = %current, to = %value, "replacing attribute");
                        modifications.push(Modification::Replace {
                            attribute: attribute.to_string(),
                            values: vec![value],
                        });
                    }
                }
                None => {
                    if !current.is_empty() {
                        trace!(%attribute, "removing attribute; rule yields no value");
                        modifications.push(Modification::Remove {
                            attribute: attribute.to_string(),
                        });
                    }
                }
            }
        }

        if modifications.is_empty() {
            trace!(%id, "entry already in sync");
            stats.unchanged += 1;
            return;
        }

        match self.destination.modify(&existing.dn, &modifications) {
            Ok(()) => {
                debug!(%id, count = modifications.len(), "updated entry");
                stats.updated += 1;
            }
            Err(err) => {
                error!(%id, error = %err, "failed to update entry");
                stats.failed += 1;
                if self.memoize_failures {
                    self.registry.record(id);
                    warn!(%id, "will not try again to update this id");
                }
            }
        }
    }

    /// Replace-with-union when the required object-class set has members
    /// missing from the entry's current set. Comparison and the emitted
    /// values are lower-cased; object-class values are case-insensitive
    /// on the server side.
    fn object_class_update(&self, existing: &DirectoryEntry) -> Option<Modification> {
        let mut current: Vec<String> = existing
            .attributes
            .get("objectClass")
            .map(|value| value.values().iter().map(|v| v.to_lowercase()).collect())
            .unwrap_or_default();

        let missing: Vec<String> = self
            .destination
            .object_classes()
            .iter()
            .map(|oc| oc.to_lowercase())
            .filter(|oc| !current.contains(oc))
            .collect();

        if missing.is_empty() {
            return None;
        }

        current.extend(missing);
        Some(Modification::Replace {
            attribute: "objectClass".to_string(),
            values: current,
        })
    }
}

fn evaluate_rule<E: MappingEvaluator>(
    evaluator: &E,
    rule: &str,
    source_entry: &DirectoryEntry,
    destination_attributes: &AttributeMap,
    source: &Arc<dyn DirectoryClient>,
    destination: &Arc<dyn DirectoryClient>,
) -> SyncResult<Option<String>> {
    let context = EvaluationContext {
        source_entry,
        destination_attributes,
        source,
        destination,
    };
    evaluator.evaluate(rule, &context)
}
