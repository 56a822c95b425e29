//! Rhai-backed rule evaluation.
//!
//! Each rule is a short Rhai expression evaluated against a fresh,
//! sandboxed engine. The scope binds `source` (DN plus raw attributes),
//! `attributes` (case-insensitive source view) and `target` (current
//! destination attributes, empty when creating); `source_lookup(id)` and
//! `destination_lookup(id)` are registered for secondary lookups through
//! the bound client handles.

use std::sync::Arc;

use delta_core::{
    AttributeMap, AttributeValue, DirectoryClient, EvaluationContext, MappingEvaluator, SyncError,
    SyncResult,
};
use rhai::{Dynamic, Engine, Scope};
use tracing::warn;

const MAX_OPERATIONS: u64 = 100_000;
const MAX_CALL_DEPTH: usize = 32;
const MAX_STRING_SIZE: usize = 65_536;
const MAX_ARRAY_SIZE: usize = 10_000;
const MAX_MAP_SIZE: usize = 10_000;

/// Sandboxed Rhai [`MappingEvaluator`].
///
/// Stateless: a fresh engine is built per evaluation so rules can never
/// leak state into each other.
#[derive(Debug, Default)]
pub struct RhaiEvaluator;

impl RhaiEvaluator {
    /// Creates the evaluator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn sandboxed_engine(context: &EvaluationContext<'_>) -> Engine {
        let mut engine = Engine::new();
        engine.set_max_operations(MAX_OPERATIONS);
        engine.set_max_call_levels(MAX_CALL_DEPTH);
        engine.set_max_string_size(MAX_STRING_SIZE);
        engine.set_max_array_size(MAX_ARRAY_SIZE);
        engine.set_max_map_size(MAX_MAP_SIZE);
        engine.set_strict_variables(true);

        let source = Arc::clone(context.source);
        engine.register_fn("source_lookup", move |id: &str| lookup(&source, id));
        let destination = Arc::clone(context.destination);
        engine.register_fn("destination_lookup", move |id: &str| {
            lookup(&destination, id)
        });

        engine
    }
}

/// Syntax-checks every rule expression. Run once at startup so a typo in
/// the conversion map fails the process instead of every entry.
///
/// Only syntax is checked; unknown bindings surface at evaluation time.
pub fn validate_rules(rules: &delta_core::RuleSet) -> SyncResult<()> {
    let engine = Engine::new();
    for (attribute, rule) in rules.iter() {
        engine.compile(rule).map_err(|err| {
            SyncError::config(format!("invalid rule for attribute {attribute}: {err}"))
        })?;
    }
    Ok(())
}

impl MappingEvaluator for RhaiEvaluator {
    fn evaluate(&self, rule: &str, context: &EvaluationContext<'_>) -> SyncResult<Option<String>> {
        let engine = Self::sandboxed_engine(context);

        let mut scope = Scope::new();
        let mut source = rhai::Map::new();
        source.insert("dn".into(), Dynamic::from(context.source_entry.dn.clone()));
        source.insert(
            "attributes".into(),
            attributes_to_dynamic(&context.source_entry.attributes),
        );
        scope.push_constant("source", source);
        scope.push_constant(
            "attributes",
            attributes_to_dynamic(&context.source_entry.attributes),
        );
        scope.push_constant(
            "target",
            attributes_to_dynamic(context.destination_attributes),
        );

        let ast = engine
            .compile_with_scope(&scope, rule)
            .map_err(|err| SyncError::evaluation(format!("cannot compile rule: {err}")))?;
        let value = engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, &ast)
            .map_err(|err| SyncError::evaluation(err.to_string()))?;

        coerce(value)
    }
}

/// Secondary lookup bound into the rule scope. Failures surface as
/// no-value; the rule decides what to do with an absent entry.
fn lookup(client: &Arc<dyn DirectoryClient>, id: &str) -> Dynamic {
    match client.find_by_id(id) {
        Ok(Some(entry)) => attributes_to_dynamic(&entry.attributes),
        Ok(None) => Dynamic::UNIT,
        Err(err) => {
            warn!(%id, error = %err, "secondary lookup from rule failed");
            Dynamic::UNIT
        }
    }
}

fn attributes_to_dynamic(attributes: &AttributeMap) -> Dynamic {
    let mut map = rhai::Map::new();
    for (name, value) in attributes.iter() {
        let dynamic = match value {
            AttributeValue::Single(v) => Dynamic::from(v.clone()),
            AttributeValue::Multi(vs) => {
                let array: rhai::Array = vs.iter().cloned().map(Dynamic::from).collect();
                Dynamic::from(array)
            }
        };
        map.insert(name.as_str().into(), dynamic);
    }
    Dynamic::from_map(map)
}

/// Coerces a rule result to string-or-no-value.
///
/// Unit means "no value"; a multi-valued attribute (array) coerces to
/// its first value's string form; a map cannot stand in for a single
/// attribute value.
fn coerce(value: Dynamic) -> SyncResult<Option<String>> {
    if value.is_unit() {
        return Ok(None);
    }
    if value.is_array() {
        let array = value.cast::<rhai::Array>();
        return match array.into_iter().next() {
            Some(first) => coerce(first),
            None => Ok(None),
        };
    }
    if value.is_map() {
        return Err(SyncError::AttributeExtraction {
            attribute: String::new(),
            message: "rule evaluated to a map; expected a single value".to_string(),
        });
    }
    Ok(Some(value.to_string()))
}
