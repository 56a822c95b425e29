//! # delta-rules
//!
//! Conversion-rule loading and the Rhai-backed [`MappingEvaluator`]
//! implementation for Delta Sync.
//!
//! [`MappingEvaluator`]: delta_core::MappingEvaluator

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod evaluator;
pub mod loader;

pub use evaluator::{validate_rules, RhaiEvaluator};
pub use loader::{load_rules, parse_rules, RULE_KEY_PREFIX};
