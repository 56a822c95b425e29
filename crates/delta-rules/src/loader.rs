//! Conversion-map file loading.
//!
//! The conversion map is a flat key/value text file. Keys prefixed
//! `map.` name a destination attribute; the remainder of the key (after
//! the prefix) is the attribute name and the value is the rule
//! expression. Other keys, blank lines and `#`/`!` comment lines are
//! ignored. The file is read once at startup; an unreadable or malformed
//! file is fatal.

use std::fs;
use std::path::Path;

use delta_core::{RuleSet, SyncError, SyncResult};
use tracing::debug;

/// Key prefix marking a conversion rule.
pub const RULE_KEY_PREFIX: &str = "map.";

/// Reads and parses the conversion map at `path`.
pub fn load_rules(path: &Path) -> SyncResult<RuleSet> {
    let text = fs::read_to_string(path).map_err(|err| {
        SyncError::config(format!(
            "cannot read conversion map {}: {err}",
            path.display()
        ))
    })?;
    let rules = parse_rules(&text)?;
    debug!(path = %path.display(), rules = rules.len(), "loaded conversion map");
    Ok(rules)
}

/// Parses conversion-map text into a [`RuleSet`], preserving file order.
pub fn parse_rules(text: &str) -> SyncResult<RuleSet> {
    let mut rules = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(SyncError::config(format!(
                "conversion map line {}: expected key = value, got {line:?}",
                index + 1
            )));
        };
        let key = key.trim();
        let Some(attribute) = key.strip_prefix(RULE_KEY_PREFIX) else {
            // Not a rule key; the file may carry other settings.
            continue;
        };
        let attribute = attribute.trim();
        let expression = value.trim();
        if attribute.is_empty() {
            return Err(SyncError::config(format!(
                "conversion map line {}: empty attribute name",
                index + 1
            )));
        }
        if expression.is_empty() {
            return Err(SyncError::config(format!(
                "conversion map line {}: empty rule for attribute {attribute}",
                index + 1
            )));
        }
        rules.push((attribute.to_string(), expression.to_string()));
    }
    Ok(RuleSet::new(rules))
}
