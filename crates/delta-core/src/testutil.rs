//! Shared in-memory fakes for engine and poller tests.

use std::sync::{Arc, Mutex};

use crate::client::{DirectoryClient, Modification, SyncWindow};
use crate::entry::{AttributeMap, AttributeValue, DirectoryEntry};
use crate::error::{SyncError, SyncResult};
use crate::evaluate::{EvaluationContext, MappingEvaluator};

pub fn entry(dn: &str, attrs: &[(&str, &[&str])]) -> DirectoryEntry {
    let mut map = AttributeMap::new();
    for (name, values) in attrs {
        let values: Vec<String> = values.iter().map(|v| (*v).to_string()).collect();
        if let Some(value) = AttributeValue::from_values(values) {
            map.insert(name, value);
        }
    }
    DirectoryEntry::new(dn.to_string(), map)
}

/// Kind of failure a fake operation should raise.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum FailWith {
    Schema,
    Conflict,
    Protocol,
}

#[derive(Default)]
pub struct FakeDirectory {
    pub unique_id: String,
    pub classes: Vec<String>,
    pub source_entries: Mutex<Vec<DirectoryEntry>>,
    pub store: Mutex<Vec<DirectoryEntry>>,
    pub created: Mutex<Vec<(String, Vec<(String, String)>)>>,
    pub modified: Mutex<Vec<(String, Vec<Modification>)>>,
    pub create_attempts: Mutex<u64>,
    pub fail_create: Mutex<Option<FailWith>>,
    pub fail_modify: Mutex<Option<FailWith>>,
}

impl FakeDirectory {
    pub fn new(unique_id: &str) -> Self {
        Self {
            unique_id: unique_id.to_string(),
            classes: vec!["top".to_string(), "inetOrgPerson".to_string()],
            ..Default::default()
        }
    }

    pub fn push_source(&self, entry: DirectoryEntry) {
        self.source_entries.lock().unwrap().push(entry);
    }

    pub fn push_store(&self, entry: DirectoryEntry) {
        self.store.lock().unwrap().push(entry);
    }

    pub fn create_attempts(&self) -> u64 {
        *self.create_attempts.lock().unwrap()
    }

    pub fn created(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.created.lock().unwrap().clone()
    }

    pub fn modified(&self) -> Vec<(String, Vec<Modification>)> {
        self.modified.lock().unwrap().clone()
    }
}

fn failure(kind: FailWith) -> SyncError {
    match kind {
        FailWith::Schema => SyncError::SchemaViolation("objectClass violation".to_string()),
        FailWith::Conflict => SyncError::AttributeConflict("value already in use".to_string()),
        FailWith::Protocol => SyncError::Protocol("server busy".to_string()),
    }
}

impl DirectoryClient for FakeDirectory {
    fn unique_id_attribute(&self) -> &str {
        &self.unique_id
    }

    fn object_classes(&self) -> &[String] {
        &self.classes
    }

    fn search_changed(
        &self,
        _window: &SyncWindow,
        visit: &mut dyn FnMut(DirectoryEntry),
    ) -> SyncResult<u64> {
        let entries = self.source_entries.lock().unwrap().clone();
        let count = entries.len() as u64;
        for entry in entries {
            visit(entry);
        }
        Ok(count)
    }

    fn find_by_id(&self, id: &str) -> SyncResult<Option<DirectoryEntry>> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.single_value(&self.unique_id) == Some(id))
            .cloned())
    }

    fn create(&self, id: &str, attributes: Vec<(String, String)>) -> SyncResult<()> {
        *self.create_attempts.lock().unwrap() += 1;
        if let Some(kind) = *self.fail_create.lock().unwrap() {
            return Err(failure(kind));
        }

        let mut map = AttributeMap::new();
        map.insert(&self.unique_id, AttributeValue::Single(id.to_string()));
        map.insert(
            "objectClass",
            AttributeValue::Multi(self.classes.clone()),
        );
        for (name, value) in &attributes {
            map.insert(name, AttributeValue::Single(value.clone()));
        }
        let dn = format!("{}={},dc=fake", self.unique_id, id);
        self.store.lock().unwrap().push(DirectoryEntry::new(dn, map));

        self.created.lock().unwrap().push((id.to_string(), attributes));
        Ok(())
    }

    fn modify(&self, dn: &str, modifications: &[Modification]) -> SyncResult<()> {
        if let Some(kind) = *self.fail_modify.lock().unwrap() {
            return Err(failure(kind));
        }
        self.modified
            .lock()
            .unwrap()
            .push((dn.to_string(), modifications.to_vec()));
        Ok(())
    }
}

/// Evaluator that treats the rule text as a source attribute name.
pub struct AttrEvaluator;

impl MappingEvaluator for AttrEvaluator {
    fn evaluate(
        &self,
        rule: &str,
        context: &EvaluationContext<'_>,
    ) -> SyncResult<Option<String>> {
        Ok(context.source_entry.single_value(rule).map(str::to_string))
    }
}

pub fn as_client(fake: &Arc<FakeDirectory>) -> Arc<dyn DirectoryClient> {
    Arc::clone(fake) as Arc<dyn DirectoryClient>
}
