//! Per-endpoint LDAP settings and filter construction.

use chrono::{DateTime, Utc};
use ldap3::{dn_escape, ldap_escape};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::LdapError;
use delta_core::SyncWindow;

fn default_changed_attribute() -> String {
    "whenChanged".to_string()
}

const fn default_page_size() -> i32 {
    10
}

const fn default_read_only() -> bool {
    true
}

const fn default_connect_timeout() -> u64 {
    30
}

/// Settings for one directory endpoint.
///
/// Deserialized from the `[source]` and `[destination]` tables of the
/// daemon configuration. `read_only` defaults to true so a fresh
/// deployment never writes until explicitly told to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    /// Server URL, e.g. `ldaps://directory.example.com:636`.
    pub url: String,

    /// Bind DN.
    pub principal: String,

    /// Bind password. Never serialized back out.
    #[serde(skip_serializing)]
    pub credential: String,

    /// Search base for every operation against this endpoint.
    pub base_dn: String,

    /// Attribute whose value joins entries across directories.
    pub unique_id_attribute: String,

    /// Object classes entries must carry; accepts a list or a
    /// comma-separated string.
    #[serde(deserialize_with = "deserialize_classes")]
    pub object_classes: Vec<String>,

    /// Extra filter ANDed into every changed-entry search, already in
    /// LDAP filter syntax, e.g. `(department=engineering)`.
    #[serde(default)]
    pub extra_filter: Option<String>,

    /// Operational attribute carrying the last-modified timestamp.
    #[serde(default = "default_changed_attribute")]
    pub changed_attribute: String,

    /// Paged-results page size.
    #[serde(default = "default_page_size")]
    pub page_size: i32,

    /// When set, create and modify log their intent and do nothing.
    #[serde(default = "default_read_only")]
    pub read_only: bool,

    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl EndpointConfig {
    /// Checks the settings a connection attempt would trip over anyway,
    /// but earlier and with a better message.
    pub fn validate(&self) -> Result<(), LdapError> {
        if self.url.trim().is_empty() {
            return Err(LdapError::Configuration("url must not be empty".to_string()));
        }
        if !self.url.starts_with("ldap://") && !self.url.starts_with("ldaps://") {
            return Err(LdapError::Configuration(format!(
                "url must start with ldap:// or ldaps://, got {}",
                self.url
            )));
        }
        if self.base_dn.trim().is_empty() {
            return Err(LdapError::Configuration(
                "base_dn must not be empty".to_string(),
            ));
        }
        if self.unique_id_attribute.trim().is_empty() {
            return Err(LdapError::Configuration(
                "unique_id_attribute must not be empty".to_string(),
            ));
        }
        if self.object_classes.is_empty() {
            return Err(LdapError::Configuration(
                "at least one object class is required".to_string(),
            ));
        }
        if self.page_size < 1 {
            return Err(LdapError::Configuration(format!(
                "page_size must be at least 1, got {}",
                self.page_size
            )));
        }
        Ok(())
    }

    /// Filter matching entries changed within `window`.
    #[must_use]
    pub fn changed_filter(&self, window: &SyncWindow) -> String {
        let mut clauses: Vec<String> = self
            .object_classes
            .iter()
            .map(|class| format!("(objectClass={class})"))
            .collect();
        if let Some(bound) = window.lower_bound() {
            clauses.push(format!(
                "({}>={})",
                self.changed_attribute,
                generalized_time(bound)
            ));
        }
        if let Some(extra) = &self.extra_filter {
            clauses.push(extra.clone());
        }
        join_clauses(clauses)
    }

    /// Filter matching the single entry whose unique id equals `id`.
    ///
    /// Deliberately matches on the unique id alone: an entry that is
    /// missing a required object class must still be found so the
    /// reconciliation can repair its object-class set instead of
    /// attempting a duplicate create.
    #[must_use]
    pub fn id_filter(&self, id: &str) -> String {
        format!("({}={})", self.unique_id_attribute, ldap_escape(id))
    }

    /// DN for a newly created entry: unique id RDN directly under the
    /// base. The RDN value gets DN escaping, not filter escaping.
    #[must_use]
    pub fn dn_for_id(&self, id: &str) -> String {
        format!(
            "{}={},{}",
            self.unique_id_attribute,
            dn_escape(id),
            self.base_dn
        )
    }
}

fn join_clauses(clauses: Vec<String>) -> String {
    if clauses.len() == 1 {
        clauses.into_iter().next().unwrap_or_default()
    } else {
        format!("(&{})", clauses.concat())
    }
}

/// Formats a timestamp as LDAP generalized time, e.g. `20240517110000.0Z`.
#[must_use]
pub fn generalized_time(ts: DateTime<Utc>) -> String {
    format!("{}.0Z", ts.format("%Y%m%d%H%M%S"))
}

fn deserialize_classes<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListOrCsv {
        List(Vec<String>),
        Csv(String),
    }

    let classes = match ListOrCsv::deserialize(deserializer)? {
        ListOrCsv::List(list) => list,
        ListOrCsv::Csv(csv) => csv
            .split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect(),
    };
    Ok(classes)
}
