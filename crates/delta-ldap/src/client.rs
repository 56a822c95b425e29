//! [`DirectoryClient`] backed by a real LDAP server.

use std::collections::HashSet;

use ldap3::controls::{Control, ControlType, MakeCritical, PagedResults};
use ldap3::{LdapConn, Mod, Scope, SearchEntry};
use tracing::{debug, info, trace, warn};

use delta_core::{
    AttributeMap, AttributeValue, DirectoryClient, DirectoryEntry, Modification, SyncResult,
    SyncWindow,
};

use crate::config::EndpointConfig;
use crate::connection::Connector;
use crate::error::LdapError;

/// Requests every user and operational attribute.
const ALL_ATTRIBUTES: [&str; 2] = ["*", "+"];

/// One configured LDAP endpoint.
///
/// Operations borrow a pooled connection from the [`Connector`]; the
/// connection is returned only after success so a broken session is
/// rebound on the next call.
pub struct LdapDirectory {
    config: EndpointConfig,
    connector: Connector,
}

impl LdapDirectory {
    /// Validates `config` and prepares the endpoint. No connection is
    /// opened until the first operation.
    pub fn new(config: EndpointConfig) -> Result<Self, LdapError> {
        config.validate()?;
        info!(
            url = %config.url,
            base_dn = %config.base_dn,
            unique_id = %config.unique_id_attribute,
            page_size = config.page_size,
            read_only = config.read_only,
            "endpoint configured"
        );
        Ok(Self {
            connector: Connector::new(config.clone()),
            config,
        })
    }

    fn fetch_page(
        &self,
        conn: &mut LdapConn,
        filter: &str,
        cookie: Vec<u8>,
    ) -> Result<(Vec<DirectoryEntry>, Option<Vec<u8>>), LdapError> {
        let control = PagedResults {
            size: self.config.page_size,
            cookie,
        }
        .critical();

        let (entries, res) = conn
            .with_controls(control)
            .search(
                &self.config.base_dn,
                Scope::Subtree,
                filter,
                ALL_ATTRIBUTES.to_vec(),
            )?
            .success()?;

        let entries = entries
            .into_iter()
            .map(|entry| entry_from_search(SearchEntry::construct(entry)))
            .collect();

        let next = res.ctrls.into_iter().find_map(|control| match control {
            Control(Some(ControlType::PagedResults), raw) => {
                let paged = raw.parse::<PagedResults>();
                if paged.cookie.is_empty() {
                    None
                } else {
                    Some(paged.cookie)
                }
            }
            _ => None,
        });

        Ok((entries, next))
    }
}

/// Drains a paging session: fetches page after page, feeding each entry
/// to `visit`, until the server stops returning a cookie. Returns the
/// number of entries yielded.
fn drain_paged<F>(mut fetch: F, visit: &mut dyn FnMut(DirectoryEntry)) -> Result<u64, LdapError>
where
    F: FnMut(Vec<u8>) -> Result<(Vec<DirectoryEntry>, Option<Vec<u8>>), LdapError>,
{
    let mut cookie = Vec::new();
    let mut count = 0u64;
    loop {
        let (entries, next) = fetch(cookie)?;
        for entry in entries {
            count += 1;
            visit(entry);
        }
        match next {
            Some(next) => cookie = next,
            None => return Ok(count),
        }
    }
}

/// Converts a wire entry into the engine's model. String attributes are
/// kept; binary attributes have no place in rule evaluation and are
/// dropped with a debug trace.
fn entry_from_search(entry: SearchEntry) -> DirectoryEntry {
    let mut attributes = AttributeMap::new();
    for (name, values) in entry.attrs {
        if let Some(value) = AttributeValue::from_values(values) {
            attributes.insert(&name, value);
        }
    }
    for name in entry.bin_attrs.keys() {
        debug!(dn = %entry.dn, attribute = %name, "skipping binary attribute");
    }
    DirectoryEntry::new(entry.dn, attributes)
}

/// Deterministic pick when a unique-id lookup matches several entries.
fn first_match(id: &str, mut entries: Vec<DirectoryEntry>) -> Option<DirectoryEntry> {
    if entries.len() > 1 {
        warn!(
            %id,
            matches = entries.len(),
            "unique-id lookup matched multiple entries; using the first"
        );
    }
    if entries.is_empty() {
        None
    } else {
        Some(entries.remove(0))
    }
}

impl DirectoryClient for LdapDirectory {
    fn unique_id_attribute(&self) -> &str {
        &self.config.unique_id_attribute
    }

    fn object_classes(&self) -> &[String] {
        &self.config.object_classes
    }

    fn search_changed(
        &self,
        window: &SyncWindow,
        visit: &mut dyn FnMut(DirectoryEntry),
    ) -> SyncResult<u64> {
        let filter = self.config.changed_filter(window);
        trace!(%filter, base_dn = %self.config.base_dn, "searching changed entries");

        let mut conn = self.connector.take()?;
        let result = drain_paged(|cookie| self.fetch_page(&mut conn, &filter, cookie), visit);
        match result {
            Ok(count) => {
                self.connector.put(conn);
                Ok(count)
            }
            Err(err) => {
                // Connection dropped; the session is not resumable.
                match &err {
                    LdapError::Referral(detail) => {
                        warn!(%filter, %detail, "search aborted by referral")
                    }
                    other => warn!(%filter, error = %other, "search failed"),
                }
                Err(err.into())
            }
        }
    }

    fn find_by_id(&self, id: &str) -> SyncResult<Option<DirectoryEntry>> {
        let filter = self.config.id_filter(id);
        trace!(%filter, "looking up entry by unique id");

        let mut conn = self.connector.take()?;
        let (entries, _res) = conn
            .search(
                &self.config.base_dn,
                Scope::Subtree,
                &filter,
                ALL_ATTRIBUTES.to_vec(),
            )
            .map_err(LdapError::from)?
            .success()
            .map_err(LdapError::from)?;
        self.connector.put(conn);

        let entries = entries
            .into_iter()
            .map(|entry| entry_from_search(SearchEntry::construct(entry)))
            .collect();
        Ok(first_match(id, entries))
    }

    fn create(&self, id: &str, attributes: Vec<(String, String)>) -> SyncResult<()> {
        let dn = self.config.dn_for_id(id);
        if self.config.read_only {
            info!(%dn, ?attributes, "read-only: would create entry");
            return Ok(());
        }

        let classes: HashSet<String> = self.config.object_classes.iter().cloned().collect();
        let mut ldap_attrs: Vec<(String, HashSet<String>)> =
            vec![("objectClass".to_string(), classes)];
        for (name, value) in attributes {
            // The unique id and object classes are set from configuration,
            // never from rules.
            if name.eq_ignore_ascii_case(&self.config.unique_id_attribute)
                || name.eq_ignore_ascii_case("objectClass")
            {
                continue;
            }
            ldap_attrs.push((name, HashSet::from([value])));
        }
        ldap_attrs.push((
            self.config.unique_id_attribute.clone(),
            HashSet::from([id.to_string()]),
        ));

        let mut conn = self.connector.take()?;
        conn.add(&dn, ldap_attrs)
            .map_err(LdapError::from)?
            .success()
            .map_err(LdapError::from)?;
        self.connector.put(conn);

        info!(%dn, "created entry");
        Ok(())
    }

    fn modify(&self, dn: &str, modifications: &[Modification]) -> SyncResult<()> {
        if self.config.read_only {
            info!(%dn, ?modifications, "read-only: would modify entry");
            return Ok(());
        }

        let mods: Vec<Mod<String>> = modifications.iter().map(to_ldap3_mod).collect();
        let mut conn = self.connector.take()?;
        conn.modify(dn, mods)
            .map_err(LdapError::from)?
            .success()
            .map_err(LdapError::from)?;
        self.connector.put(conn);

        info!(%dn, changes = modifications.len(), "modified entry");
        Ok(())
    }
}

fn to_ldap3_mod(modification: &Modification) -> Mod<String> {
    match modification {
        Modification::Add { attribute, value } => {
            Mod::Add(attribute.clone(), HashSet::from([value.clone()]))
        }
        Modification::Replace { attribute, values } => {
            Mod::Replace(attribute.clone(), values.iter().cloned().collect())
        }
        Modification::Remove { attribute } => Mod::Delete(attribute.clone(), HashSet::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn entry(dn: &str, uid: &str) -> DirectoryEntry {
        let mut attributes = AttributeMap::new();
        attributes.insert("uid", AttributeValue::Single(uid.to_string()));
        DirectoryEntry::new(dn.to_string(), attributes)
    }

    fn read_only_endpoint() -> LdapDirectory {
        // Unconnectable on purpose: read-only operations must return
        // before any network activity.
        LdapDirectory::new(EndpointConfig {
            url: "ldap://127.0.0.1:1".to_string(),
            principal: "cn=sync,dc=example,dc=com".to_string(),
            credential: "secret".to_string(),
            base_dn: "ou=people,dc=example,dc=com".to_string(),
            unique_id_attribute: "uid".to_string(),
            object_classes: vec!["person".to_string()],
            extra_filter: None,
            changed_attribute: "whenChanged".to_string(),
            page_size: 10,
            read_only: true,
            connect_timeout_secs: 1,
        })
        .unwrap()
    }

    #[test]
    fn drain_paged_walks_every_page() {
        let pages = vec![
            (0..10).map(|i| entry(&format!("uid=u{i},dc=x"), &format!("u{i}"))).collect::<Vec<_>>(),
            (10..20).map(|i| entry(&format!("uid=u{i},dc=x"), &format!("u{i}"))).collect(),
            (20..25).map(|i| entry(&format!("uid=u{i},dc=x"), &format!("u{i}"))).collect(),
        ];
        let mut fetches = 0usize;
        let mut seen_cookies = Vec::new();

        let mut visited = Vec::new();
        let count = drain_paged(
            |cookie| {
                seen_cookies.push(cookie);
                let page = pages[fetches].clone();
                fetches += 1;
                let next = if fetches < pages.len() {
                    Some(vec![fetches as u8])
                } else {
                    None
                };
                Ok((page, next))
            },
            &mut |entry| visited.push(entry.dn),
        )
        .unwrap();

        assert_eq!(count, 25);
        assert_eq!(visited.len(), 25);
        assert_eq!(fetches, 3);
        // First fetch carries the empty cookie, later ones the server's.
        assert_eq!(seen_cookies, vec![vec![], vec![1], vec![2]]);
        assert_eq!(visited[0], "uid=u0,dc=x");
        assert_eq!(visited[24], "uid=u24,dc=x");
    }

    #[test]
    fn drain_paged_stops_on_fetch_error() {
        let mut fetches = 0usize;
        let mut visited = 0usize;

        let result = drain_paged(
            |_cookie| {
                fetches += 1;
                if fetches == 1 {
                    Ok((vec![entry("uid=a,dc=x", "a")], Some(vec![1])))
                } else {
                    Err(LdapError::Referral("rc=10: elsewhere".to_string()))
                }
            },
            &mut |_entry| visited += 1,
        );

        assert!(matches!(result, Err(LdapError::Referral(_))));
        assert_eq!(visited, 1);
    }

    #[test]
    fn search_entries_become_attribute_maps() {
        let wire = SearchEntry {
            dn: "uid=jdoe,ou=people,dc=example,dc=com".to_string(),
            attrs: HashMap::from([
                ("uid".to_string(), vec!["jdoe".to_string()]),
                (
                    "objectClass".to_string(),
                    vec!["top".to_string(), "person".to_string()],
                ),
                ("description".to_string(), vec![]),
            ]),
            bin_attrs: HashMap::from([("jpegPhoto".to_string(), vec![vec![0xFF, 0xD8]])]),
        };

        let entry = entry_from_search(wire);
        assert_eq!(entry.single_value("UID"), Some("jdoe"));
        assert_eq!(
            entry.attributes.get("objectclass"),
            Some(&AttributeValue::Multi(vec![
                "top".to_string(),
                "person".to_string()
            ]))
        );
        // Empty and binary attributes are dropped.
        assert!(entry.attributes.get("description").is_none());
        assert!(entry.attributes.get("jpegPhoto").is_none());
    }

    #[test]
    fn first_match_takes_the_first_of_many() {
        let found = first_match(
            "jdoe",
            vec![entry("uid=jdoe,ou=a,dc=x", "jdoe"), entry("uid=jdoe,ou=b,dc=x", "jdoe")],
        );
        assert_eq!(found.unwrap().dn, "uid=jdoe,ou=a,dc=x");

        assert!(first_match("jdoe", Vec::new()).is_none());
    }

    #[test]
    fn read_only_create_never_touches_the_wire() {
        let endpoint = read_only_endpoint();
        endpoint
            .create(
                "jdoe",
                vec![("mail".to_string(), "jdoe@example.com".to_string())],
            )
            .unwrap();
    }

    #[test]
    fn read_only_modify_never_touches_the_wire() {
        let endpoint = read_only_endpoint();
        endpoint
            .modify(
                "uid=jdoe,ou=people,dc=example,dc=com",
                &[Modification::Remove {
                    attribute: "telephoneNumber".to_string(),
                }],
            )
            .unwrap();
    }

    #[test]
    fn modifications_map_to_wire_changes() {
        let add = to_ldap3_mod(&Modification::Add {
            attribute: "mail".to_string(),
            value: "jdoe@example.com".to_string(),
        });
        match add {
            Mod::Add(attribute, values) => {
                assert_eq!(attribute, "mail");
                assert_eq!(values, HashSet::from(["jdoe@example.com".to_string()]));
            }
            other => panic!("expected an add, got {other:?}"),
        }

        let remove = to_ldap3_mod(&Modification::Remove {
            attribute: "telephoneNumber".to_string(),
        });
        match remove {
            Mod::Delete(attribute, values) => {
                assert_eq!(attribute, "telephoneNumber");
                assert!(values.is_empty());
            }
            other => panic!("expected a delete, got {other:?}"),
        }
    }
}
