//! Connection handling for one endpoint.
//!
//! A single bound connection is kept in a slot and reused across
//! operations. Callers take the connection, use it, and put it back only
//! after success; a failed operation drops the connection so the next
//! take binds a fresh one.

use std::time::Duration;

use ldap3::{LdapConn, LdapConnSettings};
use parking_lot::Mutex;
use tracing::debug;

use crate::config::EndpointConfig;
use crate::error::LdapError;

pub struct Connector {
    config: EndpointConfig,
    slot: Mutex<Option<LdapConn>>,
}

impl Connector {
    pub fn new(config: EndpointConfig) -> Self {
        Self {
            config,
            slot: Mutex::new(None),
        }
    }

    /// Hands out the pooled connection, opening and binding a new one if
    /// the slot is empty.
    pub fn take(&self) -> Result<LdapConn, LdapError> {
        if let Some(conn) = self.slot.lock().take() {
            return Ok(conn);
        }
        self.open()
    }

    /// Returns a connection to the slot after a successful operation.
    pub fn put(&self, conn: LdapConn) {
        *self.slot.lock() = Some(conn);
    }

    fn open(&self) -> Result<LdapConn, LdapError> {
        debug!(url = %self.config.url, principal = %self.config.principal, "opening connection");
        let settings = LdapConnSettings::new()
            .set_conn_timeout(Duration::from_secs(self.config.connect_timeout_secs));
        let mut conn = LdapConn::with_settings(settings, &self.config.url)
            .map_err(|err| LdapError::Connection(err.to_string()))?;
        conn.simple_bind(&self.config.principal, &self.config.credential)
            .map_err(|err| LdapError::Connection(err.to_string()))?
            .success()
            .map_err(|err| match LdapError::from(err) {
                LdapError::Bind(msg) => LdapError::Bind(msg),
                other => LdapError::Bind(other.to_string()),
            })?;
        Ok(conn)
    }
}
