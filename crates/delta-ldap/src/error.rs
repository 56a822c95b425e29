//! LDAP failure classification.
//!
//! Result codes from the server are folded into a small taxonomy the
//! engine can act on: schema violations are permanent, referrals abort a
//! paging session, everything else is transient.

use delta_core::SyncError;
use thiserror::Error;

/// Failures raised by the LDAP client layer.
#[derive(Debug, Error)]
pub enum LdapError {
    /// Endpoint settings are unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Could not reach or talk to the server.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The server rejected the bind credentials.
    #[error("bind failed: {0}")]
    Bind(String),

    /// The server answered with a referral instead of a result.
    #[error("referral returned: {0}")]
    Referral(String),

    /// The write violated the destination schema.
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    /// An attribute value is already in use or missing for a modify.
    #[error("attribute conflict: {0}")]
    AttributeInUse(String),

    /// Any other protocol-level failure.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl LdapError {
    /// Classifies a non-success LDAP result code.
    #[must_use]
    pub fn from_result_code(rc: u32, text: &str) -> Self {
        let detail = format!("rc={rc}: {text}");
        match rc {
            10 => Self::Referral(detail),
            49 => Self::Bind(detail),
            // undefinedAttributeType, constraintViolation, invalidAttributeSyntax,
            // namingViolation, objectClassViolation, notAllowedOnRdn,
            // objectClassModsProhibited
            17 | 19 | 21 | 64 | 65 | 67 | 69 => Self::SchemaViolation(detail),
            // attributeOrValueExists, entryAlreadyExists
            20 | 68 => Self::AttributeInUse(detail),
            _ => Self::Protocol(detail),
        }
    }
}

impl From<ldap3::LdapError> for LdapError {
    fn from(err: ldap3::LdapError) -> Self {
        match err {
            ldap3::LdapError::LdapResult { result } => {
                Self::from_result_code(result.rc, &result.text)
            }
            ldap3::LdapError::Io { source } => Self::Connection(source.to_string()),
            other => Self::Protocol(other.to_string()),
        }
    }
}

impl From<LdapError> for SyncError {
    fn from(err: LdapError) -> Self {
        match err {
            LdapError::Configuration(msg) => SyncError::Configuration(msg),
            LdapError::Connection(msg) | LdapError::Bind(msg) => SyncError::Connection(msg),
            LdapError::Referral(msg) => SyncError::Referral(msg),
            LdapError::SchemaViolation(msg) => SyncError::SchemaViolation(msg),
            LdapError::AttributeInUse(msg) => SyncError::AttributeConflict(msg),
            LdapError::Protocol(msg) => SyncError::Protocol(msg),
        }
    }
}
