//! The directory capability consumed by the reconciliation engine.
//!
//! One trait, two configured instances: the engine is handed a source and
//! a destination client and is otherwise agnostic to which directory sits
//! on which side.

use chrono::{DateTime, Duration, Utc};

use crate::entry::DirectoryEntry;
use crate::error::SyncResult;

/// Lower time bound of a changed-entry search.
///
/// The incremental window is recomputed at the start of every poll cycle
/// as `now − seconds_since_changed`; a full pass carries no bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    since: Option<DateTime<Utc>>,
}

impl SyncWindow {
    /// A window with no lower bound: every matching entry is in scope.
    #[must_use]
    pub const fn full() -> Self {
        Self { since: None }
    }

    /// A window bounded below by `since`.
    #[must_use]
    pub const fn since(since: DateTime<Utc>) -> Self {
        Self { since: Some(since) }
    }

    /// The incremental window: entries changed within the last `seconds`.
    #[must_use]
    pub fn changed_within(now: DateTime<Utc>, seconds: u64) -> Self {
        Self::since(now - Duration::seconds(seconds as i64))
    }

    /// Lower bound, or `None` for a full pass.
    #[must_use]
    pub const fn lower_bound(&self) -> Option<DateTime<Utc>> {
        self.since
    }
}

/// A single attribute modification against a destination entry.
///
/// `Remove` deliberately carries no value: the whole attribute is removed.
/// Attaching the (empty) replacement value to a removal is not valid
/// against a real directory server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modification {
    /// Add a value to an attribute that currently has none.
    Add {
        /// Attribute name.
        attribute: String,
        /// Value to add.
        value: String,
    },

    /// Replace all current values of an attribute.
    Replace {
        /// Attribute name.
        attribute: String,
        /// Replacement values.
        values: Vec<String>,
    },

    /// Remove the attribute outright.
    Remove {
        /// Attribute name.
        attribute: String,
    },
}

/// Filtered search and entry create/modify against one directory endpoint.
///
/// Implementations own the wire transport, paging, read-only gating and
/// failure classification; the engine only sees [`DirectoryEntry`] values
/// and the [`SyncError`](crate::SyncError) taxonomy.
pub trait DirectoryClient: Send + Sync {
    /// Name of the attribute used as the cross-directory join key.
    fn unique_id_attribute(&self) -> &str;

    /// Ordered set of object classes every synchronized entry must carry.
    fn object_classes(&self) -> &[String];

    /// Streams every entry matching the configured filter and `window`,
    /// in server order, through `visit`. Returns the number of entries
    /// yielded.
    ///
    /// Each call opens a fresh paging session which is fully drained
    /// (success or abort) before the call returns; sessions are never
    /// interleaved. A referral or protocol failure aborts the remainder
    /// of the session and surfaces as an error.
    fn search_changed(
        &self,
        window: &SyncWindow,
        visit: &mut dyn FnMut(DirectoryEntry),
    ) -> SyncResult<u64>;

    /// Looks up the entry whose unique-id attribute equals `id`.
    ///
    /// When the directory returns more than one match the first is used
    /// deterministically and a warning is recorded.
    fn find_by_id(&self, id: &str) -> SyncResult<Option<DirectoryEntry>>;

    /// Creates a new entry for `id` carrying the required object classes,
    /// the given attributes, and the unique-id attribute set to `id`.
    ///
    /// A no-op that logs the intended entry when the endpoint is
    /// read-only.
    fn create(&self, id: &str, attributes: Vec<(String, String)>) -> SyncResult<()>;

    /// Applies an ordered list of modifications as one batched operation.
    ///
    /// A no-op that logs the intended modifications when the endpoint is
    /// read-only.
    fn modify(&self, dn: &str, modifications: &[Modification]) -> SyncResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn incremental_window_subtracts_change_age() {
        let now = Utc.with_ymd_and_hms(2024, 5, 17, 12, 0, 0).unwrap();
        let window = SyncWindow::changed_within(now, 3600);

        let bound = window.lower_bound().unwrap();
        assert_eq!(bound, Utc.with_ymd_and_hms(2024, 5, 17, 11, 0, 0).unwrap());

        // Entries older than the bound fall outside the window.
        let too_old = Utc.with_ymd_and_hms(2024, 5, 17, 10, 59, 59).unwrap();
        assert!(too_old < bound);
        let recent = Utc.with_ymd_and_hms(2024, 5, 17, 11, 30, 0).unwrap();
        assert!(recent >= bound);
    }

    #[test]
    fn full_window_has_no_bound() {
        assert_eq!(SyncWindow::full().lower_bound(), None);
    }
}
