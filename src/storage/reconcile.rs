//! Insert/replace partitioning for bulk saves
//!
//! Backends without an upsert primitive reconcile a cache snapshot in two
//! queues:
//!
//! - **inserts**: identifiers the store does not know yet, written with the
//!   password only
//! - **replaces**: identifiers already stored, written as full documents
//!
//! Field names are shared by every document-shaped backend.

use std::collections::{HashMap, HashSet};

use crate::record::PlayerRecord;

pub const UUID_FIELD: &str = "UUID";
pub const PASSWORD_FIELD: &str = "password";
pub const IS_AUTHENTICATED_FIELD: &str = "is_authenticated";
pub const LAST_IP_FIELD: &str = "last_ip";
pub const VALID_UNTIL_FIELD: &str = "valid_until";
pub const LAST_KICKED_FIELD: &str = "last_kicked";

/// The write operations a bulk save has to issue
///
/// Entries are ordered by identifier so batches are deterministic.
#[derive(Debug, Default)]
pub struct SavePlan<'a> {
    pub inserts: Vec<(&'a str, &'a PlayerRecord)>,
    pub replaces: Vec<(&'a str, &'a PlayerRecord)>,
}

impl<'a> SavePlan<'a> {
    /// Split `snapshot` by whether each identifier is in `known`
    pub fn partition(
        snapshot: &'a HashMap<String, PlayerRecord>,
        known: &HashSet<String>,
    ) -> Self {
        let mut plan = SavePlan::default();

        for (uuid, record) in snapshot {
            if known.contains(uuid) {
                plan.replaces.push((uuid.as_str(), record));
            } else {
                plan.inserts.push((uuid.as_str(), record));
            }
        }

        plan.inserts.sort_unstable_by_key(|(uuid, _)| *uuid);
        plan.replaces.sort_unstable_by_key(|(uuid, _)| *uuid);
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.replaces.is_empty()
    }
}
