//! Process-wide registry of resource access grants.
//!
//! The publish session writes grants for every resource it hands to the
//! remote service; the resource server reads them to decide whether a
//! request may be served. Both hold the same `Arc<GrantRegistry>`.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use themelink_protocol::AssetUri;
use themelink_protocol::constants::PERMISSION_READ;
use tracing::{debug, trace};

/// One grantee's access to one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantRecord {
    pub grantee: String,
    /// Permission bitmask (see [`PERMISSION_READ`]).
    pub permissions: u32,
    pub granted_at: DateTime<Utc>,
}

/// Thread-safe mapping from resource identifier to grant records.
///
/// Grants live until explicitly revoked; nothing expires them.
#[derive(Debug, Default)]
pub struct GrantRegistry {
    grants: RwLock<HashMap<AssetUri, Vec<GrantRecord>>>,
}

impl GrantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants `permissions` on `uri` to `grantee`.
    ///
    /// Returns `true` if any of the requested bits were not held before,
    /// which tells a caller whether a later rollback should revoke it.
    pub fn grant(&self, uri: &AssetUri, grantee: &str, permissions: u32) -> bool {
        let mut map = self.grants.write().unwrap_or_else(PoisonError::into_inner);
        let records = map.entry(uri.clone()).or_default();

        let added = match records.iter_mut().find(|r| r.grantee == grantee) {
            Some(record) => {
                let before = record.permissions;
                record.permissions |= permissions;
                record.permissions != before
            }
            None => {
                records.push(GrantRecord {
                    grantee: grantee.to_string(),
                    permissions,
                    granted_at: Utc::now(),
                });
                true
            }
        };

        trace!(%uri, grantee, permissions, added, "grant recorded");
        added
    }

    /// Grants read access, the only permission the plugin ever hands out.
    pub fn grant_read(&self, uri: &AssetUri, grantee: &str) -> bool {
        self.grant(uri, grantee, PERMISSION_READ)
    }

    /// Returns `true` if `grantee` holds every bit of `permission` on `uri`.
    pub fn check(&self, uri: &AssetUri, grantee: &str, permission: u32) -> bool {
        let map = self.grants.read().unwrap_or_else(PoisonError::into_inner);
        map.get(uri).is_some_and(|records| {
            records
                .iter()
                .any(|r| r.grantee == grantee && r.permissions & permission == permission)
        })
    }

    /// Returns `true` if anyone holds read access on `uri`.
    pub fn is_readable(&self, uri: &AssetUri) -> bool {
        let map = self.grants.read().unwrap_or_else(PoisonError::into_inner);
        map.get(uri).is_some_and(|records| {
            records
                .iter()
                .any(|r| r.permissions & PERMISSION_READ == PERMISSION_READ)
        })
    }

    /// Removes `grantee`'s grant on `uri`. Returns whether one existed.
    pub fn revoke(&self, uri: &AssetUri, grantee: &str) -> bool {
        let mut map = self.grants.write().unwrap_or_else(PoisonError::into_inner);
        let Some(records) = map.get_mut(uri) else {
            return false;
        };
        let before = records.len();
        records.retain(|r| r.grantee != grantee);
        let removed = records.len() != before;
        if records.is_empty() {
            map.remove(uri);
        }
        if removed {
            debug!(%uri, grantee, "grant revoked");
        }
        removed
    }

    /// Grant records held on `uri`.
    pub fn grants_for(&self, uri: &AssetUri) -> Vec<GrantRecord> {
        let map = self.grants.read().unwrap_or_else(PoisonError::into_inner);
        map.get(uri).cloned().unwrap_or_default()
    }

    /// Number of resources with at least one grant.
    pub fn len(&self) -> usize {
        self.grants
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
