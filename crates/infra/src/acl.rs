//! In-memory ACL provider: resource ownership, per-principal and per-group
//! entries, and parent collections.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use quizgate_auth::{AclProvider, Mode, PermissionMask, Principal};
use quizgate_core::{AccountId, ResourceId};

/// Security identity an ACL entry is granted to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Sid {
    Account(AccountId),
    Group(String),
}

#[derive(Debug, Default, Clone)]
struct ResourceNode {
    owner: Option<AccountId>,
    parents: HashSet<ResourceId>,
}

#[derive(Debug, Default)]
struct AclState {
    resources: HashMap<ResourceId, ResourceNode>,
    entries: HashMap<(ResourceId, Sid), PermissionMask>,
    groups: HashMap<AccountId, HashSet<String>>,
}

/// Thread-safe in-memory [`AclProvider`] for tests/dev.
///
/// The owner of a resource holds every mode on it. A principal holds the union
/// of its own entries and those of every group it belongs to.
#[derive(Debug, Default)]
pub struct InMemoryAclProvider {
    state: RwLock<AclState>,
}

impl InMemoryAclProvider {
    pub fn new() -> Self {
        Self::default()
    }

    // Mutations are single map operations, so a poisoned lock still guards
    // consistent state.
    fn read(&self) -> RwLockReadGuard<'_, AclState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, AclState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a resource (or replace its owner and parents).
    pub fn add_resource(&self, id: ResourceId, owner: Option<AccountId>, parents: impl IntoIterator<Item = ResourceId>) {
        let mut state = self.write();
        state.resources.insert(
            id,
            ResourceNode {
                owner,
                parents: parents.into_iter().collect(),
            },
        );
    }

    /// Remove a resource and every entry on it.
    pub fn remove_resource(&self, id: ResourceId) {
        let mut state = self.write();
        state.resources.remove(&id);
        state.entries.retain(|(r, _), _| *r != id);
    }

    /// Add `modes` to whatever `sid` already holds on `resource`.
    pub fn grant(&self, resource: ResourceId, sid: Sid, modes: &[Mode]) {
        let mut state = self.write();
        let entry = state.entries.entry((resource, sid)).or_default();
        *entry = entry.union(PermissionMask::of(modes));
    }

    pub fn revoke(&self, resource: ResourceId, sid: &Sid) {
        let mut state = self.write();
        state.entries.remove(&(resource, sid.clone()));
    }

    pub fn add_to_group(&self, account: AccountId, group: impl Into<String>) {
        let mut state = self.write();
        state.groups.entry(account).or_default().insert(group.into());
    }
}

impl AclProvider for InMemoryAclProvider {
    fn parents_of(&self, resource: ResourceId) -> Option<HashSet<ResourceId>> {
        self.read().resources.get(&resource).map(|node| node.parents.clone())
    }

    fn permissions_of(&self, principal: &Principal, resource: ResourceId) -> PermissionMask {
        let state = self.read();

        if let Some(node) = state.resources.get(&resource) {
            if node.owner == Some(principal.account_id) {
                return PermissionMask::ALL;
            }
        }

        let own = state
            .entries
            .get(&(resource, Sid::Account(principal.account_id)))
            .copied()
            .unwrap_or_default();

        state
            .groups
            .get(&principal.account_id)
            .into_iter()
            .flatten()
            .filter_map(|g| state.entries.get(&(resource, Sid::Group(g.clone()))))
            .fold(own, |acc, mask| acc.union(*mask))
    }

    fn exists(&self, resource: ResourceId) -> bool {
        self.read().resources.contains_key(&resource)
    }
}
