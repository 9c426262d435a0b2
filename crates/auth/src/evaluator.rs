//! Direct and transitive permission checks.

use std::collections::HashSet;
use std::sync::Arc;

use quizgate_core::ResourceId;

use crate::{Mode, PermissionMask, Principal};

/// ACL and parent-collection lookups, supplied by the domain layer.
///
/// Implementations must be read-only and side-effect free.
pub trait AclProvider: Send + Sync {
    /// Parent collections of `resource`, or `None` if the resource does not
    /// resolve. A resolvable resource without parents yields `Some(empty)`.
    fn parents_of(&self, resource: ResourceId) -> Option<HashSet<ResourceId>>;

    /// Modes `principal` holds directly on `resource`.
    fn permissions_of(&self, principal: &Principal, resource: ResourceId) -> PermissionMask;

    fn exists(&self, resource: ResourceId) -> bool {
        self.parents_of(resource).is_some()
    }
}

impl<A: AclProvider + ?Sized> AclProvider for Arc<A> {
    fn parents_of(&self, resource: ResourceId) -> Option<HashSet<ResourceId>> {
        (**self).parents_of(resource)
    }

    fn permissions_of(&self, principal: &Principal, resource: ResourceId) -> PermissionMask {
        (**self).permissions_of(principal, resource)
    }

    fn exists(&self, resource: ResourceId) -> bool {
        (**self).exists(resource)
    }
}

/// Evaluates permissions against an [`AclProvider`].
///
/// Nothing is cached: every call consults the provider.
#[derive(Clone)]
pub struct PermissionEvaluator {
    acl: Arc<dyn AclProvider>,
}

impl PermissionEvaluator {
    pub fn new(acl: Arc<dyn AclProvider>) -> Self {
        Self { acl }
    }

    pub fn acl(&self) -> &Arc<dyn AclProvider> {
        &self.acl
    }

    pub fn has_direct_permission(&self, principal: &Principal, resource: ResourceId, mode: Mode) -> bool {
        self.acl.permissions_of(principal, resource).grants(mode)
    }

    /// True iff `principal` holds `mode` on any parent collection of `resource`.
    ///
    /// An unresolvable resource yields `false`; callers report "not found"
    /// separately.
    pub fn has_transitive_permission(&self, principal: &Principal, resource: ResourceId, mode: Mode) -> bool {
        match self.acl.parents_of(resource) {
            Some(parents) => parents
                .into_iter()
                .any(|parent| self.has_direct_permission(principal, parent, mode)),
            None => false,
        }
    }

    pub fn resource_exists(&self, resource: ResourceId) -> bool {
        self.acl.exists(resource)
    }
}

impl core::fmt::Debug for PermissionEvaluator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PermissionEvaluator").finish_non_exhaustive()
    }
}
