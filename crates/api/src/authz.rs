//! API-side authorization guard for resource access.
//!
//! Handlers call this before touching a resource; the policy itself lives in
//! `quizgate-auth` and never sees HTTP types.

use quizgate_auth::{AuthzError, Mode, PolicyEngine, Rule};
use quizgate_core::ResourceId;

use crate::context::PrincipalContext;

/// Admin, or a user holding `mode` on the resource or on one of its parents.
pub fn authorize_resource(
    policy: &PolicyEngine,
    principal: &PrincipalContext,
    resource: ResourceId,
    mode: Mode,
) -> Result<(), AuthzError> {
    policy.authorize(&Rule::resource_access(mode), principal.principal(), resource)
}
