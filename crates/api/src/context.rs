use quizgate_auth::Principal;
use quizgate_core::AccountId;

/// Principal context for a request (authenticated identity + authorities).
///
/// Inserted into request extensions by the auth middleware; present on every
/// protected route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn account_id(&self) -> AccountId {
        self.principal.account_id
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}
