use serde::Serialize;

use quizgate_core::AccountId;

use crate::Authority;

/// Authenticated caller, resolved from a verified access credential.
///
/// Built fresh per request from the account record, so authority changes take
/// effect without re-issuing credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    #[serde(rename = "uuid")]
    pub account_id: AccountId,
    pub username: String,
    pub authorities: Vec<Authority>,
}

impl Principal {
    pub fn new(account_id: AccountId, username: impl Into<String>, authorities: Vec<Authority>) -> Self {
        Self {
            account_id,
            username: username.into(),
            authorities,
        }
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| a.as_str() == authority)
    }

    pub fn is_admin(&self) -> bool {
        self.has_authority(Authority::ADMIN.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authority_checks_compare_by_name() {
        let p = Principal::new(AccountId::new(), "alice", vec![Authority::USER]);

        assert!(p.has_authority("ROLE_USER"));
        assert!(!p.is_admin());
    }

    #[test]
    fn serializes_account_id_as_uuid() {
        let id = AccountId::new();
        let p = Principal::new(id, "alice", vec![Authority::USER]);
        let json = serde_json::to_value(&p).unwrap();

        assert_eq!(json["uuid"], id.to_string());
        assert_eq!(json["authorities"][0], "ROLE_USER");
    }
}
