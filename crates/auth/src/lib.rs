//! `quizgate-auth` — pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: it signs and
//! verifies credentials, models accounts and sessions, and evaluates
//! permissions against a caller-supplied ACL provider.

pub mod account;
pub mod authorize;
pub mod claims;
pub mod codec;
pub mod error;
pub mod evaluator;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod session;

pub use account::{Account, AccountError};
pub use authorize::{AuthorizationExplanation, AuthzError, PolicyEngine, ResourcePredicate, Rule};
pub use claims::{CredentialClaims, CredentialKind};
pub use codec::{Credential, IssueError, SignedCredential, SigningKey};
pub use error::AuthError;
pub use evaluator::{AclProvider, PermissionEvaluator};
pub use permissions::{Mode, PermissionMask};
pub use principal::Principal;
pub use roles::Authority;
pub use session::{RefreshTokenHash, Session};
