//! Infrastructure layer: storage adapters, the token service, configuration
//! and background workers.

pub mod acl;
pub mod account_store;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod session_store;
pub mod token_service;
pub mod workers;

pub use acl::{InMemoryAclProvider, Sid};
pub use account_store::{AccountService, AccountStore, InMemoryAccountStore, PostgresAccountStore, RegisterError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AuthConfig, ConfigError};
pub use error::StoreError;
pub use session_store::{InMemorySessionStore, PostgresSessionStore, SessionStore};
pub use token_service::{TokenError, TokenPair, TokenService};
