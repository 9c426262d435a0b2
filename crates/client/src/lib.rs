//! `quizgate-client` — outbound API client with single-flight credential refresh.
//!
//! - [`CredentialCache`] owns the current access/refresh pair for one device.
//! - [`RefreshCoordinator`] makes sure a burst of 401s costs exactly one refresh call.
//! - [`ApiClient`] ties both to `reqwest` and retries a rejected request once.

pub mod api_client;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod transport;

pub use api_client::ApiClient;
pub use cache::{CredentialCache, Credentials};
pub use config::ClientConfig;
pub use coordinator::RefreshCoordinator;
pub use error::ClientError;
pub use transport::{HttpRefreshTransport, RefreshTransport};
