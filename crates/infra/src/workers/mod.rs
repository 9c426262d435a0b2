//! Background workers.

pub mod session_janitor;

pub use session_janitor::{JanitorHandle, SessionJanitor};
