use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Granted authority (role string) carried by an account.
///
/// Authorities are opaque at this layer; the policy engine only compares them
/// by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Authority(Cow<'static, str>);

impl Authority {
    pub const USER: Authority = Authority(Cow::Borrowed("ROLE_USER"));
    pub const ADMIN: Authority = Authority(Cow::Borrowed("ROLE_ADMIN"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Authority {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
