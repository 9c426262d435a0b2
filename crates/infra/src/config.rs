//! Server configuration loaded from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

pub const MIN_SECRET_LEN: usize = 32;

/// Upper bound for every configured duration (one year). Expiry timestamps
/// are computed as `now + ttl` and must stay representable.
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 3600;

const DEV_SECRET: &str = "quizgate-dev-secret-do-not-use-in-production";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Runtime configuration for the auth server.
#[derive(Clone)]
pub struct AuthConfig {
    pub secret: Vec<u8>,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub bind: SocketAddr,
    /// Postgres URL; only used when `use_persistent_stores` is set.
    pub database_url: Option<String>,
    pub use_persistent_stores: bool,
    pub janitor_interval: Duration,
}

impl core::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("bind", &self.bind)
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("use_persistent_stores", &self.use_persistent_stores)
            .field("janitor_interval", &self.janitor_interval)
            .finish()
    }
}

impl AuthConfig {
    /// Defaults suitable for tests: fixed secret, in-memory stores.
    pub fn for_tests() -> Self {
        Self {
            secret: DEV_SECRET.as_bytes().to_vec(),
            access_ttl: Duration::from_secs(300),
            refresh_ttl: Duration::from_secs(259_200),
            bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            database_url: None,
            use_persistent_stores: false,
            janitor_interval: Duration::from_secs(3600),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let allow_dev_secret = parse_bool(&lookup, "QUIZGATE_ALLOW_DEV_SECRET")?
            .unwrap_or(cfg!(debug_assertions));

        let secret = match lookup("QUIZGATE_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) if secret.len() >= MIN_SECRET_LEN => secret.into_bytes(),
            Some(_) => {
                return Err(ConfigError::Invalid {
                    var: "QUIZGATE_SECRET",
                    reason: format!("must be at least {MIN_SECRET_LEN} bytes"),
                });
            }
            None if allow_dev_secret => {
                tracing::warn!("QUIZGATE_SECRET not set; using insecure development secret");
                DEV_SECRET.as_bytes().to_vec()
            }
            None => return Err(ConfigError::Missing("QUIZGATE_SECRET")),
        };

        let access_ttl = parse_secs(&lookup, "QUIZGATE_ACCESS_TTL_SECS", 300)?;
        let refresh_ttl = parse_secs(&lookup, "QUIZGATE_REFRESH_TTL_SECS", 259_200)?;
        if refresh_ttl <= access_ttl {
            return Err(ConfigError::Invalid {
                var: "QUIZGATE_REFRESH_TTL_SECS",
                reason: "must be longer than the access TTL".to_string(),
            });
        }

        let bind = match lookup("QUIZGATE_BIND") {
            Some(raw) => raw.parse().map_err(|e| ConfigError::Invalid {
                var: "QUIZGATE_BIND",
                reason: format!("{e}"),
            })?,
            None => SocketAddr::from(([0, 0, 0, 0], 8080)),
        };

        let database_url = lookup("DATABASE_URL").filter(|s| !s.is_empty());
        let use_persistent_stores = parse_bool(&lookup, "USE_PERSISTENT_STORES")?.unwrap_or(false);
        if use_persistent_stores && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        Ok(Self {
            secret,
            access_ttl,
            refresh_ttl,
            bind,
            database_url,
            use_persistent_stores,
            janitor_interval: parse_secs(&lookup, "QUIZGATE_JANITOR_INTERVAL_SECS", 3600)?,
        })
    }
}

fn parse_bool(lookup: &impl Fn(&str) -> Option<String>, var: &'static str) -> Result<Option<bool>, ConfigError> {
    match lookup(var).as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => Ok(Some(true)),
        Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => Ok(Some(false)),
        Some(v) => Err(ConfigError::Invalid {
            var,
            reason: format!("expected true/false, got '{v}'"),
        }),
    }
}

fn parse_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u64,
) -> Result<Duration, ConfigError> {
    let secs = match lookup(var) {
        Some(raw) => raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        })?,
        None => default,
    };
    if secs == 0 {
        return Err(ConfigError::Invalid {
            var,
            reason: "must be greater than zero".to_string(),
        });
    }
    if secs > MAX_DURATION_SECS {
        return Err(ConfigError::Invalid {
            var,
            reason: format!("must be at most {MAX_DURATION_SECS} seconds"),
        });
    }
    Ok(Duration::from_secs(secs))
}
