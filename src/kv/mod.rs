//! Counter storage
//!
//! A [`KvStore`] addresses integer fields inside named resources, mirroring a
//! Redis hash per resource. Two implementations share the contract:
//!
//! - [`MemoryStore`]: process-local and transient, used outside production.
//! - [`RedisStore`]: durable, backed by a hosted Redis over RESP.
//!
//! A missing resource or field is a miss (`Ok(None)`), never an error.
//! `increment` upserts in both variants, treating a missing value as 0.

pub mod memory;
pub mod redis;

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use derive_more::Display;
use tracing::info;

use crate::config::ConfigError;
use crate::protocol::ProtocolError;

pub use memory::MemoryStore;
pub use redis::{RedisStore, RedisUrl};

/// Resource key of the site-wide counter
pub const SITE_KEY: &str = "site";

/// Field holding the view count inside every resource
pub const VIEWS_FIELD: &str = "views";

/// Errors surfaced by counter stores
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("backend unavailable: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("backend rejected {command}: {message}")]
    Backend {
        command: &'static str,
        message: String,
    },
    #[error("value of {key}.{field} is not a non-negative integer: {raw}")]
    InvalidValue {
        key: String,
        field: String,
        raw: String,
    },
    #[error("counter {key}.{field} overflowed")]
    Overflow { key: String, field: String },
    #[error("connection closed by backend")]
    ConnectionClosed,
    #[error("lock poisoned")]
    LockPoisoned,
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Scoped key/field storage for integer counters
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Current value of `field` under `key`, or `None` if either is unknown
    async fn get(&self, key: &str, field: &str) -> Result<Option<u64>, StoreError>;

    /// Overwrite `field` under `key`, creating the resource if needed
    async fn set(&self, key: &str, field: &str, value: u64) -> Result<(), StoreError>;

    /// Atomically add `by` and return the new value; a missing value counts as 0
    async fn increment(&self, key: &str, field: &str, by: u64) -> Result<u64, StoreError>;
}

/// Deployment environment, deciding which store backs the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum Environment {
    #[display("production")]
    Production,
    #[default]
    #[display("development")]
    Development,
}

impl FromStr for Environment {
    type Err = std::convert::Infallible;

    /// Only `production` selects the durable store; any other value is development.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("production") {
            Ok(Environment::Production)
        } else {
            Ok(Environment::Development)
        }
    }
}

/// Connection settings consumed by the durable store only
#[derive(Debug, Clone, Default)]
pub struct KvOptions {
    pub url: Option<String>,
    pub token: Option<String>,
}

/// Pick the counter store for `environment`.
///
/// Called once at startup. No I/O happens here: the durable store connects on
/// first use, so this fails only on missing or malformed connection settings.
pub fn select_store(
    environment: Environment,
    options: &KvOptions,
) -> Result<Arc<dyn KvStore>, StoreError> {
    match environment {
        Environment::Production => {
            let url = options.url.as_deref().ok_or(ConfigError::MissingKvUrl)?;
            let url: RedisUrl = url.parse()?;
            info!("Using durable counter store at {}", url.address());
            Ok(Arc::new(RedisStore::new(url, options.token.clone())))
        }
        Environment::Development => {
            info!("Using in-memory counter store; counts reset on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Behaviour every store must share, run against each implementation
#[cfg(test)]
pub(crate) async fn check_store_contract(store: &dyn KvStore) {
    let page = "contract/page";

    assert_eq!(store.get(page, VIEWS_FIELD).await.unwrap(), None);
    assert_eq!(store.get(page, "missing-field").await.unwrap(), None);

    store.set(page, VIEWS_FIELD, 5).await.unwrap();
    assert_eq!(store.get(page, VIEWS_FIELD).await.unwrap(), Some(5));

    for expected in 6..=10 {
        assert_eq!(store.increment(page, VIEWS_FIELD, 1).await.unwrap(), expected);
    }
    assert_eq!(store.increment(page, VIEWS_FIELD, 0).await.unwrap(), 10);

    let fresh = "contract/fresh";
    assert_eq!(store.increment(fresh, VIEWS_FIELD, 3).await.unwrap(), 3);
    assert_eq!(store.get(fresh, VIEWS_FIELD).await.unwrap(), Some(3));

    store.set(fresh, VIEWS_FIELD, 0).await.unwrap();
    assert_eq!(store.get(fresh, VIEWS_FIELD).await.unwrap(), Some(0));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_from_str() {
        assert_eq!("production".parse::<Environment>(), Ok(Environment::Production));
        assert_eq!(" Production ".parse::<Environment>(), Ok(Environment::Production));
        assert_eq!("development".parse::<Environment>(), Ok(Environment::Development));
        assert_eq!("preview".parse::<Environment>(), Ok(Environment::Development));
        assert_eq!("".parse::<Environment>(), Ok(Environment::Development));
        assert_eq!(Environment::default(), Environment::Development);
    }

    #[tokio::test]
    async fn test_select_development_store_is_seeded() {
        let store = select_store(Environment::Development, &KvOptions::default()).unwrap();
        assert_eq!(store.get(SITE_KEY, VIEWS_FIELD).await.unwrap(), Some(0));
    }

    #[test]
    fn test_select_production_requires_url() {
        let result = select_store(Environment::Production, &KvOptions::default());
        assert!(matches!(
            result,
            Err(StoreError::Config(ConfigError::MissingKvUrl))
        ));
    }

    #[test]
    fn test_select_production_rejects_bad_url() {
        let options = KvOptions {
            url: Some("http://example.com".to_string()),
            token: None,
        };
        assert!(matches!(
            select_store(Environment::Production, &options),
            Err(StoreError::Config(ConfigError::InvalidKvUrl { .. }))
        ));
    }

    #[test]
    fn test_select_production_does_not_connect() {
        // Nothing listens on this port; construction must still succeed.
        let options = KvOptions {
            url: Some("redis://127.0.0.1:1".to_string()),
            token: Some("token".to_string()),
        };
        assert!(select_store(Environment::Production, &options).is_ok());
    }
}
