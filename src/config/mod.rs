use std::net::SocketAddr;

use clap::Parser;

use crate::kv::{Environment, KvOptions};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("KV_URL must be set in production")]
    MissingKvUrl,
    #[error("invalid KV url '{url}': {reason}")]
    InvalidKvUrl { url: String, reason: String },
}

/// blog-views server configuration
///
/// Every option can also be supplied through the environment variable named
/// next to it.
#[derive(Debug, Clone, Parser)]
#[command(name = "blog-views", version, about = "Page view counters for the blog")]
pub struct Config {
    /// Deployment environment; only `production` uses the durable store
    #[arg(long = "env", env = "APP_ENV", default_value = "development")]
    pub environment: Environment,

    /// Redis connection url for the durable store
    #[arg(long, env = "KV_URL")]
    pub kv_url: Option<String>,

    /// Access token sent with AUTH when connecting to the durable store
    #[arg(long, env = "KV_TOKEN", hide_env_values = true)]
    pub kv_token: Option<String>,

    /// HTTP listening address
    #[arg(long = "listen", env = "LISTEN_ADDR", default_value = "0.0.0.0:3000")]
    pub listen_addr: SocketAddr,

    /// Log filter, used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Settings handed to the store factory
    pub fn kv_options(&self) -> KvOptions {
        KvOptions {
            url: self.kv_url.clone(),
            token: self.kv_token.clone(),
        }
    }
}
