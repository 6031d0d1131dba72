//! View counters for a personal blog.
//!
//! - **`kv`**: the counter store trait, its in-memory and Redis-backed
//!   implementations, and the environment-driven factory choosing between them.
//! - **`protocol`**: RESP framing and the commands the Redis store sends.
//! - **`server`**: the axum router exposing `/api/view/...` counters.
//! - **`config`**: command line and environment configuration.

pub mod config;
pub mod kv;
pub mod protocol;
pub mod server;
