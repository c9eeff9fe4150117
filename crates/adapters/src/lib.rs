//! postflight adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - `store`: SQLite and in-memory stores for the publication ledger,
//!   attempt log, and strategies
//! - `linkedin`: LinkedIn posting adapter
//! - `x_api`: X (Twitter) posting adapter
//! - `stub`: deterministic in-process publisher for dry-run and tests
//! - `tokens`: access token providers

mod store_memory;
mod store_sqlite;
mod token_env;

pub mod linkedin;
pub mod stub;
pub mod x_api;

/// Re-exports for store adapters
pub mod store {
    pub use crate::store_memory::InMemoryStore;
    pub use crate::store_sqlite::SqliteStore;
}

/// Re-exports for token providers
pub mod tokens {
    pub use crate::token_env::{EnvTokenProvider, StaticTokenProvider};
}
