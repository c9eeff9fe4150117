//! postflight domain crate
//!
//! This crate contains the core domain logic following hexagonal architecture:
//! - `model`: Domain entities and value objects
//! - `ports`: Trait definitions for external dependencies (adapters)
//! - `usecases`: Application use cases / business logic
//! - `policy`: Request validation constraints

pub mod model;
pub mod policy;
pub mod ports;
pub mod usecases;

pub use model::*;
pub use policy::{ValidationError, validate_content};
pub use ports::*;
pub use usecases::EngineError;

use sha2::{Digest, Sha256};

/// Derive a deterministic idempotency key for a publish intent.
///
/// Key format: `publish:{strategy_id}:{PLATFORM}:{first 16 hex of
/// sha256(content)}`. Same inputs always produce the same key; changing
/// the content yields a different key, so an edited retry is a new
/// publish intent rather than a duplicate.
pub fn derive_idempotency_key(strategy_id: &str, platform: Platform, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let digest = format!("{:x}", hasher.finalize());

    format!(
        "publish:{}:{}:{}",
        strategy_id,
        platform.key_segment(),
        &digest[..16]
    )
}
