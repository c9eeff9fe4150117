//! Request validation policy applied at the boundary, before the engine

use crate::model::Platform;

/// Validation errors rejected before the engine is invoked
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Content must not be empty")]
    EmptyContent,
    #[error("Content too long for {platform}: {len} > {max}")]
    ContentTooLong {
        platform: Platform,
        len: usize,
        max: usize,
    },
}

/// Validate publishable content against platform constraints.
///
/// Length is counted in characters, not bytes, because that is what the
/// platforms themselves count.
pub fn validate_content(platform: Platform, content: &str) -> Result<(), ValidationError> {
    if content.trim().is_empty() {
        return Err(ValidationError::EmptyContent);
    }

    let len = content.chars().count();
    let max = platform.max_chars();
    if len > max {
        return Err(ValidationError::ContentTooLong { platform, len, max });
    }

    Ok(())
}
