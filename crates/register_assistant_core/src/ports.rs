//! crates/register_assistant_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! The core never depends on a concrete AI provider, only on these traits.

use async_trait::async_trait;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait ExtractionService: Send + Sync {
    /// Sends one image and an instruction prompt to the vision model and returns
    /// the raw response text (expected, but not guaranteed, to be a JSON array).
    async fn extract_records(&self, image: &[u8], mime_type: &str, prompt: &str)
        -> PortResult<String>;
}
