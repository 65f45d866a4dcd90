//! crates/register_assistant_core/src/error.rs
//!
//! The error taxonomy of the extraction-to-display pipeline. The `Display`
//! strings are shown to the user verbatim.

/// Distinguishes provider failures the user can fix (quota, credentials)
/// from everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    Quota,
    Auth,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// No extraction credential is available. Blocks image extraction entirely.
    #[error("Extraction service is not configured: {0}")]
    Configuration(String),

    #[error("Unsupported file type: {0}. Please upload an image, JSON, or XLSX file.")]
    UnsupportedType(String),

    /// Malformed JSON or XLSX content.
    #[error("{0}")]
    Format(String),

    #[error("{}", service_message(.kind, .message))]
    Service {
        kind: ServiceErrorKind,
        message: String,
    },

    /// The provider answered, but not with a JSON array of objects.
    #[error("AI did not return a valid list of students: {0}")]
    ResponseFormat(String),

    #[error("Failed to read {what} file: {reason}")]
    Read { what: String, reason: String },

    #[error("No file selected for processing.")]
    NoFileStaged,

    #[error("No record found for {0}")]
    RecordNotFound(String),
}

fn service_message(kind: &ServiceErrorKind, message: &str) -> String {
    match kind {
        ServiceErrorKind::Quota | ServiceErrorKind::Auth => {
            format!("API Error: {message}. Please check your API key and quota.")
        }
        ServiceErrorKind::Other => format!("Failed to process image with AI: {message}"),
    }
}

impl PipelineError {
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }

    pub fn read(what: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Read {
            what: what.into(),
            reason: reason.to_string(),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_messages_distinguish_quota_from_generic() {
        let quota = PipelineError::Service {
            kind: ServiceErrorKind::Quota,
            message: "quota exceeded".into(),
        };
        let other = PipelineError::Service {
            kind: ServiceErrorKind::Other,
            message: "connection reset".into(),
        };
        assert!(quota.to_string().contains("check your API key and quota"));
        assert!(other.to_string().starts_with("Failed to process image with AI"));
    }
}
