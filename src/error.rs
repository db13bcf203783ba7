//! Error types for the upload pipeline.

use thiserror::Error;

/// Result type alias using the volley error type.
pub type Result<T> = std::result::Result<T, VolleyError>;

/// Main error type for a submission.
///
/// The `Display` output of each variant is the exact diagnostic string handed back to callers of
/// [`crate::Submitter::submit`]; see [`VolleyError::into_report`].
#[derive(Error, Debug)]
pub enum VolleyError {
    /// Neither configuration source provided a bearer token
    #[error("Statistics service token not configured")]
    TokenNotConfigured,

    /// Neither configuration source provided a service endpoint
    #[error("Statistics service endpoint not configured")]
    EndpointNotConfigured,

    /// A metadata batch was answered with a non-2xx status
    #[error("Failed to upload app info: HTTP {status}")]
    MetadataStatus { status: u16 },

    /// A metadata batch could not be built or sent
    #[error("Failed to upload app info: {0}")]
    MetadataTransport(String),

    /// At least one icon upload failed; carries the rendered summary
    #[error("{0}")]
    UploadIncomplete(String),

    /// The submission was cancelled while admitting or joining icon uploads
    #[error("Icon upload interrupted")]
    Interrupted,

    /// The archive collaborator failed
    #[error("Failed to generate ZIP file: {0}")]
    Archive(String),

    /// Invalid configuration or collaborator wiring
    #[error("Validation error: {0}")]
    Validation(String),

    /// HTTP client error
    #[error("HTTP request failed: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// General error from anyhow
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VolleyError {
    /// Whether this error is one the pipeline anticipates and reports verbatim.
    ///
    /// Everything else escaped a local boundary and is reported as a generic request failure.
    pub fn is_expected(&self) -> bool {
        !matches!(
            self,
            VolleyError::HttpClient(_) | VolleyError::Serialization(_) | VolleyError::Other(_)
        )
    }

    /// The underlying cause without this crate's wrapping prefix.
    pub fn cause_message(&self) -> String {
        match self {
            VolleyError::HttpClient(e) => e.to_string(),
            VolleyError::Serialization(e) => e.to_string(),
            VolleyError::Other(e) => e.to_string(),
            other => other.to_string(),
        }
    }

    /// Render the error as the caller-facing diagnostic string.
    pub fn into_report(self) -> String {
        if self.is_expected() {
            self.to_string()
        } else {
            format!("Request failed: {}", self)
        }
    }
}

/// Extract a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}
