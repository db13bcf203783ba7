//! Per-item upload results.

use serde::{Deserialize, Serialize};

/// Result of uploading one item's icon.
///
/// Produced exactly once per item by the asset uploader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum UploadOutcome {
    Success,
    Failure(String),
}

impl UploadOutcome {
    pub fn failure(message: impl Into<String>) -> Self {
        UploadOutcome::Failure(message.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Success)
    }

    /// Label used for metrics and logs.
    pub fn status(&self) -> &'static str {
        match self {
            UploadOutcome::Success => "success",
            UploadOutcome::Failure(_) => "failure",
        }
    }
}
