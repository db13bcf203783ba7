//! Icon request items.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One icon request: an installed app the user wants themed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadItem {
    /// Stable identifier (Android package name)
    pub package_name: String,

    /// Display name, sent as both `localizedName` and `defaultName`
    pub name: String,

    /// Launcher activity component, e.g. `com.example.app/.MainActivity`
    pub activity: String,

    /// File name assigned by the archive collaborator, if it saved this item's icon
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl UploadItem {
    pub fn new(
        package_name: impl Into<String>,
        name: impl Into<String>,
        activity: impl Into<String>,
    ) -> Self {
        Self {
            package_name: package_name.into(),
            name: name.into(),
            activity: activity.into(),
            file_name: None,
        }
    }
}

/// Unique identifier for one `submit` call, used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SubmissionId(pub Uuid);

impl SubmissionId {
    pub fn new() -> Self {
        SubmissionId(Uuid::new_v4())
    }
}

impl Default for SubmissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Display only first 8 characters for readability in logs
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl From<Uuid> for SubmissionId {
    fn from(uuid: Uuid) -> Self {
        SubmissionId(uuid)
    }
}

impl std::ops::Deref for SubmissionId {
    type Target = Uuid;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
