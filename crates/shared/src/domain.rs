use serde::{Deserialize, Serialize};

/// Explicit session lifecycle for the single in-flight unit of work.
///
/// A new upload restarts the cycle from `Uploading`; there is never more
/// than one live session per client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Uploading,
    Uploaded,
    Processing,
    StagingFiles,
    Packaging,
    Ready,
    Downloading,
}

impl SessionPhase {
    /// Phases in which the packaged archive exists server-side.
    pub fn archive_available(self) -> bool {
        matches!(self, SessionPhase::Ready | SessionPhase::Downloading)
    }
}

/// What the remote service should do with the uploaded spreadsheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessTarget {
    /// Split into per-status/per-branch workbooks and package them as a ZIP.
    DownloadZip,
    /// Append the rows to the per-status Google Sheets instead.
    GoogleSheets,
}

impl ProcessTarget {
    pub fn as_wire_str(self) -> &'static str {
        match self {
            ProcessTarget::DownloadZip => "download_zip",
            ProcessTarget::GoogleSheets => "google_sheets",
        }
    }
}
