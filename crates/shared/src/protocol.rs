use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::ProcessTarget;

/// Successful reply to the multipart upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub file_name: String,
    /// Data rows in the uploaded sheet, header excluded.
    pub rows: u64,
    /// Column names in sheet order.
    pub columns: Vec<String>,
    /// First rows echoed back for display; the controller never inspects them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preview: Vec<BTreeMap<String, Value>>,
}

/// Body of `POST /process-data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRequest {
    pub file_name: String,
    pub option: ProcessTarget,
}

/// Successful reply to processing with [`ProcessTarget::DownloadZip`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResponse {
    /// Opaque archive reference, later resolved via `GET /download-zip/{..}`.
    pub zip_filename: String,
    pub files_created: u32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub status_summary: BTreeMap<String, u64>,
    #[serde(default)]
    pub total_records: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Successful reply to processing with [`ProcessTarget::GoogleSheets`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsUpdateResponse {
    pub message: String,
    pub rows_updated: u64,
    /// status -> branch -> rows appended.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub summary: BTreeMap<String, BTreeMap<String, u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}
