use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::processor::{StampContent, StampPosition};

/// Inputs to one normalization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOptions {
    pub registration_number: String,
    pub date_received: DateTime<Utc>,
    pub organization_name: String,
    pub department_name: Option<String>,
    pub sender_name: String,
    pub sender_email: String,
    pub tracking_url: Option<String>,
    #[serde(default)]
    pub stamp_position: StampPosition,
    #[serde(default)]
    pub stamp_all_pages: bool,
    #[serde(default = "default_upload")]
    pub upload_to_storage: bool,
}

fn default_upload() -> bool {
    true
}

impl ProcessOptions {
    pub fn stamp_content(&self) -> StampContent {
        StampContent {
            organization_name: self.organization_name.clone(),
            department_name: self.department_name.clone(),
            registration_number: self.registration_number.clone(),
            date_received: self.date_received,
            sender_name: self.sender_name.clone(),
            sender_email: Some(self.sender_email.clone()).filter(|e| !e.is_empty()),
            tracking_url: self.tracking_url.clone(),
        }
    }
}

/// Result of `process_and_merge`. Per-file failures land in `file_errors`;
/// `error` is set only when the run as a whole failed.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOutcome {
    pub success: bool,
    pub download_url: Option<String>,
    pub file_size: Option<u64>,
    pub page_count: Option<u32>,
    pub storage_path: Option<String>,
    pub source_file_count: usize,
    pub error: Option<String>,
    pub file_errors: Vec<String>,
    /// Merged bytes, kept only when the result was not uploaded.
    #[serde(skip)]
    pub pdf_bytes: Option<Vec<u8>>,
}

impl MergeOutcome {
    pub fn failure(error: impl Into<String>, file_errors: Vec<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            file_errors,
            ..Default::default()
        }
    }
}
