//! Registry record types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Workflow status of a registry record.
///
/// Any status may be set from any other; the registry does not enforce
/// a transition graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    Nou,
    InLucru,
    Rezolvat,
    Respins,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Nou => "nou",
            RecordStatus::InLucru => "in_lucru",
            RecordStatus::Rezolvat => "rezolvat",
            RecordStatus::Respins => "respins",
        }
    }
}

impl FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nou" => Ok(RecordStatus::Nou),
            "in_lucru" => Ok(RecordStatus::InLucru),
            "rezolvat" => Ok(RecordStatus::Rezolvat),
            "respins" => Ok(RecordStatus::Respins),
            other => Err(format!("unknown status '{}'", other)),
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record priority; determines the resolution deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Urgent,
    #[default]
    Normal,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Urgent => "urgent",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }

    /// Days allowed for resolution, counted from receipt.
    pub fn deadline_days(&self) -> i64 {
        match self {
            Priority::Urgent => 1,
            Priority::Normal => 30,
            Priority::Low => 60,
        }
    }

    pub fn deadline_from(&self, received: DateTime<Utc>) -> DateTime<Utc> {
        received + Duration::days(self.deadline_days())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "urgent" => Ok(Priority::Urgent),
            "normal" => Ok(Priority::Normal),
            "low" => Ok(Priority::Low),
            other => Err(format!("unknown priority '{}'", other)),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored original attachment. `filename` is the name as received,
/// `storage_path` uses the sanitized name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRecord {
    pub filename: String,
    pub storage_path: String,
    pub download_url: String,
    pub content_type: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// The single stamped and merged PDF generated for a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfficialDocument {
    pub file_name: String,
    pub storage_path: String,
    pub download_url: String,
    pub page_count: u32,
    pub file_size: u64,
    pub source_file_count: usize,
    pub processed_at: DateTime<Utc>,
}

/// One registered inbound communication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryRecord {
    pub id: String,
    pub registration_number: String,
    pub message_id: Option<String>,
    pub sender_email: String,
    pub sender_name: Option<String>,
    pub recipient: Option<String>,
    pub subject: String,
    pub body: String,
    pub body_html: Option<String>,
    pub date_received: DateTime<Utc>,
    pub status: RecordStatus,
    pub priority: Priority,
    pub department_id: Option<String>,
    pub department_name: Option<String>,
    pub assigned_to_user_id: Option<String>,
    pub assigned_to_user_name: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub attachments: Vec<AttachmentRecord>,
    pub official_document: Option<OfficialDocument>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RegistryRecord {
    /// Name shown on the stamp: the display name when known, else the address.
    pub fn sender_display(&self) -> &str {
        self.sender_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.sender_email)
    }
}

/// Changes applied by a status update. Unset fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub department_id: Option<String>,
    pub department_name: Option<String>,
    pub assigned_to_user_id: Option<String>,
    pub assigned_to_user_name: Option<String>,
    pub priority: Option<Priority>,
}

impl Assignment {
    /// Copies the set fields onto `record`. A new priority recomputes the
    /// deadline from the receipt date.
    pub fn apply_to(self, record: &mut RegistryRecord) {
        if self.department_id.is_some() {
            record.department_id = self.department_id;
        }
        if self.department_name.is_some() {
            record.department_name = self.department_name;
        }
        if self.assigned_to_user_id.is_some() {
            record.assigned_to_user_id = self.assigned_to_user_id;
        }
        if self.assigned_to_user_name.is_some() {
            record.assigned_to_user_name = self.assigned_to_user_name;
        }
        if let Some(priority) = self.priority {
            record.priority = priority;
            record.deadline = Some(priority.deadline_from(record.date_received));
        }
    }
}
