use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::FileStatus;

// ---------------------------------------------------------------------------
// Provisioning
// ---------------------------------------------------------------------------

/// Response of the provision endpoint: where and how to send the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionResponse {
    /// Server-assigned identity of the file.
    pub reference: String,
    pub upload_request: UploadRequest,
}

/// Upload destination handed out by the provision endpoint.
///
/// `fields` are opaque form fields (policy, signature, key...) that must be
/// sent ahead of the file part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRequest {
    pub href: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Response of the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: FileStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Response of the duplicate-check endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DuplicateNotice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DuplicateNotice {
    /// Returns the banner text, or `None` when the banner should be hidden.
    pub fn banner(&self) -> Option<&str> {
        self.message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Initialization input
// ---------------------------------------------------------------------------

/// A file uploaded during an earlier visit to the form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub file_status: FileStatus,
    pub reference: String,
    #[serde(default)]
    pub upload_details: UploadDetails,
}

/// Details recorded by the backend for an uploaded file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadDetails {
    #[serde(default)]
    pub file_name: String,
}

impl UploadedFile {
    /// Returns `true` when the file is stored and should be shown as uploaded.
    pub fn is_settled(&self) -> bool {
        self.file_status.is_settled()
    }
}
