//! Wire types for the multi-file upload handshake.
//!
//! Every backend endpoint the upload session talks to is described here:
//! provisioning, status polling, duplicate checks and the descriptors of
//! files uploaded in an earlier visit. Transport lives elsewhere.

pub mod messages;
pub mod template;
pub mod types;

// Re-export primary types for convenience.
pub use messages::{
    DuplicateNotice, ProvisionResponse, StatusResponse, UploadDetails, UploadRequest,
    UploadedFile,
};
pub use template::{expand_template, file_name_from_path};
pub use types::{FileStatus, Verdict};

/// Errors produced while decoding backend payloads.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("empty response body")]
    EmptyBody,
}

/// Decodes a JSON response body.
pub fn decode<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, ProtocolError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ProtocolError::EmptyBody);
    }
    Ok(serde_json::from_slice(body)?)
}
