//! Session configuration: cardinality, retry policy and message templates.
//!
//! Every field has a serde default matching the form widget's defaults, so
//! a partial config file (or none at all) is valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// How many slots the form accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cardinality {
    #[serde(default = "default_min_files")]
    pub min_files: usize,
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    /// Rows shown on first render (including seeded uploaded files).
    #[serde(default = "default_start_rows")]
    pub start_rows: usize,
}

fn default_min_files() -> usize {
    1
}

fn default_max_files() -> usize {
    5
}

fn default_start_rows() -> usize {
    1
}

impl Default for Cardinality {
    fn default() -> Self {
        Self {
            min_files: default_min_files(),
            max_files: default_max_files(),
            start_rows: default_start_rows(),
        }
    }
}

/// Fixed-delay retry policy shared by provisioning and verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Inconclusive status polls tolerated before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    30
}

fn default_retry_delay_ms() -> u64 {
    1000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl RetryPolicy {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// User-facing text. `{fileNumber}` and `{fileName}` are expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Messages {
    #[serde(default = "default_generic_error")]
    pub generic_error: String,
    #[serde(default = "default_still_transferring")]
    pub still_transferring: String,
    #[serde(default = "default_uploading")]
    pub uploading: String,
    #[serde(default = "default_uploaded")]
    pub uploaded: String,
    #[serde(default = "default_removed")]
    pub removed: String,
    #[serde(default = "default_error_prefix")]
    pub error_prefix: String,
}

fn default_generic_error() -> String {
    "File {fileNumber} could not be uploaded. Remove the file and try again.".into()
}

fn default_still_transferring() -> String {
    "Still transferring...".into()
}

fn default_uploading() -> String {
    "Uploading file {fileNumber} {fileName}".into()
}

fn default_uploaded() -> String {
    "File {fileNumber} {fileName} has been uploaded".into()
}

fn default_removed() -> String {
    "File {fileNumber} {fileName} has been removed".into()
}

fn default_error_prefix() -> String {
    "Error:".into()
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            generic_error: default_generic_error(),
            still_transferring: default_still_transferring(),
            uploading: default_uploading(),
            uploaded: default_uploaded(),
            removed: default_removed(),
            error_prefix: default_error_prefix(),
        }
    }
}

/// What a `DUPLICATE` verification status means.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Stored; a session-wide banner is shown.
    #[default]
    Accept,
    /// Treated like a backend rejection.
    Reject,
}

/// Full session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
    /// How long transient notifications stay visible.
    #[serde(default = "default_notice_ttl_ms")]
    pub notice_ttl_ms: u64,
    /// Provision a destination as soon as an empty row is added.
    #[serde(default = "default_true")]
    pub warm_destinations: bool,
    /// Where to send the user after a fatal provisioning failure.
    #[serde(default = "default_error_page_url")]
    pub error_page_url: String,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub messages: Messages,
}

fn default_notice_ttl_ms() -> u64 {
    3000
}

fn default_true() -> bool {
    true
}

fn default_error_page_url() -> String {
    "/service-unavailable".into()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::default(),
            notice_ttl_ms: default_notice_ttl_ms(),
            warm_destinations: default_true(),
            error_page_url: default_error_page_url(),
            cardinality: Cardinality::default(),
            retry: RetryPolicy::default(),
            messages: Messages::default(),
        }
    }
}

impl SessionConfig {
    pub fn notice_ttl(&self) -> Duration {
        Duration::from_millis(self.notice_ttl_ms)
    }

    /// Checks the cardinality bounds.
    pub fn validate(&self) -> Result<(), SessionError> {
        let c = &self.cardinality;
        if c.max_files == 0 {
            return Err(SessionError::InvalidConfig("max_files must be at least 1".into()));
        }
        if c.min_files > c.max_files {
            return Err(SessionError::InvalidConfig(format!(
                "min_files ({}) exceeds max_files ({})",
                c.min_files, c.max_files
            )));
        }
        if c.start_rows > c.max_files {
            return Err(SessionError::InvalidConfig(format!(
                "start_rows ({}) exceeds max_files ({})",
                c.start_rows, c.max_files
            )));
        }
        Ok(())
    }
}
