//! Backend URLs for one upload form.

use multiupload_protocol::expand_template;
use serde::{Deserialize, Serialize};

/// Placeholder substituted with a file reference in URL templates.
pub const FILE_REF_KEY: &str = "fileRef";

/// Endpoint configuration. Status and remove URLs are templates containing
/// `{fileRef}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    pub provision_url: String,
    pub status_url_template: String,
    pub remove_url_template: String,
    pub duplicate_check_url: String,
}

impl Endpoints {
    pub fn status_url(&self, reference: &str) -> String {
        expand_template(&self.status_url_template, &[(FILE_REF_KEY, reference)])
    }

    pub fn remove_url(&self, reference: &str) -> String {
        expand_template(&self.remove_url_template, &[(FILE_REF_KEY, reference)])
    }

    /// Builds the conventional endpoint layout under one base URL.
    pub fn under(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            provision_url: format!("{base}/upload"),
            status_url_template: format!("{base}/upload/{{fileRef}}/status"),
            remove_url_template: format!("{base}/upload/{{fileRef}}/remove"),
            duplicate_check_url: format!("{base}/upload/duplicates"),
        }
    }
}
