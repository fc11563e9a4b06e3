//! HTTP implementation of the upload [`Backend`](multiupload_session::Backend).
//!
//! Async client using `reqwest`: JSON endpoints for provisioning, status and
//! duplicate checks, and a streamed multipart POST for the file itself.

pub mod client;
pub mod endpoints;

pub use client::HttpBackend;
pub use endpoints::Endpoints;
