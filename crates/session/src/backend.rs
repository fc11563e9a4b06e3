//! Backend trait: the five endpoints the session depends on.
//!
//! The HTTP crate implements this on top of `reqwest`. Keeping it a trait
//! leaves the state machine independent of transport and testable with mocks.

use std::future::Future;
use std::pin::Pin;

use multiupload_protocol::{DuplicateNotice, ProvisionResponse, StatusResponse, UploadRequest};

use crate::error::BackendError;
use crate::slot::SelectedFile;

/// Boxed future returned by backend calls.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, BackendError>> + Send + 'a>>;

/// Callback invoked with `(bytes_sent, bytes_total)` during a transfer.
pub type ProgressCallback = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Upload backend.
pub trait Backend: Send + Sync {
    /// Requests a fresh upload destination.
    ///
    /// Must return [`BackendError::Fatal`] when the backend signals that the
    /// session cannot continue.
    fn provision(&self) -> BackendFuture<'_, ProvisionResponse>;

    /// Sends the file to a provisioned destination.
    ///
    /// Dropping the returned future aborts the transfer.
    fn transfer<'a>(
        &'a self,
        destination: &'a UploadRequest,
        file: &'a SelectedFile,
        progress: ProgressCallback,
    ) -> BackendFuture<'a, ()>;

    /// Asks whether an uploaded file has cleared processing.
    fn status<'a>(&'a self, reference: &'a str) -> BackendFuture<'a, StatusResponse>;

    /// Deletes a file server-side.
    fn remove<'a>(&'a self, reference: &'a str) -> BackendFuture<'a, ()>;

    /// Fetches the session-wide duplicate banner.
    fn duplicate_notice(&self) -> BackendFuture<'_, DuplicateNotice>;
}
