//! `reqwest` backend.

use futures_util::StreamExt;
use multiupload_protocol::{DuplicateNotice, ProvisionResponse, StatusResponse, UploadRequest};
use multiupload_session::{Backend, BackendError, BackendFuture, ProgressCallback, SelectedFile};
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use tokio_util::io::ReaderStream;
use tracing::{debug, trace};

use crate::endpoints::Endpoints;

/// Maps a `reqwest` failure that produced no usable response.
fn transport(e: reqwest::Error) -> BackendError {
    BackendError::Transport(e.to_string())
}

/// Upload backend speaking HTTP.
pub struct HttpBackend {
    http: reqwest::Client,
    endpoints: Endpoints,
}

impl HttpBackend {
    pub fn new(endpoints: Endpoints) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder().build().map_err(transport)?;
        Ok(Self { http, endpoints })
    }

    /// Returns the body of a successful response.
    async fn read_success(resp: reqwest::Response) -> Result<Vec<u8>, BackendError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.bytes().await.map_err(transport)?.to_vec())
    }

    async fn do_provision(&self) -> Result<ProvisionResponse, BackendError> {
        let resp = self
            .http
            .post(&self.endpoints.provision_url)
            .send()
            .await
            .map_err(transport)?;
        if resp.status() == StatusCode::INTERNAL_SERVER_ERROR {
            return Err(BackendError::Fatal {
                status: resp.status().as_u16(),
            });
        }
        let body = Self::read_success(resp).await?;
        Ok(multiupload_protocol::decode(&body)?)
    }

    async fn do_transfer(
        &self,
        destination: &UploadRequest,
        file: &SelectedFile,
        progress: ProgressCallback,
    ) -> Result<(), BackendError> {
        let handle = tokio::fs::File::open(&file.path).await?;
        let total = handle.metadata().await?.len();

        let mut sent = 0u64;
        let stream = ReaderStream::new(handle).map(move |chunk| {
            if let Ok(bytes) = &chunk {
                sent += bytes.len() as u64;
                progress(sent, total);
            }
            chunk
        });
        let part = Part::stream_with_length(reqwest::Body::wrap_stream(stream), total)
            .file_name(file.name.clone());

        let mut form = Form::new();
        for (key, value) in &destination.fields {
            form = form.text(key.clone(), value.clone());
        }
        let form = form.part("file", part);

        debug!(href = %destination.href, file = %file.name, bytes = total, "posting file");
        let resp = self
            .http
            .post(&destination.href)
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;
        Self::read_success(resp).await?;
        Ok(())
    }

    async fn do_status(&self, reference: &str) -> Result<StatusResponse, BackendError> {
        let url = self.endpoints.status_url(reference);
        trace!(url = %url, "polling status");
        let resp = self.http.get(&url).send().await.map_err(transport)?;
        let body = Self::read_success(resp).await?;
        Ok(multiupload_protocol::decode(&body)?)
    }

    async fn do_remove(&self, reference: &str) -> Result<(), BackendError> {
        let url = self.endpoints.remove_url(reference);
        debug!(url = %url, "removing file");
        let resp = self.http.post(&url).send().await.map_err(transport)?;
        Self::read_success(resp).await?;
        Ok(())
    }

    async fn do_duplicate_notice(&self) -> Result<DuplicateNotice, BackendError> {
        let resp = self
            .http
            .get(&self.endpoints.duplicate_check_url)
            .send()
            .await
            .map_err(transport)?;
        let body = Self::read_success(resp).await?;
        Ok(multiupload_protocol::decode(&body)?)
    }
}

impl Backend for HttpBackend {
    fn provision(&self) -> BackendFuture<'_, ProvisionResponse> {
        Box::pin(self.do_provision())
    }

    fn transfer<'a>(
        &'a self,
        destination: &'a UploadRequest,
        file: &'a SelectedFile,
        progress: ProgressCallback,
    ) -> BackendFuture<'a, ()> {
        Box::pin(self.do_transfer(destination, file, progress))
    }

    fn status<'a>(&'a self, reference: &'a str) -> BackendFuture<'a, StatusResponse> {
        Box::pin(self.do_status(reference))
    }

    fn remove<'a>(&'a self, reference: &'a str) -> BackendFuture<'a, ()> {
        Box::pin(self.do_remove(reference))
    }

    fn duplicate_notice(&self) -> BackendFuture<'_, DuplicateNotice> {
        Box::pin(self.do_duplicate_notice())
    }
}
