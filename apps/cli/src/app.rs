//! Drives one upload session from the command line.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use multiupload_http::HttpBackend;
use multiupload_protocol::UploadedFile;
use multiupload_session::{
    ControllerHandle, SelectedFile, SessionError, SessionEvent, SlotId, SubmitOutcome,
    UploadController,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::Config;

/// Command-line options.
#[derive(Debug, Default)]
pub struct Options {
    pub files: Vec<PathBuf>,
    /// JSON list of files uploaded in an earlier run.
    pub manifest: Option<PathBuf>,
    /// Print every session event as a JSON line on stdout.
    pub json: bool,
}

/// Uploads the given files and submits once everything has settled.
pub async fn run(config: Config, options: Options) -> anyhow::Result<()> {
    let uploaded = match &options.manifest {
        Some(path) => load_manifest(path)?,
        None => Vec::new(),
    };

    let backend = Arc::new(HttpBackend::new(config.endpoints())?);
    let (handle, mut events, task) =
        UploadController::spawn(config.session.clone(), backend, uploaded).await?;

    let result = upload_all(&handle, &mut events, &options).await;

    handle.shutdown().await;
    let _ = task.await;

    report(result?, &config)
}

async fn upload_all(
    handle: &ControllerHandle,
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    options: &Options,
) -> anyhow::Result<SubmitOutcome> {
    for path in &options.files {
        match assign(handle, SelectedFile::from_path(path)).await {
            Ok(slot) => info!(slot = %slot, file = %path.display(), "file queued"),
            Err(SessionError::LimitReached(max)) => {
                warn!(max, file = %path.display(), "file limit reached, skipping");
            }
            Err(e) => return Err(e.into()),
        }
    }

    loop {
        while let Ok(event) = events.try_recv() {
            handle_event(&event, options.json)?;
        }
        if handle.snapshot().await?.is_idle() {
            return Ok(handle.submit().await?);
        }

        tokio::select! {
            event = events.recv() => match event {
                Some(event) => handle_event(&event, options.json)?,
                None => bail!("upload controller stopped"),
            },
            _ = tokio::signal::ctrl_c() => bail!("interrupted"),
        }
    }
}

/// Puts a file into the first empty row, adding one if needed.
async fn assign(handle: &ControllerHandle, file: SelectedFile) -> Result<SlotId, SessionError> {
    let slot = match handle.snapshot().await?.first_empty_slot() {
        Some(slot) => slot,
        None => handle.add_slot().await?,
    };
    handle.choose_file(slot, file).await?;
    Ok(slot)
}

fn handle_event(event: &SessionEvent, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
    }
    match event {
        SessionEvent::Redirect { url } => bail!("upload service unavailable, see {url}"),
        SessionEvent::StateChanged { slot, phase } => {
            info!(slot = %slot, phase = ?phase, "slot state changed")
        }
        SessionEvent::Progress {
            slot,
            percent,
            label,
        } => debug!(slot = %slot, percent, "{label}"),
        SessionEvent::ErrorRaised { slot, error } => {
            warn!(slot = %slot, "{}", error.message)
        }
        SessionEvent::Notice(notice) => info!("{}", notice.text),
        SessionEvent::DuplicateBanner {
            message: Some(message),
        } => warn!("{message}"),
        other => debug!(event = ?other, "session event"),
    }
    Ok(())
}

fn report(outcome: SubmitOutcome, config: &Config) -> anyhow::Result<()> {
    match outcome {
        SubmitOutcome::Proceed => {
            info!("all files uploaded");
            Ok(())
        }
        SubmitOutcome::BlockedByErrors { summary } => {
            for entry in &summary {
                error!(input = %entry.input_id, "{}", entry.message);
            }
            bail!(
                "{} {}: {} file(s) failed",
                config.session.messages.error_prefix,
                config.title,
                summary.len()
            )
        }
        SubmitOutcome::StillTransferring => bail!("uploads still in progress"),
        SubmitOutcome::Abandoned => bail!("upload session abandoned"),
    }
}

/// Reads previously uploaded file descriptors.
fn load_manifest(path: &Path) -> anyhow::Result<Vec<UploadedFile>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading manifest {}", path.display()))?;
    let files = serde_json::from_str(&content)
        .with_context(|| format!("parsing manifest {}", path.display()))?;
    Ok(files)
}
