//! Async driver for a [`Session`].
//!
//! The controller task owns the session. User actions arrive as commands,
//! backend results as completions; every job the session queues is run on
//! its own task and reports back through the completion channel.

use std::future::Future;
use std::sync::Arc;

use multiupload_protocol::UploadedFile;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{Backend, ProgressCallback};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::events::SessionEvent;
use crate::session::{Completion, Job, Session, SessionSnapshot, SubmitOutcome};
use crate::slot::{SelectedFile, SlotId};

const COMMAND_BUFFER: usize = 64;

/// Requests sent to the controller task.
#[derive(Debug)]
pub enum Command {
    ChooseFile {
        slot: SlotId,
        file: SelectedFile,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    AddSlot {
        reply: oneshot::Sender<Result<SlotId, SessionError>>,
    },
    Remove {
        slot: SlotId,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Submit {
        reply: oneshot::Sender<SubmitOutcome>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Shutdown,
}

/// Cloneable handle to a running controller.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<Command>,
}

impl ControllerHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| SessionError::ControllerStopped)?;
        rx.await.map_err(|_| SessionError::ControllerStopped)
    }

    pub async fn choose_file(&self, slot: SlotId, file: SelectedFile) -> Result<(), SessionError> {
        self.request(|reply| Command::ChooseFile { slot, file, reply })
            .await?
    }

    pub async fn add_slot(&self) -> Result<SlotId, SessionError> {
        self.request(|reply| Command::AddSlot { reply }).await?
    }

    pub async fn remove(&self, slot: SlotId) -> Result<(), SessionError> {
        self.request(|reply| Command::Remove { slot, reply }).await?
    }

    pub async fn submit(&self) -> Result<SubmitOutcome, SessionError> {
        self.request(|reply| Command::Submit { reply }).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Stops the controller and aborts in-flight work.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown).await;
    }
}

/// Owns a session and runs its jobs against a backend.
pub struct UploadController {
    session: Session,
    backend: Arc<dyn Backend>,
    commands: mpsc::Receiver<Command>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    cancel: CancellationToken,
}

impl UploadController {
    /// Starts a controller task.
    ///
    /// Previously uploaded files that never settled are deleted first; the
    /// settled ones seed the list. Returns the command handle, the UI event
    /// stream and the task handle.
    pub async fn spawn(
        config: SessionConfig,
        backend: Arc<dyn Backend>,
        uploaded: Vec<UploadedFile>,
    ) -> Result<
        (
            ControllerHandle,
            mpsc::UnboundedReceiver<SessionEvent>,
            JoinHandle<()>,
        ),
        SessionError,
    > {
        config.validate()?;

        for reference in Session::stale_references(&uploaded) {
            match backend.remove(&reference).await {
                Ok(()) => info!(reference = %reference, "purged unfinished upload"),
                Err(e) => warn!(reference = %reference, error = %e, "failed to purge unfinished upload"),
            }
        }

        let session = Session::new(config, &uploaded)?;
        let (tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let controller = Self {
            session,
            backend,
            commands,
            completions_tx,
            completions_rx,
            events_tx,
            cancel: CancellationToken::new(),
        };
        let task = tokio::spawn(controller.run());

        Ok((ControllerHandle { tx }, events_rx, task))
    }

    async fn run(mut self) {
        self.flush();
        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Shutdown) | None => break,
                    Some(cmd) => self.handle(cmd),
                },
                Some(completion) = self.completions_rx.recv() => {
                    self.session.complete(completion);
                }
            }
            self.flush();
        }

        debug!("upload controller stopping");
        self.session.shutdown();
        self.cancel.cancel();
        self.flush();
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::ChooseFile { slot, file, reply } => {
                let _ = reply.send(self.session.choose_file(slot, file));
            }
            Command::AddSlot { reply } => {
                let _ = reply.send(self.session.add_slot());
            }
            Command::Remove { slot, reply } => {
                let _ = reply.send(self.session.remove(slot));
            }
            Command::Submit { reply } => {
                let _ = reply.send(self.session.submit());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.session.snapshot());
            }
            Command::Shutdown => {}
        }
    }

    /// Runs queued jobs and forwards queued events.
    fn flush(&mut self) {
        for job in self.session.take_jobs() {
            if !self.cancel.is_cancelled() {
                self.dispatch(job);
            }
        }
        for event in self.session.take_events() {
            let _ = self.events_tx.send(event);
        }
    }

    fn dispatch(&self, job: Job) {
        let backend = Arc::clone(&self.backend);
        match job {
            Job::Provision { slot, delay } => self.spawn_job(async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                let result = backend.provision().await;
                Some(Completion::Provisioned { slot, result })
            }),
            Job::Transfer {
                slot,
                destination,
                file,
                cancel,
            } => {
                let progress_tx = self.completions_tx.clone();
                let progress: ProgressCallback = Box::new(move |sent, total| {
                    let _ = progress_tx.send(Completion::Progress { slot, sent, total });
                });
                self.spawn_job(async move {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            debug!(slot = %slot, "transfer aborted");
                            None
                        }
                        result = backend.transfer(&destination, &file, progress) => {
                            Some(Completion::Transferred { slot, result })
                        }
                    }
                });
            }
            Job::Poll {
                slot,
                reference,
                delay,
            } => self.spawn_job(async move {
                tokio::time::sleep(delay).await;
                let result = backend.status(&reference).await;
                Some(Completion::Polled {
                    slot,
                    reference,
                    result,
                })
            }),
            Job::Remove { slot, reference } => self.spawn_job(async move {
                let result = backend.remove(&reference).await;
                Some(Completion::Removed { slot, result })
            }),
            Job::CheckDuplicates => self.spawn_job(async move {
                let result = backend.duplicate_notice().await;
                Some(Completion::DuplicatesChecked { result })
            }),
            Job::DismissNotice { id, after } => self.spawn_job(async move {
                tokio::time::sleep(after).await;
                Some(Completion::NoticeExpired { id })
            }),
        }
    }

    /// Spawns a job that reports back unless the controller stops first.
    fn spawn_job<F>(&self, job: F)
    where
        F: Future<Output = Option<Completion>> + Send + 'static,
    {
        let tx = self.completions_tx.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                completion = job => {
                    if let Some(completion) = completion {
                        let _ = tx.send(completion);
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
    use std::time::Duration;

    use multiupload_protocol::{
        DuplicateNotice, FileStatus, ProvisionResponse, StatusResponse, UploadDetails,
        UploadRequest,
    };

    use super::*;
    use crate::backend::BackendFuture;
    use crate::error::BackendError;
    use crate::slot::SlotPhase;

    #[derive(Default)]
    struct MockBackend {
        provisioned: AtomicU32,
        transfers: AtomicUsize,
        transfer_delay: Option<Duration>,
        fatal: bool,
        statuses: Mutex<VecDeque<FileStatus>>,
        removed: Mutex<Vec<String>>,
        banner: Option<String>,
        served_duplicate: AtomicBool,
    }

    impl Backend for MockBackend {
        fn provision(&self) -> BackendFuture<'_, ProvisionResponse> {
            Box::pin(async move {
                if self.fatal {
                    return Err(BackendError::Fatal { status: 500 });
                }
                let n = self.provisioned.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(ProvisionResponse {
                    reference: format!("ref-{n}"),
                    upload_request: UploadRequest {
                        href: "uploadUrl".into(),
                        fields: BTreeMap::new(),
                    },
                })
            })
        }

        fn transfer<'a>(
            &'a self,
            _destination: &'a UploadRequest,
            _file: &'a SelectedFile,
            progress: ProgressCallback,
        ) -> BackendFuture<'a, ()> {
            Box::pin(async move {
                progress(50, 100);
                if let Some(delay) = self.transfer_delay {
                    tokio::time::sleep(delay).await;
                }
                progress(100, 100);
                self.transfers.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }

        fn status<'a>(&'a self, _reference: &'a str) -> BackendFuture<'a, StatusResponse> {
            Box::pin(async move {
                let status = self
                    .statuses
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or(FileStatus::Ready);
                if status == FileStatus::Duplicate {
                    self.served_duplicate.store(true, Ordering::SeqCst);
                }
                Ok(StatusResponse {
                    status,
                    error_message: None,
                })
            })
        }

        fn remove<'a>(&'a self, reference: &'a str) -> BackendFuture<'a, ()> {
            Box::pin(async move {
                self.removed.lock().unwrap().push(reference.to_string());
                Ok(())
            })
        }

        fn duplicate_notice(&self) -> BackendFuture<'_, DuplicateNotice> {
            Box::pin(async move {
                let message = self.banner.clone().or_else(|| {
                    self.served_duplicate
                        .load(Ordering::SeqCst)
                        .then(|| "You have already uploaded test.txt".to_string())
                });
                Ok(DuplicateNotice { message })
            })
        }
    }

    async fn wait_for(
        events: &mut mpsc::UnboundedReceiver<SessionEvent>,
        pred: impl Fn(&SessionEvent) -> bool,
    ) -> Vec<SessionEvent> {
        let mut seen = Vec::new();
        tokio::time::timeout(Duration::from_secs(120), async {
            while let Some(ev) = events.recv().await {
                let done = pred(&ev);
                seen.push(ev);
                if done {
                    return;
                }
            }
        })
        .await
        .expect("event not observed");
        seen
    }

    fn settled(status: FileStatus, reference: &str, name: &str) -> UploadedFile {
        UploadedFile {
            file_status: status,
            reference: reference.into(),
            upload_details: UploadDetails {
                file_name: name.into(),
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn file_goes_from_chosen_to_uploaded() {
        let backend = Arc::new(MockBackend {
            statuses: Mutex::new(VecDeque::from([FileStatus::Waiting, FileStatus::Waiting])),
            ..MockBackend::default()
        });
        let (handle, mut events, _task) =
            UploadController::spawn(SessionConfig::default(), backend.clone(), Vec::new())
                .await
                .unwrap();

        let slot = handle.snapshot().await.unwrap().slots[0].id;
        handle
            .choose_file(slot, SelectedFile::from_path("/path/to/test.txt"))
            .await
            .unwrap();

        let seen = wait_for(&mut events, |e| {
            matches!(e, SessionEvent::StateChanged { phase: SlotPhase::Uploaded, .. })
        })
        .await;
        assert!(seen.iter().any(|e| matches!(
            e,
            SessionEvent::Progress { percent: 95, .. }
        )));

        let snap = handle.snapshot().await.unwrap();
        assert_eq!(snap.slots[0].phase, SlotPhase::Uploaded);
        assert_eq!(snap.slots[0].reference.as_deref(), Some("ref-1"));
        assert!(snap.is_idle());
        assert_eq!(backend.provisioned.load(Ordering::SeqCst), 1);
        assert_eq!(handle.submit().await.unwrap(), SubmitOutcome::Proceed);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_uploads_are_purged_before_seeding() {
        let backend = Arc::new(MockBackend::default());
        let uploaded = vec![
            settled(FileStatus::Waiting, "stale", "half.txt"),
            settled(FileStatus::Ready, "keep", "/path/to/done.txt"),
        ];
        let (handle, _events, _task) =
            UploadController::spawn(SessionConfig::default(), backend.clone(), uploaded)
                .await
                .unwrap();

        assert_eq!(*backend.removed.lock().unwrap(), vec!["stale".to_string()]);
        let snap = handle.snapshot().await.unwrap();
        assert_eq!(snap.slots.len(), 1);
        assert_eq!(snap.slots[0].file_name.as_deref(), Some("done.txt"));
        assert_eq!(snap.slots[0].phase, SlotPhase::Uploaded);
    }

    #[tokio::test(start_paused = true)]
    async fn submit_while_transferring_is_refused() {
        let backend = Arc::new(MockBackend {
            transfer_delay: Some(Duration::from_secs(30)),
            ..MockBackend::default()
        });
        let (handle, _events, _task) =
            UploadController::spawn(SessionConfig::default(), backend, Vec::new())
                .await
                .unwrap();

        let slot = handle.snapshot().await.unwrap().slots[0].id;
        handle
            .choose_file(slot, SelectedFile::from_path("test.txt"))
            .await
            .unwrap();
        assert_eq!(
            handle.submit().await.unwrap(),
            SubmitOutcome::StillTransferring
        );
        let snap = handle.snapshot().await.unwrap();
        assert_eq!(snap.notices.len(), 1);
        assert_eq!(snap.notices[0].text, "Still transferring...");
    }

    #[tokio::test(start_paused = true)]
    async fn removing_mid_transfer_aborts_and_deletes() {
        let backend = Arc::new(MockBackend {
            transfer_delay: Some(Duration::from_secs(30)),
            ..MockBackend::default()
        });
        let (handle, mut events, _task) =
            UploadController::spawn(SessionConfig::default(), backend.clone(), Vec::new())
                .await
                .unwrap();

        let slot = handle.snapshot().await.unwrap().slots[0].id;
        handle
            .choose_file(slot, SelectedFile::from_path("test.txt"))
            .await
            .unwrap();
        wait_for(&mut events, |e| {
            matches!(e, SessionEvent::Progress { percent, .. } if *percent > 0)
        })
        .await;

        handle.remove(slot).await.unwrap();
        wait_for(&mut events, |e| {
            matches!(e, SessionEvent::SlotRemoved { slot: s } if *s == slot)
        })
        .await;

        assert_eq!(backend.transfers.load(Ordering::SeqCst), 0);
        assert_eq!(*backend.removed.lock().unwrap(), vec!["ref-1".to_string()]);
        let snap = handle.snapshot().await.unwrap();
        assert_eq!(snap.slots.len(), 1);
        assert_eq!(snap.slots[0].phase, SlotPhase::Default);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_provisioning_redirects() {
        let backend = Arc::new(MockBackend {
            fatal: true,
            ..MockBackend::default()
        });
        let (handle, mut events, _task) =
            UploadController::spawn(SessionConfig::default(), backend, Vec::new())
                .await
                .unwrap();

        wait_for(&mut events, |e| matches!(e, SessionEvent::Redirect { .. })).await;
        let slot = handle.snapshot().await.unwrap().slots[0].id;
        let err = handle
            .choose_file(slot, SelectedFile::from_path("test.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Abandoned));
        assert_eq!(handle.submit().await.unwrap(), SubmitOutcome::Abandoned);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_banner_is_forwarded() {
        let backend = Arc::new(MockBackend {
            banner: Some("You have already uploaded test.txt".into()),
            ..MockBackend::default()
        });
        let (handle, mut events, _task) =
            UploadController::spawn(SessionConfig::default(), backend, Vec::new())
                .await
                .unwrap();

        wait_for(&mut events, |e| matches!(e, SessionEvent::DuplicateBanner { .. })).await;
        let snap = handle.snapshot().await.unwrap();
        assert_eq!(
            snap.banner.as_deref(),
            Some("You have already uploaded test.txt")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_upload_settles_with_banner() {
        let backend = Arc::new(MockBackend {
            statuses: Mutex::new(VecDeque::from([FileStatus::Duplicate])),
            ..MockBackend::default()
        });
        let (handle, mut events, _task) =
            UploadController::spawn(SessionConfig::default(), backend, Vec::new())
                .await
                .unwrap();
        assert!(handle.snapshot().await.unwrap().banner.is_none());

        let slot = handle.snapshot().await.unwrap().slots[0].id;
        handle
            .choose_file(slot, SelectedFile::from_path("/path/to/test.txt"))
            .await
            .unwrap();

        wait_for(&mut events, |e| {
            matches!(e, SessionEvent::DuplicateBanner { message: Some(_) })
        })
        .await;
        let snap = handle.snapshot().await.unwrap();
        assert_eq!(snap.slots[0].phase, SlotPhase::Uploaded);
        assert_eq!(
            snap.banner.as_deref(),
            Some("You have already uploaded test.txt")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn queued_removal_runs_after_upload() {
        let backend = Arc::new(MockBackend {
            transfer_delay: Some(Duration::from_secs(30)),
            ..MockBackend::default()
        });
        let uploaded = vec![settled(FileStatus::Ready, "keep", "done.txt")];
        let (handle, mut events, _task) =
            UploadController::spawn(SessionConfig::default(), backend.clone(), uploaded)
                .await
                .unwrap();

        let done = handle.snapshot().await.unwrap().slots[0].id;
        let slot = handle.add_slot().await.unwrap();
        handle
            .choose_file(slot, SelectedFile::from_path("test.txt"))
            .await
            .unwrap();
        wait_for(&mut events, |e| {
            matches!(e, SessionEvent::Progress { percent, .. } if *percent > 0)
        })
        .await;

        handle.remove(done).await.unwrap();
        let snap = handle.snapshot().await.unwrap();
        assert!(snap.slots[0].removal_queued);
        assert_eq!(
            snap.slots.iter().filter(|s| s.phase.is_busy()).count(),
            1
        );
        assert!(backend.removed.lock().unwrap().is_empty());

        wait_for(&mut events, |e| {
            matches!(e, SessionEvent::SlotRemoved { slot: s } if *s == done)
        })
        .await;
        assert_eq!(*backend.removed.lock().unwrap(), vec!["keep".to_string()]);
        let snap = handle.snapshot().await.unwrap();
        assert_eq!(snap.slots.len(), 1);
        assert_eq!(snap.slots[0].phase, SlotPhase::Uploaded);
        assert!(snap.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn notices_expire() {
        let backend = Arc::new(MockBackend::default());
        let (handle, mut events, _task) =
            UploadController::spawn(SessionConfig::default(), backend, Vec::new())
                .await
                .unwrap();

        let slot = handle.snapshot().await.unwrap().slots[0].id;
        handle
            .choose_file(slot, SelectedFile::from_path("test.txt"))
            .await
            .unwrap();
        wait_for(&mut events, |e| matches!(e, SessionEvent::NoticeDismissed { .. })).await;
        assert!(handle.snapshot().await.unwrap().notices.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_task() {
        let backend = Arc::new(MockBackend::default());
        let (handle, _events, task) =
            UploadController::spawn(SessionConfig::default(), backend, Vec::new())
                .await
                .unwrap();

        handle.shutdown().await;
        task.await.unwrap();
        assert!(matches!(
            handle.snapshot().await,
            Err(SessionError::ControllerStopped)
        ));
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let mut config = SessionConfig::default();
        config.cardinality.min_files = 10;
        let result =
            UploadController::spawn(config, Arc::new(MockBackend::default()), Vec::new()).await;
        assert!(matches!(result, Err(SessionError::InvalidConfig(_))));
    }
}
