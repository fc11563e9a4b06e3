//! The upload session: ordered slots, cardinality policy and the outbox of
//! network jobs and UI events.
//!
//! `Session` never performs I/O. Every mutation leaves the slot list
//! self-consistent (dense ordinals, at least one slot) and queues the jobs
//! the controller must run. Results come back through [`Session::complete`].

use std::time::Duration;

use multiupload_protocol::{
    DuplicateNotice, ProvisionResponse, StatusResponse, UploadRequest, UploadedFile,
    expand_template, file_name_from_path,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::SessionConfig;
use crate::error::{BackendError, SessionError};
use crate::events::SessionEvent;
use crate::notices::{ErrorSurface, FieldError, Notice, TitleChange};
use crate::slot::{SelectedFile, Slot, SlotId, SlotPhase, SlotState};

/// Network or timer work requested by the session.
#[derive(Debug)]
pub enum Job {
    /// Request a destination, optionally after a retry delay.
    Provision { slot: SlotId, delay: Option<Duration> },
    Transfer {
        slot: SlotId,
        destination: UploadRequest,
        file: SelectedFile,
        cancel: CancellationToken,
    },
    /// Query verification status after `delay`.
    Poll {
        slot: SlotId,
        reference: String,
        delay: Duration,
    },
    Remove { slot: SlotId, reference: String },
    CheckDuplicates,
    DismissNotice { id: u64, after: Duration },
}

/// Result of a [`Job`], fed back into the session.
#[derive(Debug)]
pub enum Completion {
    Provisioned {
        slot: SlotId,
        result: Result<ProvisionResponse, BackendError>,
    },
    Progress { slot: SlotId, sent: u64, total: u64 },
    Transferred {
        slot: SlotId,
        result: Result<(), BackendError>,
    },
    Polled {
        slot: SlotId,
        reference: String,
        result: Result<StatusResponse, BackendError>,
    },
    Removed {
        slot: SlotId,
        result: Result<(), BackendError>,
    },
    DuplicatesChecked {
        result: Result<DuplicateNotice, BackendError>,
    },
    NoticeExpired { id: u64 },
}

/// What happens when the user submits the host form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SubmitOutcome {
    Proceed,
    /// Focus the error summary.
    BlockedByErrors { summary: Vec<FieldError> },
    /// A slot is still queued or in flight; a notification was shown.
    StillTransferring,
    Abandoned,
}

/// Read-only view of one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotView {
    pub id: SlotId,
    pub ordinal: usize,
    pub phase: SlotPhase,
    pub file_name: Option<String>,
    pub reference: Option<String>,
    pub percent: u8,
    pub retries: u32,
    pub error: Option<String>,
    pub input_enabled: bool,
    pub removable: bool,
    pub removal_queued: bool,
}

/// Read-only view of the whole session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub slots: Vec<SlotView>,
    pub busy: bool,
    pub add_visible: bool,
    pub errors: Vec<FieldError>,
    pub notices: Vec<Notice>,
    pub banner: Option<String>,
    pub abandoned: bool,
}

impl SessionSnapshot {
    /// Returns `true` when nothing is queued or in flight.
    pub fn is_idle(&self) -> bool {
        !self
            .slots
            .iter()
            .any(|s| s.removal_queued || s.phase.is_pending())
    }

    /// First editable slot without a file, if any.
    pub fn first_empty_slot(&self) -> Option<SlotId> {
        self.slots
            .iter()
            .find(|s| s.input_enabled && s.error.is_none())
            .map(|s| s.id)
    }
}

/// One form's upload session.
pub struct Session {
    pub(crate) config: SessionConfig,
    pub(crate) slots: Vec<Slot>,
    pub(crate) surface: ErrorSurface,
    pub(crate) banner: Option<String>,
    pub(crate) abandoned: Option<String>,
    next_id: u64,
    shown_busy: bool,
    shown_add: bool,
    pub(crate) jobs: Vec<Job>,
    pub(crate) events: Vec<SessionEvent>,
}

impl Session {
    /// Creates a session seeded from previously uploaded files.
    ///
    /// Settled files (`READY`/`DUPLICATE`) become uploaded rows; the rest
    /// are expected to have been purged already (see
    /// [`Session::stale_references`]). Empty rows are added up to
    /// `start_rows`, and always at least one.
    pub fn new(config: SessionConfig, uploaded: &[UploadedFile]) -> Result<Self, SessionError> {
        config.validate()?;

        let mut session = Self {
            config,
            slots: Vec::new(),
            surface: ErrorSurface::default(),
            banner: None,
            abandoned: None,
            next_id: 0,
            shown_busy: false,
            shown_add: false,
            jobs: Vec::new(),
            events: Vec::new(),
        };

        for file in uploaded.iter().filter(|f| f.is_settled()) {
            let id = session.alloc_id();
            let ordinal = session.slots.len() + 1;
            let name = file_name_from_path(&file.upload_details.file_name).to_string();
            debug!(slot = %id, reference = %file.reference, "seeding uploaded file");
            session
                .slots
                .push(Slot::uploaded(id, ordinal, name, file.reference.clone()));
            session.events.push(SessionEvent::SlotAdded { slot: id, ordinal });
            session.events.push(SessionEvent::StateChanged {
                slot: id,
                phase: SlotPhase::Uploaded,
            });
        }

        let start_rows = session.config.cardinality.start_rows.max(1);
        while session.slots.len() < start_rows {
            session.insert_default();
        }

        session.jobs.push(Job::CheckDuplicates);
        session.settle();
        Ok(session)
    }

    /// References of previously uploaded files that never settled and
    /// must be deleted server-side before seeding.
    pub fn stale_references(uploaded: &[UploadedFile]) -> Vec<String> {
        uploaded
            .iter()
            .filter(|f| !f.is_settled())
            .map(|f| f.reference.clone())
            .collect()
    }

    // -----------------------------------------------------------------------
    // User actions
    // -----------------------------------------------------------------------

    /// Adds an empty row ("add another").
    pub fn add_slot(&mut self) -> Result<SlotId, SessionError> {
        self.ensure_live()?;
        let max = self.config.cardinality.max_files;
        if self.slots.len() >= max {
            return Err(SessionError::LimitReached(max));
        }
        let id = self.insert_default();
        self.settle();
        Ok(id)
    }

    /// Assigns a file to an editable slot and queues it.
    pub fn choose_file(&mut self, slot: SlotId, file: SelectedFile) -> Result<(), SessionError> {
        self.ensure_live()?;
        let idx = self.index_of(slot).ok_or(SessionError::SlotNotFound(slot))?;
        if !self.slots[idx].is_input_enabled() {
            return Err(SessionError::SlotLocked(slot));
        }

        self.clear_error(slot);
        debug!(slot = %slot, file = %file.name, "file chosen");
        self.set_state(idx, SlotState::Waiting { file });
        self.admit_next();
        self.settle();
        Ok(())
    }

    /// Decides whether the host form may be submitted.
    pub fn submit(&mut self) -> SubmitOutcome {
        if self.abandoned.is_some() {
            return SubmitOutcome::Abandoned;
        }
        if self.surface.has_errors() {
            return SubmitOutcome::BlockedByErrors {
                summary: self.surface.summary(),
            };
        }
        if self.slots.iter().any(|s| s.is_pending()) {
            let text = self.config.messages.still_transferring.clone();
            self.notify(text);
            return SubmitOutcome::StillTransferring;
        }
        SubmitOutcome::Proceed
    }

    /// Feeds back the result of a job.
    pub fn complete(&mut self, completion: Completion) {
        if self.abandoned.is_some() {
            return;
        }
        match completion {
            Completion::Provisioned { slot, result } => self.on_provisioned(slot, result),
            Completion::Progress { slot, sent, total } => self.on_progress(slot, sent, total),
            Completion::Transferred { slot, result } => self.on_transferred(slot, result),
            Completion::Polled {
                slot,
                reference,
                result,
            } => self.on_polled(slot, &reference, result),
            Completion::Removed { slot, result } => self.on_removed(slot, result),
            Completion::DuplicatesChecked { result } => self.on_duplicates_checked(result),
            Completion::NoticeExpired { id } => {
                if self.surface.dismiss(id) {
                    self.events.push(SessionEvent::NoticeDismissed { id });
                }
            }
        }
        self.settle();
    }

    /// Cancels every in-flight transfer. Used on teardown.
    pub fn shutdown(&mut self) {
        for slot in &self.slots {
            if let SlotState::Uploading {
                transfer: Some(token),
                ..
            } = &slot.state
            {
                token.cancel();
            }
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, id: SlotId) -> Option<&Slot> {
        self.slots.iter().find(|s| s.id == id)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn errors(&self) -> &ErrorSurface {
        &self.surface
    }

    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned.is_some()
    }

    /// Renders the page title with the error prefix when needed.
    pub fn page_title(&self, title: &str) -> String {
        self.surface
            .page_title(&self.config.messages.error_prefix, title)
    }

    /// Whether the "add another" control is offered.
    pub fn can_add(&self) -> bool {
        self.abandoned.is_none() && self.slots.len() < self.config.cardinality.max_files
    }

    /// Whether a slot's remove control is offered.
    pub fn can_remove(&self, slot: &Slot) -> bool {
        if slot.removal_queued {
            return false;
        }
        match slot.phase() {
            SlotPhase::Removing => false,
            SlotPhase::Uploaded => true,
            _ => self.slots.len() > self.config.cardinality.min_files,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let slots = self
            .slots
            .iter()
            .map(|s| SlotView {
                id: s.id,
                ordinal: s.ordinal,
                phase: s.phase(),
                file_name: s.file_name().map(str::to_owned),
                reference: s.reference().map(str::to_owned),
                percent: s.percent(),
                retries: s.retries(),
                error: s.error().map(str::to_owned),
                input_enabled: s.is_input_enabled(),
                removable: self.can_remove(s),
                removal_queued: s.removal_queued,
            })
            .collect();

        SessionSnapshot {
            slots,
            busy: self.is_busy(),
            add_visible: self.can_add(),
            errors: self.surface.summary(),
            notices: self.surface.notices().to_vec(),
            banner: self.banner.clone(),
            abandoned: self.is_abandoned(),
        }
    }

    /// Drains queued jobs.
    pub fn take_jobs(&mut self) -> Vec<Job> {
        std::mem::take(&mut self.jobs)
    }

    /// Drains queued UI events.
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    // -----------------------------------------------------------------------
    // Internal helpers shared by the lifecycle modules
    // -----------------------------------------------------------------------

    fn ensure_live(&self) -> Result<(), SessionError> {
        if self.abandoned.is_some() {
            Err(SessionError::Abandoned)
        } else {
            Ok(())
        }
    }

    fn alloc_id(&mut self) -> SlotId {
        self.next_id += 1;
        SlotId(self.next_id)
    }

    pub(crate) fn index_of(&self, slot: SlotId) -> Option<usize> {
        self.slots.iter().position(|s| s.id == slot)
    }

    /// Appends a fresh `Default` slot, warming its destination if enabled.
    pub(crate) fn insert_default(&mut self) -> SlotId {
        let id = self.alloc_id();
        let ordinal = self.slots.len() + 1;
        self.slots.push(Slot::new(id, ordinal));
        self.events.push(SessionEvent::SlotAdded { slot: id, ordinal });

        if self.config.warm_destinations {
            let idx = self.slots.len() - 1;
            self.request_provision(idx);
        }
        id
    }

    pub(crate) fn set_state(&mut self, idx: usize, state: SlotState) {
        let slot = &mut self.slots[idx];
        let phase = state.phase();
        slot.state = state;
        self.events.push(SessionEvent::StateChanged {
            slot: slot.id,
            phase,
        });
    }

    /// Expands `{fileNumber}`/`{fileName}` for a slot.
    pub(crate) fn render(&self, template: &str, ordinal: usize, file_name: &str) -> String {
        let number = ordinal.to_string();
        expand_template(template, &[("fileNumber", &number), ("fileName", file_name)])
    }

    /// Returns a slot to `Default` carrying a user-visible error.
    ///
    /// `message` is shown verbatim; `None` renders the generic template.
    pub(crate) fn fail_slot(&mut self, idx: usize, message: Option<String>) {
        let slot = &self.slots[idx];
        let id = slot.id;
        let message = message.filter(|m| !m.trim().is_empty()).unwrap_or_else(|| {
            self.render(
                &self.config.messages.generic_error,
                slot.ordinal,
                slot.file_name().unwrap_or_default(),
            )
        });
        let message_id = match slot.reference() {
            Some(reference) => format!("error-message-{reference}"),
            None => format!("error-message-{id}"),
        };

        info!(slot = %id, error = %message, "upload failed");
        self.set_state(
            idx,
            SlotState::Default {
                error: Some(message.clone()),
            },
        );

        let error = FieldError {
            message,
            input_id: id.input_id(),
            message_id,
        };
        let change = self.surface.set_error(id, error.clone());
        self.events.push(SessionEvent::ErrorRaised { slot: id, error });
        if change == TitleChange::Prefixed {
            self.events.push(SessionEvent::TitlePrefix { active: true });
        }
    }

    pub(crate) fn clear_error(&mut self, slot: SlotId) {
        if let Some(change) = self.surface.clear_error(slot) {
            self.events.push(SessionEvent::ErrorCleared { slot });
            if change == TitleChange::Cleared {
                self.events.push(SessionEvent::TitlePrefix { active: false });
            }
        }
    }

    pub(crate) fn notify(&mut self, text: String) {
        let notice = self.surface.notify(text);
        self.jobs.push(Job::DismissNotice {
            id: notice.id,
            after: self.config.notice_ttl(),
        });
        self.events.push(SessionEvent::Notice(notice));
    }

    /// Recomputes dense 1..N ordinals.
    pub(crate) fn renumber(&mut self) {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            slot.ordinal = i + 1;
        }
        self.events.push(SessionEvent::Renumbered {
            order: self.slots.iter().map(|s| s.id).collect(),
        });
    }

    /// Abandons the session after a fatal backend failure.
    pub(crate) fn abandon(&mut self) {
        let url = self.config.error_page_url.clone();
        error!(url = %url, "fatal backend failure, abandoning session");
        self.shutdown();
        self.jobs.clear();
        self.abandoned = Some(url.clone());
        self.events.push(SessionEvent::Redirect { url });
    }

    fn on_duplicates_checked(&mut self, result: Result<DuplicateNotice, BackendError>) {
        match result {
            Ok(notice) => {
                let banner = notice.banner().map(str::to_owned);
                if banner != self.banner {
                    self.banner = banner.clone();
                    self.events
                        .push(SessionEvent::DuplicateBanner { message: banner });
                }
            }
            Err(e) => debug!(error = %e, "duplicate check failed"),
        }
    }

    /// Emits visibility changes for derived controls.
    pub(crate) fn settle(&mut self) {
        if self.abandoned.is_some() {
            return;
        }
        let add = self.can_add();
        if add != self.shown_add {
            self.shown_add = add;
            self.events.push(SessionEvent::AddControl { visible: add });
        }
        let busy = self.is_busy();
        if busy != self.shown_busy {
            self.shown_busy = busy;
            self.events.push(SessionEvent::FormStatus { busy });
        }
    }
}
