//! One row of the upload list and its lifecycle state.

use std::fmt;
use std::path::PathBuf;

use multiupload_protocol::{UploadRequest, file_name_from_path};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Stable per-row identifier. Allocated in increasing order, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SlotId(pub u64);

impl SlotId {
    /// DOM id of the row's file input.
    pub fn input_id(self) -> String {
        format!("file-{}", self.0)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A file picked by the user for a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    /// Display name (last path segment).
    pub name: String,
    /// Where the bytes are read from.
    pub path: PathBuf,
}

impl SelectedFile {
    /// Builds a selection from a local path, deriving the display name.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let raw = path.to_string_lossy().into_owned();
        Self {
            name: file_name_from_path(&raw).to_string(),
            path,
        }
    }
}

/// A provisioned upload destination.
#[derive(Debug, Clone, PartialEq)]
pub struct Provisioned {
    pub reference: String,
    pub destination: UploadRequest,
}

/// Memoized provisioning for a slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Provision {
    #[default]
    None,
    /// A request is in flight (or waiting to be retried).
    Pending,
    Ready(Provisioned),
}

/// State to return to when a server-side removal fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restore {
    Uploaded,
    Default,
}

/// Lifecycle state. Data only exists in the states that allow it.
#[derive(Debug, Clone)]
pub enum SlotState {
    /// Editable; may carry the error of a previous attempt.
    Default { error: Option<String> },
    /// File chosen, queued behind any busy slot.
    Waiting { file: SelectedFile },
    /// Provisioning and/or transfer in flight. `transfer` is set once
    /// bytes start moving and is cancelled on removal.
    Uploading {
        file: SelectedFile,
        transfer: Option<CancellationToken>,
        percent: u8,
    },
    /// Transfer finished; polling the status endpoint.
    Verifying { file: SelectedFile, retries: u32 },
    Uploaded { file_name: String, reference: String },
    /// Server-side deletion in flight.
    Removing {
        file_name: String,
        reference: String,
        restore: Restore,
    },
}

/// Field-less view of [`SlotState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SlotPhase {
    Default,
    Waiting,
    Uploading,
    Verifying,
    Uploaded,
    Removing,
}

impl SlotState {
    pub fn phase(&self) -> SlotPhase {
        match self {
            Self::Default { .. } => SlotPhase::Default,
            Self::Waiting { .. } => SlotPhase::Waiting,
            Self::Uploading { .. } => SlotPhase::Uploading,
            Self::Verifying { .. } => SlotPhase::Verifying,
            Self::Uploaded { .. } => SlotPhase::Uploaded,
            Self::Removing { .. } => SlotPhase::Removing,
        }
    }
}

impl SlotPhase {
    /// Network-bound phases; at most one slot may be in any of them.
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Uploading | Self::Verifying | Self::Removing)
    }

    /// Phases that keep the form from being submitted.
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            Self::Waiting | Self::Uploading | Self::Verifying | Self::Removing
        )
    }
}

/// One row of the upload list.
#[derive(Debug, Clone)]
pub struct Slot {
    pub(crate) id: SlotId,
    pub(crate) ordinal: usize,
    pub(crate) state: SlotState,
    pub(crate) provision: Provision,
    /// Server-side removal requested while another slot was busy.
    pub(crate) removal_queued: bool,
}

impl Slot {
    pub(crate) fn new(id: SlotId, ordinal: usize) -> Self {
        Self {
            id,
            ordinal,
            state: SlotState::Default { error: None },
            provision: Provision::None,
            removal_queued: false,
        }
    }

    pub(crate) fn uploaded(id: SlotId, ordinal: usize, file_name: String, reference: String) -> Self {
        Self {
            id,
            ordinal,
            state: SlotState::Uploaded {
                file_name,
                reference,
            },
            provision: Provision::None,
            removal_queued: false,
        }
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    /// 1-based display position.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn state(&self) -> &SlotState {
        &self.state
    }

    pub fn phase(&self) -> SlotPhase {
        self.state.phase()
    }

    /// The file input is only usable in `Default`.
    pub fn is_input_enabled(&self) -> bool {
        self.phase() == SlotPhase::Default && !self.removal_queued
    }

    /// Waiting for the queue to free up before its removal starts.
    pub fn is_removal_queued(&self) -> bool {
        self.removal_queued
    }

    /// Whether this slot keeps the form from being submitted.
    pub fn is_pending(&self) -> bool {
        self.removal_queued || self.phase().is_pending()
    }

    pub fn file_name(&self) -> Option<&str> {
        match &self.state {
            SlotState::Default { .. } => None,
            SlotState::Waiting { file }
            | SlotState::Uploading { file, .. }
            | SlotState::Verifying { file, .. } => Some(&file.name),
            SlotState::Uploaded { file_name, .. } | SlotState::Removing { file_name, .. } => {
                Some(file_name)
            }
        }
    }

    /// Server-assigned reference, once known.
    pub fn reference(&self) -> Option<&str> {
        match &self.state {
            SlotState::Uploaded { reference, .. } | SlotState::Removing { reference, .. } => {
                Some(reference)
            }
            _ => match &self.provision {
                Provision::Ready(p) => Some(&p.reference),
                _ => None,
            },
        }
    }

    /// Provisioned destination, once known.
    pub fn destination(&self) -> Option<&UploadRequest> {
        match &self.provision {
            Provision::Ready(p) => Some(&p.destination),
            _ => None,
        }
    }

    /// Inconclusive polls so far; zero outside `Verifying`.
    pub fn retries(&self) -> u32 {
        match self.state {
            SlotState::Verifying { retries, .. } => retries,
            _ => 0,
        }
    }

    /// Transfer progress in percent; zero outside `Uploading`.
    pub fn percent(&self) -> u8 {
        match self.state {
            SlotState::Uploading { percent, .. } => percent,
            _ => 0,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            SlotState::Default { error } => error.as_deref(),
            _ => None,
        }
    }

    pub fn has_transfer_handle(&self) -> bool {
        matches!(
            self.state,
            SlotState::Uploading {
                transfer: Some(_),
                ..
            }
        )
    }
}

/// Scales transferred bytes to 0..=95 percent; the tail is left for
/// verification.
pub fn transfer_percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = sent.min(total) as u128 * 95 / total as u128;
    pct as u8
}
