//! Events emitted for the rendering layer.

use serde::Serialize;

use crate::notices::{FieldError, Notice};
use crate::slot::{SlotId, SlotPhase};

/// A change the UI should reflect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SlotAdded { slot: SlotId, ordinal: usize },
    SlotRemoved { slot: SlotId },
    /// Display ordinals changed; `order[i]` now shows as number `i + 1`.
    Renumbered { order: Vec<SlotId> },
    StateChanged { slot: SlotId, phase: SlotPhase },
    /// Transfer progress with its accessible label.
    Progress { slot: SlotId, percent: u8, label: String },
    ErrorRaised { slot: SlotId, error: FieldError },
    ErrorCleared { slot: SlotId },
    /// The page title error prefix was added or removed.
    TitlePrefix { active: bool },
    /// "Still transferring" form status visibility.
    FormStatus { busy: bool },
    /// "Add another" control visibility.
    AddControl { visible: bool },
    Notice(Notice),
    NoticeDismissed { id: u64 },
    DuplicateBanner { message: Option<String> },
    /// The session is abandoned; navigate away.
    Redirect { url: String },
}
