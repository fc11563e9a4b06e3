//! Multi-file upload session.
//!
//! A [`Session`] is a pure state machine over an ordered list of slots. It
//! serializes uploads, memoizes provisioned destinations, polls for
//! verification and coordinates removals, emitting [`SessionEvent`]s for the
//! rendering layer. [`UploadController`] drives it against a [`Backend`].

pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod notices;
mod provision;
mod queue;
mod removal;
pub mod session;
pub mod slot;
mod verify;

pub use backend::{Backend, BackendFuture, ProgressCallback};
pub use config::{Cardinality, DuplicatePolicy, Messages, RetryPolicy, SessionConfig};
pub use controller::{Command, ControllerHandle, UploadController};
pub use error::{BackendError, SessionError};
pub use events::SessionEvent;
pub use notices::{ErrorSurface, FieldError, Notice};
pub use session::{Completion, Job, Session, SessionSnapshot, SlotView, SubmitOutcome};
pub use slot::{SelectedFile, Slot, SlotId, SlotPhase, SlotState};
