//! Error and notification surface.
//!
//! Tracks which slots carry a user-visible error, the page title prefix that
//! goes with them, and transient live-region notifications. It observes the
//! state machine; it never drives it.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::slot::SlotId;

/// An error attached to one slot's field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub message: String,
    /// Id of the input the summary entry links to.
    pub input_id: String,
    /// Id of the inline message, referenced by the input's `aria-describedby`.
    pub message_id: String,
}

/// A transient, non-blocking notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub id: u64,
    pub text: String,
}

/// Result of an error-set mutation, used to emit title changes exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleChange {
    Unchanged,
    Prefixed,
    Cleared,
}

/// The set of currently-erroring slots plus active notifications.
#[derive(Debug, Default)]
pub struct ErrorSurface {
    errors: BTreeMap<SlotId, FieldError>,
    notices: Vec<Notice>,
    next_notice: u64,
}

impl ErrorSurface {
    /// Attaches (or replaces) the error for a slot.
    pub fn set_error(&mut self, slot: SlotId, error: FieldError) -> TitleChange {
        let was_empty = self.errors.is_empty();
        self.errors.insert(slot, error);
        if was_empty {
            TitleChange::Prefixed
        } else {
            TitleChange::Unchanged
        }
    }

    /// Removes a slot's error. Returns `None` if the slot had none.
    pub fn clear_error(&mut self, slot: SlotId) -> Option<TitleChange> {
        self.errors.remove(&slot)?;
        if self.errors.is_empty() {
            Some(TitleChange::Cleared)
        } else {
            Some(TitleChange::Unchanged)
        }
    }

    pub fn error(&self, slot: SlotId) -> Option<&FieldError> {
        self.errors.get(&slot)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Summary entries in slot order.
    pub fn summary(&self) -> Vec<FieldError> {
        self.errors.values().cloned().collect()
    }

    /// Renders the page title, prefixed once while any error is active.
    pub fn page_title(&self, prefix: &str, title: &str) -> String {
        if self.has_errors() {
            format!("{prefix} {title}")
        } else {
            title.to_string()
        }
    }

    /// Queues a notification and returns it.
    pub fn notify(&mut self, text: String) -> Notice {
        self.next_notice += 1;
        let notice = Notice {
            id: self.next_notice,
            text,
        };
        self.notices.push(notice.clone());
        notice
    }

    /// Drops an expired notification. Returns `false` if it was already gone.
    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.notices.len();
        self.notices.retain(|n| n.id != id);
        self.notices.len() != before
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }
}
