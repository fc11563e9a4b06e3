//! Slot removal, local or server-side.

use tracing::{debug, warn};

use crate::error::{BackendError, SessionError};
use crate::events::SessionEvent;
use crate::session::{Job, Session};
use crate::slot::{Restore, SlotId, SlotPhase, SlotState};

impl Session {
    /// Removes a slot.
    ///
    /// An in-flight transfer is aborted first. Slots whose file has a
    /// server-side reference are deleted remotely and stay in `Removing`
    /// until the backend confirms; the rest disappear immediately. A remote
    /// deletion requested while another slot is busy waits its turn in the
    /// queue, ahead of any waiting upload.
    pub fn remove(&mut self, slot: SlotId) -> Result<(), SessionError> {
        if self.is_abandoned() {
            return Err(SessionError::Abandoned);
        }
        let idx = self.index_of(slot).ok_or(SessionError::SlotNotFound(slot))?;
        let current = &self.slots[idx];
        if current.phase() == SlotPhase::Removing || current.removal_queued {
            return Ok(());
        }

        if let SlotState::Uploading {
            transfer: Some(cancel),
            ..
        } = &current.state
        {
            debug!(slot = %slot, "aborting transfer");
            cancel.cancel();
        }

        let others_busy = self
            .slots
            .iter()
            .any(|s| s.id != slot && s.phase().is_busy());
        if current.reference().is_some() && others_busy {
            debug!(slot = %slot, "removal queued behind busy slot");
            if matches!(current.state, SlotState::Waiting { .. }) {
                self.set_state(idx, SlotState::Default { error: None });
            }
            self.slots[idx].removal_queued = true;
        } else {
            self.start_removal(idx);
        }

        self.settle();
        Ok(())
    }

    /// Deletes the slot server-side when it has a reference, locally
    /// otherwise.
    pub(crate) fn start_removal(&mut self, idx: usize) {
        let current = &mut self.slots[idx];
        current.removal_queued = false;
        let slot = current.id;

        let restore = if current.phase() == SlotPhase::Uploaded {
            Restore::Uploaded
        } else {
            Restore::Default
        };

        match current.reference().map(str::to_owned) {
            Some(reference) => {
                let file_name = current.file_name().unwrap_or_default().to_string();
                debug!(slot = %slot, reference = %reference, "removing server-side");
                self.set_state(
                    idx,
                    SlotState::Removing {
                        file_name,
                        reference: reference.clone(),
                        restore,
                    },
                );
                self.jobs.push(Job::Remove { slot, reference });
            }
            None => self.drop_slot(idx),
        }
    }

    pub(crate) fn on_removed(&mut self, slot: SlotId, result: Result<(), BackendError>) {
        let Some(idx) = self.index_of(slot) else {
            return;
        };
        let SlotState::Removing {
            file_name,
            reference,
            restore,
        } = &self.slots[idx].state
        else {
            debug!(slot = %slot, "stale removal result dropped");
            return;
        };

        match result {
            Ok(()) => self.drop_slot(idx),
            Err(e) => {
                warn!(slot = %slot, error = %e, "removal failed, restoring slot");
                let state = match restore {
                    Restore::Uploaded => SlotState::Uploaded {
                        file_name: file_name.clone(),
                        reference: reference.clone(),
                    },
                    Restore::Default => SlotState::Default {
                        error: self.surface.error(slot).map(|e| e.message.clone()),
                    },
                };
                self.set_state(idx, state);
                self.admit_next();
            }
        }
    }

    /// Deletes a slot from the list and repairs ordering and invariants.
    fn drop_slot(&mut self, idx: usize) {
        let removed = self.slots.remove(idx);
        let id = removed.id;
        debug!(slot = %id, "slot removed");

        self.clear_error(id);
        if let Some(name) = removed.file_name() {
            let text = self.render(&self.config.messages.removed, removed.ordinal, name);
            self.notify(text);
        }
        self.events.push(SessionEvent::SlotRemoved { slot: id });
        self.renumber();

        if self.slots.is_empty() {
            self.insert_default();
        }
        self.jobs.push(Job::CheckDuplicates);
        self.admit_next();
    }
}
