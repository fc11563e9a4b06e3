//! Queue controller: at most one slot is network-bound at a time.

use tracing::debug;

use crate::events::SessionEvent;
use crate::session::Session;
use crate::slot::{Provision, SlotState};

impl Session {
    /// `true` while any slot is uploading, verifying or being removed.
    pub fn is_busy(&self) -> bool {
        self.slots.iter().any(|s| s.phase().is_busy())
    }

    /// Starts the next queued removal, or else promotes the first `Waiting`
    /// slot (in display order), when idle.
    pub(crate) fn admit_next(&mut self) {
        if self.abandoned.is_some() || self.is_busy() {
            return;
        }
        if let Some(idx) = self.slots.iter().position(|s| s.removal_queued) {
            debug!(slot = %self.slots[idx].id, "starting queued removal");
            self.start_removal(idx);
            return;
        }
        let Some(idx) = self
            .slots
            .iter()
            .position(|s| matches!(s.state, SlotState::Waiting { .. }))
        else {
            return;
        };

        let slot = &self.slots[idx];
        let id = slot.id;
        let SlotState::Waiting { file } = &slot.state else {
            return;
        };
        let file = file.clone();
        let label = self.render(&self.config.messages.uploading, slot.ordinal, &file.name);
        debug!(slot = %id, file = %file.name, "admitting upload");

        self.set_state(
            idx,
            SlotState::Uploading {
                file,
                transfer: None,
                percent: 0,
            },
        );
        self.events.push(SessionEvent::Progress {
            slot: id,
            percent: 0,
            label,
        });

        match self.slots[idx].provision {
            Provision::Ready(_) => self.start_transfer(idx),
            Provision::Pending => {}
            Provision::None => self.request_provision(idx),
        }
    }
}
