//! Destination provisioning and byte transfer.

use multiupload_protocol::ProvisionResponse;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::BackendError;
use crate::events::SessionEvent;
use crate::session::{Job, Session};
use crate::slot::{Provision, Provisioned, SlotId, SlotState, transfer_percent};

impl Session {
    /// Queues a provisioning request unless one is pending or done.
    pub(crate) fn request_provision(&mut self, idx: usize) {
        let slot = &mut self.slots[idx];
        if slot.provision != Provision::None {
            return;
        }
        slot.provision = Provision::Pending;
        self.jobs.push(Job::Provision {
            slot: slot.id,
            delay: None,
        });
    }

    pub(crate) fn on_provisioned(
        &mut self,
        slot: SlotId,
        result: Result<ProvisionResponse, BackendError>,
    ) {
        let Some(idx) = self.index_of(slot) else {
            // The slot went away while provisioning was pending; nothing
            // else will ever delete this destination.
            if let Ok(response) = result {
                debug!(slot = %slot, reference = %response.reference, "deleting orphaned destination");
                self.jobs.push(Job::Remove {
                    slot,
                    reference: response.reference,
                });
            }
            return;
        };

        match result {
            Ok(response) => {
                debug!(slot = %slot, reference = %response.reference, "destination provisioned");
                self.slots[idx].provision = Provision::Ready(Provisioned {
                    reference: response.reference,
                    destination: response.upload_request,
                });
                if matches!(
                    self.slots[idx].state,
                    SlotState::Uploading {
                        transfer: None,
                        ..
                    }
                ) {
                    self.start_transfer(idx);
                }
            }
            Err(e) if e.is_fatal() => self.abandon(),
            Err(e) => {
                warn!(slot = %slot, error = %e, "provisioning failed, retrying");
                self.jobs.push(Job::Provision {
                    slot,
                    delay: Some(self.config.retry.retry_delay()),
                });
            }
        }
    }

    /// Starts moving bytes for an `Uploading` slot with a ready destination.
    pub(crate) fn start_transfer(&mut self, idx: usize) {
        let slot = &mut self.slots[idx];
        let id = slot.id;
        let Provision::Ready(provisioned) = &slot.provision else {
            return;
        };
        let destination = provisioned.destination.clone();
        let SlotState::Uploading { file, transfer, .. } = &mut slot.state else {
            return;
        };

        let cancel = CancellationToken::new();
        *transfer = Some(cancel.clone());
        let file = file.clone();
        debug!(slot = %id, href = %destination.href, "starting transfer");
        self.jobs.push(Job::Transfer {
            slot: id,
            destination,
            file,
            cancel,
        });
    }

    pub(crate) fn on_progress(&mut self, slot: SlotId, sent: u64, total: u64) {
        let Some(idx) = self.index_of(slot) else {
            return;
        };
        let ordinal = self.slots[idx].ordinal;
        let SlotState::Uploading { file, percent, .. } = &mut self.slots[idx].state else {
            return;
        };

        let next = transfer_percent(sent, total);
        if next == *percent {
            return;
        }
        *percent = next;
        let name = file.name.clone();
        let label = self.render(&self.config.messages.uploading, ordinal, &name);
        self.events.push(SessionEvent::Progress {
            slot,
            percent: next,
            label,
        });
    }

    pub(crate) fn on_transferred(&mut self, slot: SlotId, result: Result<(), BackendError>) {
        let Some(idx) = self.index_of(slot) else {
            debug!(slot = %slot, "transfer result for removed slot dropped");
            return;
        };
        let SlotState::Uploading {
            file,
            transfer: Some(cancel),
            ..
        } = &self.slots[idx].state
        else {
            debug!(slot = %slot, "stale transfer result dropped");
            return;
        };
        if cancel.is_cancelled() {
            return;
        }
        let file = file.clone();

        if let Err(e) = result {
            warn!(slot = %slot, error = %e, "transfer failed");
            self.fail_slot(idx, None);
            self.admit_next();
            return;
        }

        let Some(reference) = self.slots[idx].reference().map(str::to_owned) else {
            self.fail_slot(idx, None);
            self.admit_next();
            return;
        };
        debug!(slot = %slot, reference = %reference, "transfer complete, verifying");
        self.set_state(idx, SlotState::Verifying { file, retries: 0 });
        self.jobs.push(Job::Poll {
            slot,
            reference,
            delay: self.config.retry.retry_delay(),
        });
    }
}
