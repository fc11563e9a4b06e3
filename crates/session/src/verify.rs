//! Verification poller: turns status responses into slot transitions.

use multiupload_protocol::{StatusResponse, Verdict};
use tracing::{debug, info, warn};

use crate::config::DuplicatePolicy;
use crate::error::BackendError;
use crate::session::{Job, Session};
use crate::slot::{Provision, SlotId, SlotState};

impl Session {
    pub(crate) fn on_polled(
        &mut self,
        slot: SlotId,
        reference: &str,
        result: Result<StatusResponse, BackendError>,
    ) {
        let Some(idx) = self.index_of(slot) else {
            debug!(slot = %slot, "status for removed slot dropped");
            return;
        };
        if !matches!(self.slots[idx].state, SlotState::Verifying { .. })
            || self.slots[idx].reference() != Some(reference)
        {
            debug!(slot = %slot, "stale status dropped");
            return;
        }

        let delay = self.config.retry.retry_delay();
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                // No conclusive answer; try again without spending a retry.
                warn!(slot = %slot, error = %e, "status request failed, retrying");
                self.jobs.push(Job::Poll {
                    slot,
                    reference: reference.to_string(),
                    delay,
                });
                return;
            }
        };

        debug!(slot = %slot, status = %response.status, "status received");
        match response.status.verdict() {
            Verdict::Ready => self.settle_uploaded(idx),
            Verdict::Duplicate => match self.config.duplicate_policy {
                DuplicatePolicy::Accept => self.settle_uploaded(idx),
                DuplicatePolicy::Reject => {
                    self.fail_slot(idx, response.error_message);
                    self.admit_next();
                }
            },
            Verdict::Failed => {
                self.fail_slot(idx, response.error_message);
                self.admit_next();
            }
            Verdict::InProgress => {
                let max = self.config.retry.max_retries;
                let SlotState::Verifying { retries, .. } = &mut self.slots[idx].state else {
                    return;
                };
                *retries += 1;
                if *retries > max {
                    warn!(slot = %slot, retries = *retries, "verification timed out");
                    self.fail_slot(idx, None);
                    self.admit_next();
                } else {
                    self.jobs.push(Job::Poll {
                        slot,
                        reference: reference.to_string(),
                        delay,
                    });
                }
            }
        }
    }

    /// Marks a verified slot uploaded, announces it and frees the queue.
    fn settle_uploaded(&mut self, idx: usize) {
        let slot = &self.slots[idx];
        let id = slot.id;
        let ordinal = slot.ordinal;
        let (Some(file_name), Some(reference)) = (
            slot.file_name().map(str::to_owned),
            slot.reference().map(str::to_owned),
        ) else {
            return;
        };

        info!(slot = %id, reference = %reference, file = %file_name, "file uploaded");
        let text = self.render(&self.config.messages.uploaded, ordinal, &file_name);
        self.slots[idx].provision = Provision::None;
        self.set_state(
            idx,
            SlotState::Uploaded {
                file_name,
                reference,
            },
        );
        self.notify(text);
        self.jobs.push(Job::CheckDuplicates);
        self.admit_next();
    }
}
