use heapless::Vec;
use log::{info, warn};
use statig::blocking::IntoStateMachineExt as _;

use crate::config::PROVISION_CHUNK_MAX;
use crate::store::ConfigStorage;

use super::actions::{DispatchStatus, FramingError, SessionError, SessionStep};
use super::events::{PayloadChunk, SessionEvent};
use super::machine::{DispatchContext, SessionMachine};
use super::record::ProvisioningRecord;
use super::types::SessionPhase;

/// One provisioning exchange, from the first body byte to the restart
/// decision. Owned by the task that serves the portal.
pub struct ProvisioningSession {
    machine: statig::blocking::StateMachine<SessionMachine>,
}

impl Default for ProvisioningSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ProvisioningSession {
    pub fn new() -> Self {
        Self {
            machine: SessionMachine::new().state_machine(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.machine.inner().phase
    }

    pub fn received(&self) -> usize {
        self.machine.inner().payload.len()
    }

    pub fn record(&self) -> Option<&ProvisioningRecord> {
        self.machine.inner().record.as_ref()
    }

    /// Feeds body bytes starting at `offset` of a `total`-byte payload.
    /// Validation and persistence run as soon as the last byte arrives.
    pub fn submit_chunk<C>(
        &mut self,
        store: &mut C,
        offset: usize,
        total: usize,
        data: &[u8],
    ) -> SessionStep
    where
        C: ConfigStorage + ?Sized,
    {
        if self.phase().is_terminal() {
            return SessionStep::Ignored;
        }

        let mut position = offset;
        let mut pieces = data.chunks(PROVISION_CHUNK_MAX);
        let mut piece = pieces.next().unwrap_or(&[]);
        loop {
            let Ok(bytes) = Vec::from_slice(piece) else {
                return SessionStep::Rejected(SessionError::Framing(FramingError::Overrun));
            };
            let chunk = PayloadChunk {
                offset: position,
                total,
                bytes,
            };
            position += piece.len();

            match self.dispatch(SessionEvent::Chunk(chunk)) {
                DispatchStatus::Accepted => {}
                DispatchStatus::PayloadReady => return self.finish(store),
                DispatchStatus::Rejected(err) => {
                    warn!("provisioning: {}", err);
                    return SessionStep::Rejected(err);
                }
                _ => return SessionStep::Ignored,
            }

            match pieces.next() {
                Some(next) => piece = next,
                None => return SessionStep::NeedMore,
            }
        }
    }

    /// Drops a partial payload, e.g. when the peer disconnects mid-body.
    pub fn abandon_input(&mut self) {
        let partial = self.received();
        if self.dispatch(SessionEvent::Discard) == DispatchStatus::Discarded && partial > 0 {
            info!("provisioning: discarded {} bytes of partial payload", partial);
        }
    }

    fn finish<C>(&mut self, store: &mut C) -> SessionStep
    where
        C: ConfigStorage + ?Sized,
    {
        if let DispatchStatus::Rejected(err) = self.dispatch(SessionEvent::Validate) {
            warn!("provisioning: submission rejected: {}", err);
            return SessionStep::Rejected(err);
        }

        let result = match self.record() {
            Some(record) => {
                info!("provisioning: saving configuration\n{}", record.summary());
                record.persist(store)
            }
            None => return SessionStep::Ignored,
        };

        let event = match result {
            Ok(()) => SessionEvent::PersistSucceeded,
            Err(err) => SessionEvent::PersistFailed(err),
        };
        match self.dispatch(event) {
            DispatchStatus::Persisted => {
                info!("provisioning: configuration saved");
                SessionStep::Restart
            }
            DispatchStatus::Rejected(err) => {
                warn!("provisioning: {}", err);
                SessionStep::Rejected(err)
            }
            _ => SessionStep::Ignored,
        }
    }

    fn dispatch(&mut self, event: SessionEvent) -> DispatchStatus {
        let mut context = DispatchContext::default();
        self.machine.handle_with_context(&event, &mut context);
        context.status
    }
}
