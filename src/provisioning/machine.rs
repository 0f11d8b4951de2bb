use heapless::Vec;
use statig::prelude::*;

use crate::config::PROVISION_PAYLOAD_MAX;

use super::actions::{DispatchStatus, FramingError, SessionError};
use super::events::{PayloadChunk, SessionEvent};
use super::record::ProvisioningRecord;
use super::types::SessionPhase;

#[derive(Debug)]
pub(super) struct SessionMachine {
    pub(super) phase: SessionPhase,
    pub(super) payload: Vec<u8, PROVISION_PAYLOAD_MAX>,
    pub(super) expected_total: Option<usize>,
    pub(super) record: Option<ProvisioningRecord>,
}

#[derive(Clone, Copy, Debug)]
pub(super) struct DispatchContext {
    pub(super) status: DispatchStatus,
}

impl Default for DispatchContext {
    fn default() -> Self {
        Self {
            status: DispatchStatus::Ignored,
        }
    }
}

impl SessionMachine {
    pub(super) fn new() -> Self {
        Self {
            phase: SessionPhase::AwaitingInput,
            payload: Vec::new(),
            expected_total: None,
            record: None,
        }
    }

    fn reset_payload(&mut self) {
        self.payload.clear();
        self.expected_total = None;
    }

    /// Appends `chunk`; `Ok(true)` once the payload is complete.
    fn accept_chunk(&mut self, chunk: &PayloadChunk) -> Result<bool, FramingError> {
        if chunk.total > PROVISION_PAYLOAD_MAX {
            return Err(FramingError::TooLarge);
        }
        match self.expected_total {
            Some(total) if total != chunk.total => return Err(FramingError::TotalChanged),
            Some(_) => {}
            None => self.expected_total = Some(chunk.total),
        }
        if chunk.offset != self.payload.len() {
            return Err(FramingError::UnexpectedOffset);
        }
        if chunk.offset + chunk.bytes.len() > chunk.total {
            return Err(FramingError::Overrun);
        }
        self.payload
            .extend_from_slice(&chunk.bytes)
            .map_err(|_| FramingError::TooLarge)?;
        Ok(self.payload.len() == chunk.total)
    }
}

#[state_machine(initial = "State::awaiting_input()")]
impl SessionMachine {
    #[state]
    fn awaiting_input(
        &mut self,
        context: &mut DispatchContext,
        event: &SessionEvent,
    ) -> Outcome<State> {
        match event {
            SessionEvent::Chunk(chunk) => match self.accept_chunk(chunk) {
                Ok(true) => {
                    self.phase = SessionPhase::Validating;
                    context.status = DispatchStatus::PayloadReady;
                    Transition(State::validating())
                }
                Ok(false) => {
                    context.status = DispatchStatus::Accepted;
                    Handled
                }
                Err(err) => {
                    self.reset_payload();
                    context.status = DispatchStatus::Rejected(SessionError::Framing(err));
                    Handled
                }
            },
            SessionEvent::Discard => {
                self.reset_payload();
                context.status = DispatchStatus::Discarded;
                Handled
            }
            _ => {
                context.status = DispatchStatus::Ignored;
                Handled
            }
        }
    }

    #[state]
    fn validating(&mut self, context: &mut DispatchContext, event: &SessionEvent) -> Outcome<State> {
        match event {
            SessionEvent::Validate => {
                let parsed = ProvisioningRecord::from_payload(&self.payload);
                self.reset_payload();
                match parsed {
                    Ok(record) => {
                        self.record = Some(record);
                        self.phase = SessionPhase::Persisting;
                        context.status = DispatchStatus::Validated;
                        Transition(State::persisting())
                    }
                    Err(err) => {
                        self.record = None;
                        self.phase = SessionPhase::AwaitingInput;
                        context.status = DispatchStatus::Rejected(SessionError::Field(err));
                        Transition(State::awaiting_input())
                    }
                }
            }
            _ => {
                context.status = DispatchStatus::Ignored;
                Handled
            }
        }
    }

    #[state]
    fn persisting(&mut self, context: &mut DispatchContext, event: &SessionEvent) -> Outcome<State> {
        match event {
            SessionEvent::PersistSucceeded => {
                self.phase = SessionPhase::RestartPending;
                context.status = DispatchStatus::Persisted;
                Transition(State::restart_pending())
            }
            SessionEvent::PersistFailed(err) => {
                self.record = None;
                self.phase = SessionPhase::AwaitingInput;
                context.status =
                    DispatchStatus::Rejected(SessionError::PersistenceFailed(*err));
                Transition(State::awaiting_input())
            }
            _ => {
                context.status = DispatchStatus::Ignored;
                Handled
            }
        }
    }

    #[state]
    fn restart_pending(&mut self, context: &mut DispatchContext) -> Outcome<State> {
        context.status = DispatchStatus::Ignored;
        Handled
    }
}
