use core::fmt;

use crate::store::StoreError;

use super::fields::FieldError;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FramingError {
    UnexpectedOffset,
    TotalChanged,
    TooLarge,
    Overrun,
}

impl FramingError {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnexpectedOffset => "chunk offset out of sequence",
            Self::TotalChanged => "payload length changed mid-stream",
            Self::TooLarge => "payload too large",
            Self::Overrun => "chunk runs past payload length",
        }
    }
}

impl fmt::Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a submission did not make it to flash.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SessionError {
    Framing(FramingError),
    Field(FieldError),
    PersistenceFailed(StoreError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Framing(err) => write!(f, "framing: {}", err),
            Self::Field(err) => write!(f, "validation: {}", err),
            Self::PersistenceFailed(err) => write!(f, "persistence failed: {}", err),
        }
    }
}

/// What the transport should do after handing over input.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SessionStep {
    NeedMore,
    Restart,
    Rejected(SessionError),
    Ignored,
}

impl SessionStep {
    /// HTTP reply for a completed body.
    pub const fn reply(self) -> SessionReply {
        match self {
            Self::Restart => SessionReply::new(200, "OK", "OK"),
            Self::Rejected(SessionError::Field(FieldError::MissingRequiredField(_))) => {
                SessionReply::new(400, "Bad Request", "Missing required fields")
            }
            Self::Rejected(SessionError::Field(err)) => {
                SessionReply::new(400, "Bad Request", err.as_str())
            }
            Self::Rejected(SessionError::Framing(FramingError::TooLarge)) => {
                SessionReply::new(413, "Payload Too Large", FramingError::TooLarge.as_str())
            }
            Self::Rejected(SessionError::Framing(err)) => {
                SessionReply::new(400, "Bad Request", err.as_str())
            }
            Self::Rejected(SessionError::PersistenceFailed(_)) => SessionReply::new(
                500,
                "Internal Server Error",
                "Failed to save configuration",
            ),
            Self::NeedMore => SessionReply::new(400, "Bad Request", "incomplete body"),
            Self::Ignored => SessionReply::new(503, "Service Unavailable", "restarting"),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SessionReply {
    pub status: u16,
    pub reason: &'static str,
    pub body: &'static str,
}

impl SessionReply {
    const fn new(status: u16, reason: &'static str, body: &'static str) -> Self {
        Self {
            status,
            reason,
            body,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(super) enum DispatchStatus {
    Accepted,
    PayloadReady,
    Validated,
    Persisted,
    Discarded,
    Rejected(SessionError),
    Ignored,
}
