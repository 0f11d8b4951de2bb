#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SessionPhase {
    AwaitingInput,
    Validating,
    Persisting,
    RestartPending,
}

impl SessionPhase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AwaitingInput => "awaiting-input",
            Self::Validating => "validating",
            Self::Persisting => "persisting",
            Self::RestartPending => "restart-pending",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::RestartPending)
    }
}
