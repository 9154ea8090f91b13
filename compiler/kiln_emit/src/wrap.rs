//! States of the Before/After/AfterError wrapping protocol.

use std::fmt;

/// Where a wrapped call ended up.
///
/// Every path through a wrapping body marks exactly one final state:
///
/// ```text
/// NotStarted ─ Before=false ──────────────────────────▶ Vetoed
///     │
///     └─ Before=true ─▶ wrapped call ─ ok ────────────▶ Succeeded
///                            │
///                            └─ fault ─ AfterError=false ▶ FailedSuppressed
///                                     └ AfterError=true  ▶ FailedPropagating
///                                       (or no AfterError)
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum WrapState {
    /// No wrapping body ran (or it has not reached a decision yet).
    #[default]
    NotStarted,
    /// `Before` returned `false`: wrapped call and `After` skipped.
    Vetoed,
    /// The wrapped call returned normally.
    Succeeded,
    /// The wrapped call faulted and `AfterError` suppressed it.
    FailedSuppressed,
    /// The wrapped call faulted and the fault was rethrown.
    FailedPropagating,
}

impl WrapState {
    /// Whether the state is final for the call.
    pub fn is_final(self) -> bool {
        !matches!(self, WrapState::NotStarted)
    }

    /// Whether the caller observes a fault.
    pub fn propagates(self) -> bool {
        matches!(self, WrapState::FailedPropagating)
    }
}

impl fmt::Display for WrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WrapState::NotStarted => "not-started",
            WrapState::Vetoed => "vetoed",
            WrapState::Succeeded => "succeeded",
            WrapState::FailedSuppressed => "failed-suppressed",
            WrapState::FailedPropagating => "failed-propagating",
        })
    }
}
