//! Work queue state definitions
//!
//! A queue sits in exactly one of these states, and the state names the one
//! structure (if any) that currently holds the queue's key.
use serde::Serialize;
use std::fmt;

/// Represents the scheduling state of a single site's work queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueState {
    /// No pending work; held by no register. The next enqueue schedules it.
    Empty,

    /// Key is in the ready FIFO, waiting for a worker
    Ready,

    /// Claimed by exactly one in-flight dispatch
    InProcess,

    /// Serving a politeness delay in the snooze scheduler
    Snoozed,

    /// Parked in a precedence tier until activated
    Inactive,

    /// Over its lifetime budget; excluded from scheduling
    Retired,
}

impl QueueState {
    /// Checks whether moving from this state to `to` is legal
    ///
    /// Activation, claiming, snoozing, parking, and retirement each have exactly
    /// one source state, so an illegal move always signals a bookkeeping bug.
    pub fn can_transition_to(&self, to: QueueState) -> bool {
        use QueueState::*;
        matches!(
            (self, to),
            (Empty, Ready)
                | (Empty, Inactive)
                | (Ready, InProcess)
                | (Ready, Empty)
                | (InProcess, Ready)
                | (InProcess, Snoozed)
                | (InProcess, Inactive)
                | (InProcess, Retired)
                | (InProcess, Empty)
                | (Snoozed, Ready)
                | (Snoozed, Inactive)
                | (Snoozed, Empty)
                | (Inactive, Ready)
                | (Retired, Ready)
                | (Retired, Inactive)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Ready => "ready",
            Self::InProcess => "in-process",
            Self::Snoozed => "snoozed",
            Self::Inactive => "inactive",
            Self::Retired => "retired",
        }
    }
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_requires_ready() {
        assert!(QueueState::Ready.can_transition_to(QueueState::InProcess));
        assert!(!QueueState::Snoozed.can_transition_to(QueueState::InProcess));
        assert!(!QueueState::Inactive.can_transition_to(QueueState::InProcess));
        assert!(!QueueState::Empty.can_transition_to(QueueState::InProcess));
    }

    #[test]
    fn test_retirement_only_from_in_process() {
        assert!(QueueState::InProcess.can_transition_to(QueueState::Retired));
        assert!(!QueueState::Ready.can_transition_to(QueueState::Retired));
        assert!(!QueueState::Snoozed.can_transition_to(QueueState::Retired));
    }

    #[test]
    fn test_retired_can_be_reconsidered() {
        assert!(QueueState::Retired.can_transition_to(QueueState::Ready));
        assert!(QueueState::Retired.can_transition_to(QueueState::Inactive));
        assert!(!QueueState::Retired.can_transition_to(QueueState::Snoozed));
    }

    #[test]
    fn test_display() {
        assert_eq!(QueueState::InProcess.to_string(), "in-process");
        assert_eq!(QueueState::Retired.to_string(), "retired");
    }
}
