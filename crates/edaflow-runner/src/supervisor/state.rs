//! Supervision state machine.

use std::fmt;

/// Lifecycle of one supervised unit of work.
///
/// ```text
/// NotStarted ──predicate holds──────────────▶ Succeeded
///     │
///   spawn
///     ▼
///  Running ──exit, predicate holds──────────▶ Succeeded
///     │    ──exit, predicate false──────────▶ FailedPredicate
///     └────deadline passed, terminated──────▶ FailedTimeout
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SupervisionState {
    #[default]
    NotStarted,
    Running {
        pid: Option<u32>,
    },
    Succeeded,
    FailedTimeout,
    FailedPredicate,
}

impl SupervisionState {
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::FailedTimeout | Self::FailedPredicate
        )
    }

    pub const fn is_failure(self) -> bool {
        matches!(self, Self::FailedTimeout | Self::FailedPredicate)
    }

    /// Whether `next` is a legal successor of `self`.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::NotStarted, Self::Running { .. } | Self::Succeeded)
                | (
                    Self::Running { .. },
                    Self::Succeeded | Self::FailedTimeout | Self::FailedPredicate
                )
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Running { .. } => "running",
            Self::Succeeded => "succeeded",
            Self::FailedTimeout => "failed_timeout",
            Self::FailedPredicate => "failed_predicate",
        }
    }
}

impl fmt::Display for SupervisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_circuit_skips_running() {
        assert!(SupervisionState::NotStarted.can_transition_to(SupervisionState::Succeeded));
        assert!(
            !SupervisionState::NotStarted.can_transition_to(SupervisionState::FailedPredicate)
        );
    }

    #[test]
    fn terminal_states_are_final() {
        for s in [
            SupervisionState::Succeeded,
            SupervisionState::FailedTimeout,
            SupervisionState::FailedPredicate,
        ] {
            assert!(s.is_terminal());
            assert!(!s.can_transition_to(SupervisionState::Running { pid: None }));
        }
        assert!(!SupervisionState::Running { pid: Some(1) }.is_terminal());
    }
}
