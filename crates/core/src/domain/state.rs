// Supervisor State Machine

use serde::{Deserialize, Serialize};

use super::error::{DomainError, Result};
use super::run::RunStatus;

/// Lifecycle of one supervised child
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupervisorState {
    Starting,
    CompilingInput,
    Streaming,
    Completed,
    Unknown,
    Error,
    TimedOut,
}

impl std::fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupervisorState::Starting => write!(f, "STARTING"),
            SupervisorState::CompilingInput => write!(f, "COMPILING_INPUT"),
            SupervisorState::Streaming => write!(f, "STREAMING"),
            SupervisorState::Completed => write!(f, "COMPLETED"),
            SupervisorState::Unknown => write!(f, "UNKNOWN"),
            SupervisorState::Error => write!(f, "ERROR"),
            SupervisorState::TimedOut => write!(f, "TIMED_OUT"),
        }
    }
}

impl SupervisorState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SupervisorState::Completed
                | SupervisorState::Unknown
                | SupervisorState::Error
                | SupervisorState::TimedOut
        )
    }

    /// Run status reported for a terminal state
    pub fn status(&self) -> Option<RunStatus> {
        match self {
            SupervisorState::Completed => Some(RunStatus::Ok),
            SupervisorState::Unknown => Some(RunStatus::Unknown),
            SupervisorState::Error => Some(RunStatus::Error),
            SupervisorState::TimedOut => Some(RunStatus::Timeout),
            _ => None,
        }
    }

    /// Move to `to`, rejecting edges the state machine does not have
    pub fn transition(&mut self, to: SupervisorState) -> Result<()> {
        use SupervisorState::*;

        let allowed = match (*self, to) {
            (Starting, CompilingInput | Error) => true,
            (CompilingInput, Streaming | Error | TimedOut) => true,
            (Streaming, Completed | Unknown | Error | TimedOut) => true,
            _ => false,
        };

        if !allowed {
            return Err(DomainError::InvalidStateTransition {
                from: self.to_string(),
                to: to.to_string(),
            });
        }

        *self = to;
        Ok(())
    }
}
