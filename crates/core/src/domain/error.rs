// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid supervisor state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Unknown finding kind: {0}")]
    UnknownFindingKind(String),

    #[error("Unknown run status: {0}")]
    UnknownRunStatus(String),

    #[error("Malformed log line {line_no}: {line}")]
    MalformedLogLine { line_no: usize, line: String },
}

pub type Result<T> = std::result::Result<T, DomainError>;
