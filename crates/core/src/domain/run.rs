// Run Outcome Domain Model

use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use super::error::DomainError;
use super::finding::Finding;

/// Terminal outcome of one supervised run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// The tool reached its completion marker
    Ok,
    /// The wall-clock budget ran out
    Timeout,
    /// The tool gave up soundness on some construct
    Unknown,
    /// The tool failed to start, emitted an unexplained error or died early
    Error,
}

impl RunStatus {
    pub fn as_token(&self) -> &'static str {
        match self {
            RunStatus::Ok => "ok",
            RunStatus::Timeout => "timeout",
            RunStatus::Unknown => "unknown",
            RunStatus::Error => "error",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

impl FromStr for RunStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(RunStatus::Ok),
            "timeout" => Ok(RunStatus::Timeout),
            "unknown" => Ok(RunStatus::Unknown),
            "error" => Ok(RunStatus::Error),
            other => Err(DomainError::UnknownRunStatus(other.to_string())),
        }
    }
}

/// Status plus the deduplicated finding set of one run.
///
/// Findings survive only for `RunStatus::Ok`; every other constructor
/// yields an empty set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResult {
    pub status: RunStatus,
    #[serde(serialize_with = "serialize_sorted")]
    pub findings: HashSet<Finding>,
}

impl RunResult {
    pub fn ok(findings: HashSet<Finding>) -> Self {
        Self {
            status: RunStatus::Ok,
            findings,
        }
    }

    pub fn timeout() -> Self {
        Self::empty(RunStatus::Timeout)
    }

    pub fn unknown() -> Self {
        Self::empty(RunStatus::Unknown)
    }

    pub fn error() -> Self {
        Self::empty(RunStatus::Error)
    }

    fn empty(status: RunStatus) -> Self {
        Self {
            status,
            findings: HashSet::new(),
        }
    }

    /// Findings in `(row, column, kind)` order, for stable rendering
    pub fn sorted_findings(&self) -> Vec<Finding> {
        let mut findings: Vec<Finding> = self.findings.iter().copied().collect();
        findings.sort();
        findings
    }
}

fn serialize_sorted<S: Serializer>(
    findings: &HashSet<Finding>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut sorted: Vec<&Finding> = findings.iter().collect();
    sorted.sort();
    sorted.serialize(serializer)
}
