// Finding Domain Model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::DomainError;

/// Kind of memory-safety fault a diagnostic reports.
///
/// Membership is closed: only the diagnostic pattern table produces kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FindingKind {
    #[serde(rename = "invalid")]
    InvalidAccess,
    #[serde(rename = "free")]
    FreeError,
    #[serde(rename = "leak")]
    Leak,
}

impl FindingKind {
    /// Token used in the persisted log
    pub fn as_token(&self) -> &'static str {
        match self {
            FindingKind::InvalidAccess => "invalid",
            FindingKind::FreeError => "free",
            FindingKind::Leak => "leak",
        }
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

impl FromStr for FindingKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "invalid" => Ok(FindingKind::InvalidAccess),
            "free" => Ok(FindingKind::FreeError),
            "leak" => Ok(FindingKind::Leak),
            other => Err(DomainError::UnknownFindingKind(other.to_string())),
        }
    }
}

/// One located diagnostic.
///
/// Identity is the whole `(row, column, kind)` tuple. A missing column is its
/// own value and never compares equal to a numbered column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Finding {
    row: u32,
    column: Option<u32>,
    kind: FindingKind,
}

impl Finding {
    /// Build a finding from 1-based coordinates.
    ///
    /// Returns `None` for a zero row or a zero column, which the tool never
    /// reports for a real location.
    pub fn new(row: u32, column: Option<u32>, kind: FindingKind) -> Option<Self> {
        if row == 0 || column == Some(0) {
            return None;
        }
        Some(Self { row, column, kind })
    }

    pub fn row(&self) -> u32 {
        self.row
    }

    pub fn column(&self) -> Option<u32> {
        self.column
    }

    pub fn kind(&self) -> FindingKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_zero_coordinates_rejected() {
        assert!(Finding::new(0, None, FindingKind::Leak).is_none());
        assert!(Finding::new(3, Some(0), FindingKind::Leak).is_none());
        assert!(Finding::new(3, Some(1), FindingKind::Leak).is_some());
    }

    #[test]
    fn test_absent_column_is_distinct() {
        let a = Finding::new(7, None, FindingKind::InvalidAccess).unwrap();
        let b = Finding::new(7, Some(1), FindingKind::InvalidAccess).unwrap();
        assert_ne!(a, b);

        let set: HashSet<Finding> = [a, b, a].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_kind_tokens() {
        for kind in [
            FindingKind::InvalidAccess,
            FindingKind::FreeError,
            FindingKind::Leak,
        ] {
            assert_eq!(kind.to_string().parse::<FindingKind>().unwrap(), kind);
        }
        assert_eq!(
            "overflow".parse::<FindingKind>(),
            Err(DomainError::UnknownFindingKind("overflow".to_string()))
        );
    }
}
