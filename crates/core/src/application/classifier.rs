// Diagnostic Classifier
// Maps one line of analyser output to the located findings it reports

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::domain::{Finding, FindingKind};

/// Lines carrying this token are supplementary traces, never findings
pub const TRACE_MARKER: &str = "TRACE";

/// Diagnostic shapes the tool prints, searched anywhere in a line.
///
/// This table is the only source of kind membership. A line matching several
/// entries reports the union of their kinds.
pub const DIAGNOSTIC_PATTERNS: &[(&str, &[FindingKind])] = &[
    (
        r": error: dereference of already deleted heap object",
        &[FindingKind::InvalidAccess],
    ),
    (
        r": error: dereferencing object of size [0-9]*B out of bounds",
        &[FindingKind::InvalidAccess],
    ),
    (r": error: dereference of NULL value", &[FindingKind::InvalidAccess]),
    (r": error: invalid dereference", &[FindingKind::InvalidAccess]),
    (
        r": error: dereference of non-existing non-heap object",
        &[FindingKind::InvalidAccess],
    ),
    (
        r": error: not enough space to store value of a pointer",
        &[FindingKind::InvalidAccess],
    ),
    (r": error: invalid L-value", &[FindingKind::InvalidAccess]),
    (
        r": error: (free|realloc)\(\) called with offset",
        &[FindingKind::FreeError],
    ),
    (r": error: invalid free\(\)", &[FindingKind::FreeError]),
    (r": error: double free", &[FindingKind::FreeError]),
    (
        r": error: attempt to free a non-existing non-heap object",
        &[FindingKind::FreeError],
    ),
    (
        r": error: attempt to free a non-heap object",
        &[FindingKind::FreeError],
    ),
    (
        r": error: (free|realloc)\(\) called on non-pointer value",
        &[FindingKind::FreeError],
    ),
    (r": (error|warning): memory leak detected", &[FindingKind::Leak]),
];

static BUILTIN: Lazy<Classifier> = Lazy::new(|| {
    Classifier::with_patterns(DIAGNOSTIC_PATTERNS).expect("valid diagnostic regex")
});

/// Outcome of classifying a single line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Located findings; empty when the location could not be parsed
    pub findings: HashSet<Finding>,
    /// The line is a trace and was skipped
    pub is_trace: bool,
}

/// Compiled diagnostic pattern table
#[derive(Debug, Clone)]
pub struct Classifier {
    patterns: Vec<(Regex, Vec<FindingKind>)>,
}

impl Classifier {
    /// Compile a custom table (e.g. the built-in one plus extra entries)
    ///
    /// # Example
    /// ```text
    /// let mut table = DIAGNOSTIC_PATTERNS.to_vec();
    /// table.push((r": error: stack overflow", &[FindingKind::InvalidAccess]));
    /// let classifier = Classifier::with_patterns(&table)?;
    /// ```
    pub fn with_patterns(table: &[(&str, &[FindingKind])]) -> Result<Self, regex::Error> {
        let patterns = table
            .iter()
            .map(|(pattern, kinds)| Ok((Regex::new(pattern)?, kinds.to_vec())))
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { patterns })
    }

    /// Classifier over [`DIAGNOSTIC_PATTERNS`]
    pub fn builtin() -> &'static Classifier {
        &BUILTIN
    }

    /// Classify one line. Total: unparsable lines yield no findings.
    pub fn classify(&self, line: &str) -> Classification {
        if line.contains(TRACE_MARKER) {
            return Classification {
                is_trace: true,
                ..Default::default()
            };
        }

        let kinds: Vec<FindingKind> = self
            .patterns
            .iter()
            .filter(|(regex, _)| regex.is_match(line))
            .flat_map(|(_, kinds)| kinds.iter().copied())
            .collect();

        if kinds.is_empty() {
            return Classification::default();
        }

        let findings = match parse_location(line) {
            Some((row, column)) => kinds
                .into_iter()
                .filter_map(|kind| Finding::new(row, column, kind))
                .collect(),
            None => HashSet::new(),
        };

        Classification {
            findings,
            is_trace: false,
        }
    }

    /// Findings reported by `line`
    pub fn findings(&self, line: &str) -> HashSet<Finding> {
        self.classify(line).findings
    }
}

impl Default for Classifier {
    fn default() -> Self {
        BUILTIN.clone()
    }
}

/// Findings reported by `line`, using the built-in table
pub fn classify(line: &str) -> HashSet<Finding> {
    Classifier::builtin().findings(line)
}

/// `file:row: sev: msg` or `file:row:col: sev: msg`
fn parse_location(line: &str) -> Option<(u32, Option<u32>)> {
    let fields: Vec<&str> = line.split(':').collect();
    match fields.as_slice() {
        [_, row, _, _] => Some((parse_coordinate(row)?, None)),
        [_, row, column, _, _] => Some((parse_coordinate(row)?, Some(parse_coordinate(column)?))),
        _ => None,
    }
}

fn parse_coordinate(field: &str) -> Option<u32> {
    field.trim().parse().ok()
}
