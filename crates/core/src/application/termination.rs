// Termination Signal Detector
// Decides whether a line ends the streaming phase

use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};

use super::classifier::Classification;

/// Generic severity marker of an error diagnostic
pub const ERROR_MARKER: &str = ": error:";

/// Warnings after which the analysis is no longer sound
pub const UNSUPPORTED_FEATURE_PATTERNS: &[&str] = &[
    r": warning: ignoring call of undefined function: ",
    r": warning: conditional jump depends on uninitialized value",
    r": warning: possible .*flow of .* integer",
];

/// Printed by the tool once its analysis finished
pub const COMPLETION_PATTERN: &str = r"clEasyRun\(\) took";

static UNSUPPORTED_FEATURE: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new(UNSUPPORTED_FEATURE_PATTERNS).expect("valid unsupported-feature regex")
});

static COMPLETION: Lazy<Regex> =
    Lazy::new(|| Regex::new(COMPLETION_PATTERN).expect("valid completion regex"));

/// What a line means for the run as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    /// Keep reading
    None,
    /// Soundness was given up; result is unknown
    UnsupportedFeature,
    /// The tool finished its analysis
    CompletionMarker,
    /// An error the pattern table cannot explain
    UnclassifiedError,
}

impl TerminationSignal {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TerminationSignal::None)
    }
}

/// Classify `line` given what the diagnostic classifier made of it.
///
/// Precedence: unsupported feature, then completion, then unclassified error.
pub fn detect(line: &str, classification: &Classification) -> TerminationSignal {
    if UNSUPPORTED_FEATURE.is_match(line) {
        return TerminationSignal::UnsupportedFeature;
    }

    if COMPLETION.is_match(line) {
        return TerminationSignal::CompletionMarker;
    }

    // Includes known diagnostics whose location could not be placed
    if line.contains(ERROR_MARKER)
        && classification.findings.is_empty()
        && !classification.is_trace
    {
        return TerminationSignal::UnclassifiedError;
    }

    TerminationSignal::None
}
