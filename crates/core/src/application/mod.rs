// Application Layer - Line classification and run supervision

pub mod classifier;
pub mod supervisor;
pub mod termination;

// Re-exports
pub use classifier::{classify, Classification, Classifier, DIAGNOSTIC_PATTERNS};
pub use supervisor::Supervisor;
pub use termination::{detect, TerminationSignal};
