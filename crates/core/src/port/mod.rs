// Port Layer - Interfaces for external dependencies

pub mod analyzer;
pub mod result_persister;
pub mod toolchain_probe;

// Re-exports
pub use analyzer::{
    AnalyzerLauncher, AnalyzerSession, OutputStream, ProcessError, ProcessEvent,
};
pub use result_persister::ResultPersister;
pub use toolchain_probe::ToolchainProbe;
