// Predwrap Infrastructure - System Adapters
// Implements: AnalyzerLauncher, ToolchainProbe

pub mod subprocess_launcher;
pub mod toolchain_probe_impl;

pub use subprocess_launcher::{SubprocessLauncher, SubprocessSession};
pub use toolchain_probe_impl::PathToolchainProbe;
