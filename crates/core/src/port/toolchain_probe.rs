// Toolchain Probe Port
// Confirms the driver executable is installed before any run starts

use std::path::PathBuf;

/// Locates executables on the search path
pub trait ToolchainProbe: Send + Sync {
    /// Resolve `executable` to a runnable file, if one exists
    fn locate(&self, executable: &str) -> Option<PathBuf>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;

    /// Probe answering from a fixed table
    #[derive(Default)]
    pub struct StaticToolchainProbe {
        installed: HashMap<String, PathBuf>,
    }

    impl StaticToolchainProbe {
        pub fn with(mut self, executable: &str, path: impl Into<PathBuf>) -> Self {
            self.installed.insert(executable.to_string(), path.into());
            self
        }
    }

    impl ToolchainProbe for StaticToolchainProbe {
        fn locate(&self, executable: &str) -> Option<PathBuf> {
            self.installed.get(executable).cloned()
        }
    }
}
