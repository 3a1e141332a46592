// Invocation & Supervisor Configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

/// One child process to supervise: `program [flags...] input`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub flags: Vec<String>,
    pub input: PathBuf,
    pub timeout: Duration,
}

impl Invocation {
    /// Command-line arguments passed to the program
    pub fn args(&self) -> Vec<String> {
        let mut args = self.flags.clone();
        args.push(self.input.to_string_lossy().into_owned());
        args
    }

    /// Human-readable command line, for logs
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.clone())
            .chain(self.args())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Supervisor configuration assembled by the composition root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Driver executable looked up on PATH
    pub program: String,
    /// Wall-clock budget for the whole run
    pub timeout: Duration,
    /// Compile the input for a 32-bit target (`-m32`)
    pub is_32bit: bool,
}

impl SupervisorConfig {
    /// Toolchain flags derived from the configuration
    pub fn flags(&self) -> Vec<String> {
        let mut flags = Vec::new();
        if self.is_32bit {
            flags.push("-m32".to_string());
        }
        flags
    }

    pub fn invocation(&self, input: impl AsRef<Path>) -> Invocation {
        Invocation {
            program: self.program.clone(),
            flags: self.flags(),
            input: input.as_ref().to_path_buf(),
            timeout: self.timeout,
        }
    }
}
