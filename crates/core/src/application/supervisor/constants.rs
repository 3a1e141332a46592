// Supervisor constants (no magic values)
use std::time::Duration;

/// Predator driver script looked up on PATH
pub const DEFAULT_TOOL: &str = "slllvm";

/// Default wall-clock budget for one run (20s)
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Default location of the processed log
pub const DEFAULT_LOG_PATH: &str = "predator.log";

/// Both markers must appear on the first stderr line
pub const HANDSHAKE_COMPILE_MARKER: &str = "Trying to compile";
pub const HANDSHAKE_OK_MARKER: &str = "OK";

/// Upper bound on reaping a child after SIGKILL (2s)
pub const KILL_REAP_TIMEOUT: Duration = Duration::from_secs(2);

/// Longest output line kept whole; longer runs are split (64 KiB)
pub const MAX_LINE_BYTES: usize = 64 * 1024;
