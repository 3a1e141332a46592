// PATH-based toolchain probe
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

use predwrap_core::port::ToolchainProbe;

/// Looks executables up the way a shell would, on `PATH`
#[derive(Default)]
pub struct PathToolchainProbe {
    /// Overrides the `PATH` environment variable when set
    search_path: Option<OsString>,
}

impl PathToolchainProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Search `search_path` instead of the process environment
    pub fn with_search_path(search_path: impl Into<OsString>) -> Self {
        Self {
            search_path: Some(search_path.into()),
        }
    }
}

impl ToolchainProbe for PathToolchainProbe {
    fn locate(&self, executable: &str) -> Option<PathBuf> {
        let candidate = Path::new(executable);

        // Explicit paths are checked as given
        if candidate.components().count() > 1 {
            return is_executable(candidate).then(|| candidate.to_path_buf());
        }

        let search_path = self.search_path.clone().or_else(|| env::var_os("PATH"))?;
        let found = env::split_paths(&search_path)
            .map(|dir| dir.join(executable))
            .find(|path| is_executable(path));

        debug!(executable = %executable, found = ?found, "Toolchain lookup");
        found
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn write_file(dir: &Path, name: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    fn test_finds_executable_on_search_path() {
        let dir = tempfile::tempdir().unwrap();
        let tool = write_file(dir.path(), "slllvm", 0o755);

        let probe = PathToolchainProbe::with_search_path(dir.path().as_os_str());

        assert_eq!(probe.locate("slllvm"), Some(tool));
    }

    #[test]
    fn test_skips_non_executable_files() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "slllvm", 0o644);

        let probe = PathToolchainProbe::with_search_path(dir.path().as_os_str());

        assert_eq!(probe.locate("slllvm"), None);
    }

    #[test]
    fn test_earlier_directories_win() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let expected = write_file(first.path(), "slllvm", 0o755);
        write_file(second.path(), "slllvm", 0o755);

        let search_path = env::join_paths([first.path(), second.path()]).unwrap();
        let probe = PathToolchainProbe::with_search_path(search_path);

        assert_eq!(probe.locate("slllvm"), Some(expected));
    }

    #[test]
    fn test_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let tool = write_file(dir.path(), "predator", 0o755);

        let probe = PathToolchainProbe::with_search_path("");

        assert_eq!(probe.locate(tool.to_str().unwrap()), Some(tool.clone()));
        assert_eq!(probe.locate("predator"), None);
    }
}
