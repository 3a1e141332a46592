// Subprocess launcher implementation
// reason: tokio::process for async pipes, nix for process-group kill
use async_trait::async_trait;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use predwrap_core::application::supervisor::constants::{KILL_REAP_TIMEOUT, MAX_LINE_BYTES};
use predwrap_core::domain::Invocation;
use predwrap_core::port::{
    AnalyzerLauncher, AnalyzerSession, OutputStream, ProcessError, ProcessEvent,
};

/// How long to keep reading after the child exited while a grandchild
/// still holds the pipes open (100ms)
const EXIT_DRAIN_GRACE: Duration = Duration::from_millis(100);

/// Spawns the analyser as a tokio child process
///
/// The child gets its own process group so that killing it also takes down
/// the compiler and analyser processes the driver script starts.
pub struct SubprocessLauncher {
    reap_timeout: Duration,
}

impl SubprocessLauncher {
    pub fn new() -> Self {
        Self {
            reap_timeout: KILL_REAP_TIMEOUT,
        }
    }

    /// Spawn the child and wire up both output pipes
    pub fn spawn(&self, invocation: &Invocation) -> Result<SubprocessSession, ProcessError> {
        let mut command = Command::new(&invocation.program);
        command
            .args(invocation.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .spawn()
            .map_err(|e| ProcessError::SpawnFailed(format!("{}: {}", invocation.program, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProcessError::Io("stdout was not piped".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ProcessError::Io("stderr was not piped".to_string()))?;

        info!(
            pid = ?child.id(),
            command = %invocation.command_line(),
            "Spawned analyser"
        );

        Ok(SubprocessSession::new(child, stdout, stderr, self.reap_timeout))
    }
}

impl Default for SubprocessLauncher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalyzerLauncher for SubprocessLauncher {
    async fn launch(
        &self,
        invocation: &Invocation,
    ) -> Result<Box<dyn AnalyzerSession>, ProcessError> {
        Ok(Box::new(self.spawn(invocation)?))
    }
}

/// Line reader that survives being cancelled mid-line.
///
/// Partial bytes stay in `buf` until the rest of the line arrives. A line
/// longer than `max_line` bytes is handed out in pieces. Invalid UTF-8 is
/// replaced rather than failing the run.
struct LineReader<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
    max_line: usize,
    eof: bool,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    fn new(inner: R) -> Self {
        Self::with_max_line(inner, MAX_LINE_BYTES)
    }

    fn with_max_line(inner: R, max_line: usize) -> Self {
        Self {
            reader: BufReader::new(inner),
            buf: Vec::new(),
            max_line: max_line.max(1),
            eof: false,
        }
    }

    async fn next_line(&mut self) -> io::Result<Option<String>> {
        let limit = self.max_line.saturating_sub(self.buf.len()) as u64;
        if limit > 0 {
            let read = (&mut self.reader)
                .take(limit)
                .read_until(b'\n', &mut self.buf)
                .await?;
            if read == 0 && self.buf.is_empty() {
                self.eof = true;
                return Ok(None);
            }
        }
        if self.buf.len() >= self.max_line && self.buf.last() != Some(&b'\n') {
            debug!(max_line = self.max_line, "Splitting overlong output line");
        }
        let line = String::from_utf8_lossy(&self.buf).trim().to_string();
        self.buf.clear();
        Ok(Some(line))
    }
}

/// Next line from whichever stream has one; `None` once both hit EOF
async fn read_either(
    stdout: &mut LineReader<ChildStdout>,
    stderr: &mut LineReader<ChildStderr>,
) -> io::Result<Option<(OutputStream, String)>> {
    loop {
        if stdout.eof && stderr.eof {
            return Ok(None);
        }
        tokio::select! {
            line = stdout.next_line(), if !stdout.eof => {
                if let Some(text) = line? {
                    return Ok(Some((OutputStream::Stdout, text)));
                }
            }
            line = stderr.next_line(), if !stderr.eof => {
                if let Some(text) = line? {
                    return Ok(Some((OutputStream::Stderr, text)));
                }
            }
        }
    }
}

fn io_error(e: io::Error) -> ProcessError {
    ProcessError::Io(e.to_string())
}

/// One running analyser child
pub struct SubprocessSession {
    child: Child,
    pid: Option<u32>,
    stdout: LineReader<ChildStdout>,
    stderr: LineReader<ChildStderr>,
    /// Set once the child was reaped
    status: Option<ExitStatus>,
    /// Set once `Exited` was reported
    finished: bool,
    reap_timeout: Duration,
}

impl SubprocessSession {
    fn new(child: Child, stdout: ChildStdout, stderr: ChildStderr, reap_timeout: Duration) -> Self {
        let pid = child.id();
        Self {
            child,
            pid,
            stdout: LineReader::new(stdout),
            stderr: LineReader::new(stderr),
            status: None,
            finished: false,
            reap_timeout,
        }
    }

    fn exited(&mut self) -> ProcessEvent {
        self.finished = true;
        ProcessEvent::Exited {
            code: self.status.and_then(|s| s.code()),
        }
    }

    /// False once the child was reaped and no helper still holds its pipes.
    ///
    /// The group is then empty and its id may already belong to someone else.
    fn group_may_be_alive(&self) -> bool {
        self.status.is_none() || !(self.stdout.eof && self.stderr.eof)
    }

    /// SIGKILL the whole process group of the child
    #[cfg(unix)]
    fn kill_group(&self) {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = self.pid {
            match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                Ok(()) => debug!(pid = %pid, "Sent SIGKILL to analyser process group"),
                Err(nix::errno::Errno::ESRCH) => {}
                Err(e) => warn!(pid = %pid, error = %e, "killpg failed"),
            }
        }
    }

    #[cfg(not(unix))]
    fn kill_group(&self) {}
}

#[async_trait]
impl AnalyzerSession for SubprocessSession {
    fn pid(&self) -> Option<u32> {
        if self.status.is_some() {
            None
        } else {
            self.pid
        }
    }

    async fn handshake_line(&mut self) -> Result<Option<String>, ProcessError> {
        if self.stderr.eof {
            return Ok(None);
        }
        self.stderr.next_line().await.map_err(io_error)
    }

    async fn next_event(&mut self) -> Result<ProcessEvent, ProcessError> {
        if self.finished {
            return Ok(self.exited());
        }

        loop {
            if self.status.is_some() {
                // Grandchildren may hold the pipes open after the child is gone
                return match timeout(
                    EXIT_DRAIN_GRACE,
                    read_either(&mut self.stdout, &mut self.stderr),
                )
                .await
                {
                    Ok(Ok(Some((stream, text)))) => Ok(ProcessEvent::Line { stream, text }),
                    Ok(Ok(None)) | Err(_) => Ok(self.exited()),
                    Ok(Err(e)) => Err(io_error(e)),
                };
            }

            tokio::select! {
                read = read_either(&mut self.stdout, &mut self.stderr) => {
                    match read.map_err(io_error)? {
                        Some((stream, text)) => return Ok(ProcessEvent::Line { stream, text }),
                        None => {
                            let status = self.child.wait().await.map_err(io_error)?;
                            self.status = Some(status);
                        }
                    }
                }
                status = self.child.wait() => {
                    self.status = Some(status.map_err(io_error)?);
                }
            }
        }
    }

    async fn drain(&mut self) -> Result<Vec<(OutputStream, String)>, ProcessError> {
        let mut lines = Vec::new();
        while let Some(line) = read_either(&mut self.stdout, &mut self.stderr)
            .await
            .map_err(io_error)?
        {
            lines.push(line);
        }
        Ok(lines)
    }

    async fn kill(&mut self) -> Result<(), ProcessError> {
        // Helpers may outlive an already reaped child
        if self.group_may_be_alive() {
            self.kill_group();
        }

        if self.status.is_some() {
            return Ok(());
        }

        if let Err(e) = self.child.start_kill() {
            debug!(error = %e, "start_kill on analyser failed");
        }

        match timeout(self.reap_timeout, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!(pid = ?self.pid, status = %status, "Analyser reaped");
                self.status = Some(status);
                Ok(())
            }
            Ok(Err(e)) => Err(ProcessError::Killed(e.to_string())),
            Err(_) => Err(ProcessError::Killed(format!(
                "analyser not reaped within {}ms",
                self.reap_timeout.as_millis()
            ))),
        }
    }
}

impl Drop for SubprocessSession {
    fn drop(&mut self) {
        if self.status.is_none() {
            self.kill_group();
        }
    }
}
