// Analyzer Process Port
// Abstraction over one running analyser child and the launcher that spawns it

use crate::domain::Invocation;
use async_trait::async_trait;
use thiserror::Error;

/// Which output channel of the child a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl std::fmt::Display for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputStream::Stdout => write!(f, "stdout"),
            OutputStream::Stderr => write!(f, "stderr"),
        }
    }
}

/// Next thing that happened to the child
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// One line, stripped of surrounding whitespace
    Line { stream: OutputStream, text: String },
    /// Both streams hit EOF and the child was reaped
    Exited { code: Option<i32> },
}

impl ProcessEvent {
    pub fn stdout(text: impl Into<String>) -> Self {
        ProcessEvent::Line {
            stream: OutputStream::Stdout,
            text: text.into(),
        }
    }

    pub fn stderr(text: impl Into<String>) -> Self {
        ProcessEvent::Line {
            stream: OutputStream::Stderr,
            text: text.into(),
        }
    }
}

/// Process errors
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Process kill failed: {0}")]
    Killed(String),
}

/// A running analyser child.
///
/// Dropping a session must not leave the child running.
#[async_trait]
pub trait AnalyzerSession: Send {
    /// OS process id, if the child is still known
    fn pid(&self) -> Option<u32>;

    /// Read the first stderr line, before multiplexing starts.
    ///
    /// Returns `Ok(None)` when stderr closes without a line.
    async fn handshake_line(&mut self) -> Result<Option<String>, ProcessError>;

    /// Wait for the next line on either stream, or for the child to finish.
    ///
    /// Must be cancel-safe: the supervisor drops this future when its
    /// budget runs out. Once `Exited` was returned it keeps returning it.
    async fn next_event(&mut self) -> Result<ProcessEvent, ProcessError>;

    /// Read whatever is left on both streams until EOF
    async fn drain(&mut self) -> Result<Vec<(OutputStream, String)>, ProcessError>;

    /// Forcefully stop the child and reap it. Idempotent.
    async fn kill(&mut self) -> Result<(), ProcessError>;
}

/// Spawns analyser children
///
/// Implementations:
/// - SubprocessLauncher: tokio child process with piped output
/// - mocks::ScriptedLauncher: replays a fixed transcript
#[async_trait]
pub trait AnalyzerLauncher: Send + Sync {
    /// Spawn the child described by `invocation`
    ///
    /// # Errors
    /// - ProcessError::SpawnFailed if the program cannot be started
    async fn launch(
        &self,
        invocation: &Invocation,
    ) -> Result<Box<dyn AnalyzerSession>, ProcessError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// What a scripted child prints, in order
    #[derive(Debug, Clone, Default)]
    pub struct Transcript {
        pub handshake: Option<String>,
        pub events: Vec<ProcessEvent>,
        /// Block forever once the events run out instead of exiting
        pub hang: bool,
    }

    impl Transcript {
        pub fn new(handshake: impl Into<String>) -> Self {
            Self {
                handshake: Some(handshake.into()),
                ..Default::default()
            }
        }

        /// A child that never writes anything
        pub fn silent() -> Self {
            Self {
                hang: true,
                ..Default::default()
            }
        }

        pub fn stdout(mut self, text: impl Into<String>) -> Self {
            self.events.push(ProcessEvent::stdout(text));
            self
        }

        pub fn stderr(mut self, text: impl Into<String>) -> Self {
            self.events.push(ProcessEvent::stderr(text));
            self
        }

        pub fn exit(mut self, code: i32) -> Self {
            self.events.push(ProcessEvent::Exited { code: Some(code) });
            self
        }

        pub fn then_hang(mut self) -> Self {
            self.hang = true;
            self
        }
    }

    /// Session replaying a [`Transcript`]
    pub struct ScriptedSession {
        handshake: Option<String>,
        events: VecDeque<ProcessEvent>,
        hang: bool,
        alive: bool,
        kills: Arc<AtomicUsize>,
    }

    impl ScriptedSession {
        pub fn new(transcript: Transcript, kills: Arc<AtomicUsize>) -> Self {
            Self {
                handshake: transcript.handshake,
                events: transcript.events.into(),
                hang: transcript.hang,
                alive: true,
                kills,
            }
        }
    }

    #[async_trait]
    impl AnalyzerSession for ScriptedSession {
        fn pid(&self) -> Option<u32> {
            self.alive.then_some(4242)
        }

        async fn handshake_line(&mut self) -> Result<Option<String>, ProcessError> {
            match self.handshake.take() {
                Some(line) => Ok(Some(line)),
                None if self.hang => std::future::pending().await,
                None => Ok(None),
            }
        }

        async fn next_event(&mut self) -> Result<ProcessEvent, ProcessError> {
            if !self.alive {
                return Ok(ProcessEvent::Exited { code: None });
            }
            match self.events.pop_front() {
                Some(event @ ProcessEvent::Exited { .. }) => {
                    self.events.clear();
                    self.events.push_back(event.clone());
                    Ok(event)
                }
                Some(event) => Ok(event),
                None if self.hang => std::future::pending().await,
                None => Ok(ProcessEvent::Exited { code: Some(0) }),
            }
        }

        async fn drain(&mut self) -> Result<Vec<(OutputStream, String)>, ProcessError> {
            let lines = self
                .events
                .drain(..)
                .filter_map(|event| match event {
                    ProcessEvent::Line { stream, text } => Some((stream, text)),
                    ProcessEvent::Exited { .. } => None,
                })
                .collect();
            Ok(lines)
        }

        async fn kill(&mut self) -> Result<(), ProcessError> {
            if self.alive {
                self.alive = false;
                self.kills.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    /// Launcher handing out [`ScriptedSession`]s
    pub struct ScriptedLauncher {
        transcript: Transcript,
        spawn_error: Option<String>,
        launches: Mutex<Vec<String>>,
        kills: Arc<AtomicUsize>,
    }

    impl ScriptedLauncher {
        pub fn new(transcript: Transcript) -> Self {
            Self {
                transcript,
                spawn_error: None,
                launches: Mutex::new(Vec::new()),
                kills: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn new_spawn_failure(message: impl Into<String>) -> Self {
            Self {
                spawn_error: Some(message.into()),
                ..Self::new(Transcript::default())
            }
        }

        /// Command lines of every launch so far
        pub fn launches(&self) -> Vec<String> {
            self.launches.lock().unwrap().clone()
        }

        /// Number of sessions that were killed
        pub fn kill_count(&self) -> usize {
            self.kills.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AnalyzerLauncher for ScriptedLauncher {
        async fn launch(
            &self,
            invocation: &Invocation,
        ) -> Result<Box<dyn AnalyzerSession>, ProcessError> {
            self.launches
                .lock()
                .unwrap()
                .push(invocation.command_line());

            if let Some(message) = &self.spawn_error {
                return Err(ProcessError::SpawnFailed(message.clone()));
            }

            Ok(Box::new(ScriptedSession::new(
                self.transcript.clone(),
                Arc::clone(&self.kills),
            )))
        }
    }
}
