// Process Supervisor - one analyser run from spawn to terminal state

pub mod constants;

use constants::{HANDSHAKE_COMPILE_MARKER, HANDSHAKE_OK_MARKER};

use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, trace, warn};

use crate::application::classifier::Classifier;
use crate::application::termination::{detect, TerminationSignal};
use crate::domain::{Finding, Invocation, RunResult, RunStatus, SupervisorState};
use crate::error::Result;
use crate::port::{AnalyzerLauncher, AnalyzerSession, ProcessEvent};

/// Supervises a single analyser child
///
/// Drives the state machine `STARTING -> COMPILING_INPUT -> STREAMING ->
/// {COMPLETED, UNKNOWN, ERROR, TIMED_OUT}` and guarantees the child is killed
/// and reaped on every exit path.
pub struct Supervisor {
    launcher: Arc<dyn AnalyzerLauncher>,
    classifier: Classifier,
}

impl Supervisor {
    /// Create a supervisor using the built-in diagnostic table
    ///
    /// # Example
    /// ```ignore
    /// let supervisor = Supervisor::new(Arc::new(SubprocessLauncher::new()));
    /// let result = supervisor.run(&config.invocation("prog.bc")).await?;
    /// ```
    pub fn new(launcher: Arc<dyn AnalyzerLauncher>) -> Self {
        Self::with_classifier(launcher, Classifier::default())
    }

    pub fn with_classifier(launcher: Arc<dyn AnalyzerLauncher>, classifier: Classifier) -> Self {
        Self {
            launcher,
            classifier,
        }
    }

    /// Run the analyser once and return its outcome
    ///
    /// Timeouts, unsupported features and analyser failures are outcomes,
    /// not errors.
    ///
    /// # Errors
    /// - AppError::Domain if the state machine is driven along an invalid edge
    pub async fn run(&self, invocation: &Invocation) -> Result<RunResult> {
        let started = Instant::now();
        let deadline = started + invocation.timeout;
        let mut state = SupervisorState::Starting;

        info!(
            command = %invocation.command_line(),
            timeout_secs = invocation.timeout.as_secs(),
            "Starting analyser"
        );

        let mut session = match self.launcher.launch(invocation).await {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "Failed to start analyser");
                return conclude(&mut state, SupervisorState::Error, HashSet::new());
            }
        };

        let outcome = self.supervise(session.as_mut(), &mut state, deadline).await;

        if let Err(e) = session.kill().await {
            warn!(error = %e, pid = ?session.pid(), "Failed to kill analyser");
        }

        let result = outcome?;
        info!(
            status = %result.status,
            findings = result.findings.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Analyser run finished"
        );
        Ok(result)
    }

    async fn supervise(
        &self,
        session: &mut dyn AnalyzerSession,
        state: &mut SupervisorState,
        deadline: Instant,
    ) -> Result<RunResult> {
        advance(state, SupervisorState::CompilingInput)?;

        let handshake = match timeout_at(deadline, session.handshake_line()).await {
            Ok(Ok(line)) => line,
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to read analyser handshake");
                return conclude(state, SupervisorState::Error, HashSet::new());
            }
            Err(_) => {
                warn!("Timeout while waiting for the analyser to compile its input");
                return conclude(state, SupervisorState::TimedOut, HashSet::new());
            }
        };

        if !is_handshake_ok(handshake.as_deref()) {
            warn!(handshake = ?handshake, "Analyser failed to compile the input file");
            log_remaining_output(session, deadline).await;
            return conclude(state, SupervisorState::Error, HashSet::new());
        }

        debug!(pid = ?session.pid(), "Analyser compiled the input file");
        advance(state, SupervisorState::Streaming)?;

        let mut findings: HashSet<Finding> = HashSet::new();
        loop {
            // A child flooding its streams keeps next_event() ready forever
            if Instant::now() >= deadline {
                warn!("Timeout, killing analyser");
                return conclude(state, SupervisorState::TimedOut, findings);
            }

            let event = match timeout_at(deadline, session.next_event()).await {
                Ok(Ok(event)) => event,
                Ok(Err(e)) => {
                    warn!(error = %e, "Failed to read analyser output");
                    return conclude(state, SupervisorState::Error, findings);
                }
                Err(_) => {
                    warn!("Timeout, killing analyser");
                    return conclude(state, SupervisorState::TimedOut, findings);
                }
            };

            let (stream, line) = match event {
                ProcessEvent::Line { stream, text } => (stream, text),
                ProcessEvent::Exited { code } => {
                    warn!(exit_code = ?code, "Analyser has not finished gracefully");
                    return conclude(state, SupervisorState::Error, findings);
                }
            };

            trace!(%stream, line = %line, "Analyser output");

            let classification = self.classifier.classify(&line);
            findings.extend(classification.findings.iter().copied());

            match detect(&line, &classification) {
                TerminationSignal::None => {}
                TerminationSignal::UnsupportedFeature => {
                    info!(line = %line, "Analyser encountered an unsupported feature, result is unknown");
                    return conclude(state, SupervisorState::Unknown, findings);
                }
                TerminationSignal::UnclassifiedError => {
                    info!(line = %line, "Analyser reported an unknown error");
                    return conclude(state, SupervisorState::Error, findings);
                }
                TerminationSignal::CompletionMarker => {
                    debug!(line = %line, "Analyser finished");
                    return conclude(state, SupervisorState::Completed, findings);
                }
            }
        }
    }
}

fn is_handshake_ok(line: Option<&str>) -> bool {
    line.is_some_and(|l| l.contains(HANDSHAKE_COMPILE_MARKER) && l.contains(HANDSHAKE_OK_MARKER))
}

fn advance(state: &mut SupervisorState, to: SupervisorState) -> Result<()> {
    let from = *state;
    state.transition(to)?;
    debug!(%from, %to, "Supervisor state transition");
    Ok(())
}

/// Enter a terminal state and build its result; findings survive only on success
fn conclude(
    state: &mut SupervisorState,
    to: SupervisorState,
    findings: HashSet<Finding>,
) -> Result<RunResult> {
    advance(state, to)?;
    let result = match state.status() {
        Some(RunStatus::Ok) => RunResult::ok(findings),
        Some(RunStatus::Unknown) => RunResult::unknown(),
        Some(RunStatus::Timeout) => RunResult::timeout(),
        Some(RunStatus::Error) | None => RunResult::error(),
    };
    Ok(result)
}

/// Dump what the child printed after a failed handshake
async fn log_remaining_output(session: &mut dyn AnalyzerSession, deadline: Instant) {
    match timeout_at(deadline, session.drain()).await {
        Ok(Ok(lines)) => {
            for (stream, line) in lines {
                warn!(%stream, line = %line, "Analyser output");
            }
        }
        Ok(Err(e)) => warn!(error = %e, "Failed to drain analyser output"),
        Err(_) => warn!("Timeout while draining analyser output"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FindingKind, SupervisorConfig};
    use crate::port::analyzer::mocks::{ScriptedLauncher, Transcript};
    use std::time::Duration;

    const HANDSHAKE: &str = "Trying to compile foo.bc ... OK";
    const DONE: &str = "clEasyRun() took 0.012 s";

    fn invocation(timeout_secs: u64) -> Invocation {
        SupervisorConfig {
            program: "slllvm".to_string(),
            timeout: Duration::from_secs(timeout_secs),
            is_32bit: false,
        }
        .invocation("foo.bc")
    }

    async fn run(transcript: Transcript) -> (RunResult, Arc<ScriptedLauncher>) {
        let launcher = Arc::new(ScriptedLauncher::new(transcript));
        let supervisor = Supervisor::new(launcher.clone());
        let result = supervisor.run(&invocation(20)).await.unwrap();
        (result, launcher)
    }

    fn finding(row: u32, column: Option<u32>, kind: FindingKind) -> Finding {
        Finding::new(row, column, kind).unwrap()
    }

    #[tokio::test]
    async fn test_completion_keeps_findings() {
        let (result, launcher) = run(Transcript::new(HANDSHAKE)
            .stderr("foo.c:12:3: error: dereference of NULL value")
            .stdout(DONE)
            .then_hang())
        .await;

        assert_eq!(result.status, RunStatus::Ok);
        assert_eq!(
            result.findings,
            HashSet::from([finding(12, Some(3), FindingKind::InvalidAccess)])
        );
        assert_eq!(launcher.kill_count(), 1);
        assert_eq!(launcher.launches(), vec!["slllvm foo.bc"]);
    }

    #[tokio::test]
    async fn test_leak_without_column() {
        let (result, _) = run(Transcript::new(HANDSHAKE)
            .stderr("foo.c:9: error: memory leak detected")
            .stderr(DONE))
        .await;

        assert_eq!(result, RunResult::ok(HashSet::from([finding(9, None, FindingKind::Leak)])));
    }

    #[tokio::test]
    async fn test_duplicates_collapse() {
        let (result, _) = run(Transcript::new(HANDSHAKE)
            .stderr("foo.c:4:1: error: double free")
            .stdout("foo.c:4:1: error: double free")
            .stderr("foo.c:4:1: error: double free [TRACE]")
            .stderr(DONE))
        .await;

        assert_eq!(result.findings.len(), 1);
    }

    #[tokio::test]
    async fn test_clean_run_has_no_findings() {
        let (result, _) = run(Transcript::new(HANDSHAKE).stderr(DONE)).await;
        assert_eq!(result, RunResult::ok(HashSet::new()));
    }

    #[tokio::test]
    async fn test_failed_handshake() {
        let (result, launcher) = run(Transcript::new("Trying to compile foo.bc ... FAILED")
            .stderr("clang: error: no such file or directory: 'foo.bc'")
            .exit(1))
        .await;

        assert_eq!(result, RunResult::error());
        assert_eq!(launcher.kill_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_handshake() {
        let (result, _) = run(Transcript::default().exit(127)).await;
        assert_eq!(result, RunResult::error());
    }

    #[tokio::test]
    async fn test_unsupported_feature_discards_findings() {
        let (result, launcher) = run(Transcript::new(HANDSHAKE)
            .stderr("foo.c:12:3: error: dereference of NULL value")
            .stderr("foo.c:20: warning: ignoring call of undefined function: foo")
            .stderr(DONE)
            .then_hang())
        .await;

        assert_eq!(result, RunResult::unknown());
        assert_eq!(launcher.kill_count(), 1);
    }

    #[tokio::test]
    async fn test_unclassified_error_discards_findings() {
        let (result, _) = run(Transcript::new(HANDSHAKE)
            .stderr("foo.c:9: error: memory leak detected")
            .stderr("foo.c:10:2: error: unsupported instruction")
            .stderr(DONE))
        .await;

        assert_eq!(result, RunResult::error());
    }

    #[tokio::test]
    async fn test_unplaceable_error_fails_run() {
        let (result, launcher) = run(Transcript::new(HANDSHAKE)
            .stderr("foo.c:1:1: error: double free")
            .stderr("foo.c:x:3: error: dereference of NULL value")
            .stderr(DONE)
            .then_hang())
        .await;

        assert_eq!(result, RunResult::error());
        assert_eq!(launcher.kill_count(), 1);
    }

    #[tokio::test]
    async fn test_extra_colon_in_message_fails_run() {
        let (result, _) = run(Transcript::new(HANDSHAKE)
            .stderr("foo.c:12:3: error: invalid free() [in: a:b]")
            .stderr(DONE))
        .await;

        assert_eq!(result, RunResult::error());
    }

    #[tokio::test]
    async fn test_unplaceable_warning_does_not_fail_run() {
        let (result, _) = run(Transcript::new(HANDSHAKE)
            .stderr("foo.c:?: warning: memory leak detected")
            .stderr("foo.c:7:3: error: invalid free()")
            .stderr(DONE))
        .await;

        assert_eq!(
            result,
            RunResult::ok(HashSet::from([finding(7, Some(3), FindingKind::FreeError)]))
        );
    }

    #[tokio::test]
    async fn test_exit_without_completion_marker() {
        let (result, _) = run(Transcript::new(HANDSHAKE)
            .stderr("foo.c:7:3: error: invalid free()")
            .exit(0))
        .await;

        assert_eq!(result, RunResult::error());
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let launcher = Arc::new(ScriptedLauncher::new_spawn_failure("No such file"));
        let supervisor = Supervisor::new(launcher.clone());

        let result = supervisor.run(&invocation(20)).await.unwrap();

        assert_eq!(result, RunResult::error());
        assert_eq!(launcher.kill_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_child_times_out() {
        let launcher = Arc::new(ScriptedLauncher::new(Transcript::silent()));
        let supervisor = Supervisor::new(launcher.clone());

        let started = Instant::now();
        let result = supervisor.run(&invocation(5)).await.unwrap();

        assert_eq!(result, RunResult::timeout());
        assert_eq!(launcher.kill_count(), 1);
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_discards_findings() {
        let (result, launcher) = run(Transcript::new(HANDSHAKE)
            .stderr("foo.c:12:3: error: dereference of NULL value")
            .then_hang())
        .await;

        assert_eq!(result, RunResult::timeout());
        assert_eq!(launcher.kill_count(), 1);
    }

    #[tokio::test]
    async fn test_same_transcript_same_result() {
        let transcript = Transcript::new(HANDSHAKE)
            .stdout("foo.c:3:1: error: double free")
            .stderr("foo.c:9: warning: memory leak detected")
            .stderr(DONE);

        let (first, _) = run(transcript.clone()).await;
        let (second, _) = run(transcript).await;

        assert_eq!(first, second);
        assert_eq!(first.findings.len(), 2);
    }

    #[tokio::test]
    async fn test_custom_table() {
        let mut table = crate::application::classifier::DIAGNOSTIC_PATTERNS.to_vec();
        table.push((r": error: stack smashing", &[FindingKind::InvalidAccess]));
        let classifier = Classifier::with_patterns(&table).unwrap();

        let launcher = Arc::new(ScriptedLauncher::new(
            Transcript::new(HANDSHAKE)
                .stderr("foo.c:2:2: error: stack smashing")
                .stderr(DONE),
        ));
        let supervisor = Supervisor::with_classifier(launcher, classifier);

        let result = supervisor.run(&invocation(20)).await.unwrap();

        assert_eq!(
            result,
            RunResult::ok(HashSet::from([finding(2, Some(2), FindingKind::InvalidAccess)]))
        );
    }
}
