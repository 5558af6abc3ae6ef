//! Process Supervisor.
//!
//! Runs one external command and decides success from the filesystem, not
//! from the exit status: batch EDA tools exit 0 without producing anything
//! and exit non-zero after writing a usable checkpoint, so exit and elapsed
//! time only tell the supervisor *when* to look.

mod command;
mod state;

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::{Duration, Instant};

use tokio::process::Child;
use tracing::{debug, info, warn};

pub use command::ToolCommand;
pub use state::SupervisionState;

/// Repeatable filesystem test that says a unit of work is done.
pub trait CompletionCheck {
    fn is_complete(&self) -> bool;

    /// Human-readable description for logs.
    fn describe(&self) -> String {
        "custom completion check".to_string()
    }
}

/// Complete once a single artifact exists.
#[derive(Debug, Clone)]
pub struct ArtifactExists(pub PathBuf);

impl CompletionCheck for ArtifactExists {
    fn is_complete(&self) -> bool {
        self.0.exists()
    }

    fn describe(&self) -> String {
        format!("{} exists", self.0.display())
    }
}

/// Complete once every listed artifact exists.
#[derive(Debug, Clone)]
pub struct AllArtifactsExist(pub Vec<PathBuf>);

impl CompletionCheck for AllArtifactsExist {
    fn is_complete(&self) -> bool {
        self.0.iter().all(|p| p.exists())
    }

    fn describe(&self) -> String {
        format!("{} artifacts exist", self.0.len())
    }
}

impl<F: Fn() -> bool> CompletionCheck for F {
    fn is_complete(&self) -> bool {
        self()
    }
}

/// Timing knobs for one supervised run.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorPolicy {
    /// Wall-clock budget measured from spawn.
    pub deadline: Duration,
    pub poll_interval: Duration,
    /// How long to wait after SIGTERM before killing. Never longer than
    /// `poll_interval`, so a timeout is reported within one poll interval of
    /// the deadline even when the tool traps SIGTERM.
    pub terminate_grace: Duration,
}

impl SupervisorPolicy {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
    pub const DEFAULT_TERMINATE_GRACE: Duration = Duration::from_secs(5);

    pub const fn new(deadline: Duration) -> Self {
        Self {
            deadline,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            terminate_grace: Self::DEFAULT_TERMINATE_GRACE,
        }
    }

    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[must_use]
    pub const fn with_terminate_grace(mut self, grace: Duration) -> Self {
        self.terminate_grace = grace;
        self
    }

    /// Grace actually granted after SIGTERM.
    pub fn effective_grace(&self) -> Duration {
        self.terminate_grace.min(self.poll_interval)
    }
}

/// How a successful supervision ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The predicate held before anything was spawned.
    AlreadyComplete,
    /// The process exited and the predicate held afterwards.
    Completed {
        elapsed: Duration,
        status: ExitStatus,
    },
}

/// Errors from supervising a tool process.
#[derive(Debug, thiserror::Error)]
pub enum SupervisionError {
    #[error("Failed to spawn `{command}` for stage {stage}: {source}")]
    Spawn {
        stage: String,
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Stage {stage} exceeded its deadline of {deadline:?} and was terminated")]
    Timeout { stage: String, deadline: Duration },

    #[error("Stage {stage} exited ({status}) without producing its artifact")]
    ExitedWithoutArtifact { stage: String, status: ExitStatus },

    #[error("Failed to poll stage {stage}: {source}")]
    Wait {
        stage: String,
        #[source]
        source: std::io::Error,
    },
}

impl SupervisionError {
    pub fn stage(&self) -> &str {
        match self {
            Self::Spawn { stage, .. }
            | Self::Timeout { stage, .. }
            | Self::ExitedWithoutArtifact { stage, .. }
            | Self::Wait { stage, .. } => stage,
        }
    }
}

/// Supervises one unit of work through [`SupervisionState`].
#[derive(Debug)]
pub struct Supervisor {
    stage: String,
    policy: SupervisorPolicy,
    state: SupervisionState,
}

impl Supervisor {
    pub fn new(stage: impl Into<String>, policy: SupervisorPolicy) -> Self {
        Self {
            stage: stage.into(),
            policy,
            state: SupervisionState::NotStarted,
        }
    }

    pub const fn state(&self) -> SupervisionState {
        self.state
    }

    fn transition(&mut self, next: SupervisionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal supervision transition {} -> {next}",
            self.state
        );
        debug!(stage = %self.stage, from = %self.state, to = %next, "Supervision state change");
        self.state = next;
    }

    /// Run `command` until `check` holds, the process dies, or the deadline
    /// passes.
    pub async fn run<C>(
        &mut self,
        command: &ToolCommand,
        check: &C,
    ) -> Result<Outcome, SupervisionError>
    where
        C: CompletionCheck + ?Sized,
    {
        if check.is_complete() {
            info!(stage = %self.stage, check = %check.describe(), "Already complete, not spawning");
            self.transition(SupervisionState::Succeeded);
            return Ok(Outcome::AlreadyComplete);
        }

        info!(
            stage = %self.stage,
            command = %command.display(),
            cwd = %command.current_dir.display(),
            deadline_secs = self.policy.deadline.as_secs(),
            "Spawning tool"
        );
        let mut child = command.spawn().map_err(|source| SupervisionError::Spawn {
            stage: self.stage.clone(),
            command: command.display(),
            source,
        })?;
        let started = Instant::now();
        self.transition(SupervisionState::Running { pid: child.id() });

        loop {
            let elapsed = started.elapsed();
            if elapsed >= self.policy.deadline {
                warn!(
                    stage = %self.stage,
                    elapsed_ms = elapsed.as_millis(),
                    "Deadline exceeded, terminating"
                );
                terminate(&mut child, self.policy.effective_grace(), &self.stage).await;
                self.transition(SupervisionState::FailedTimeout);
                return Err(SupervisionError::Timeout {
                    stage: self.stage.clone(),
                    deadline: self.policy.deadline,
                });
            }

            let exited = child.try_wait().map_err(|source| SupervisionError::Wait {
                stage: self.stage.clone(),
                source,
            })?;
            if let Some(status) = exited {
                if check.is_complete() {
                    info!(
                        stage = %self.stage,
                        %status,
                        elapsed_ms = elapsed.as_millis(),
                        "Stage completed"
                    );
                    self.transition(SupervisionState::Succeeded);
                    return Ok(Outcome::Completed { elapsed, status });
                }
                warn!(
                    stage = %self.stage,
                    %status,
                    check = %check.describe(),
                    "Process exited without its artifact"
                );
                self.transition(SupervisionState::FailedPredicate);
                return Err(SupervisionError::ExitedWithoutArtifact {
                    stage: self.stage.clone(),
                    status,
                });
            }

            debug!(stage = %self.stage, elapsed_ms = elapsed.as_millis(), "Still running");
            let remaining = self.policy.deadline.saturating_sub(elapsed);
            tokio::time::sleep(self.policy.poll_interval.min(remaining)).await;
        }
    }
}

/// SIGTERM, then SIGKILL once `grace` runs out.
async fn terminate(child: &mut Child, grace: Duration, stage: &str) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: pid belongs to a child we spawned and have not reaped.
            #[allow(unsafe_code)]
            #[allow(clippy::cast_possible_wrap)]
            let ret = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
            if ret != 0 {
                let err = std::io::Error::last_os_error();
                warn!(stage, pid, error = %err, "Failed to send SIGTERM");
            }
        }
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => info!(stage, %status, "Terminated process exited"),
        Ok(Err(e)) => {
            warn!(stage, error = %e, "Error waiting for terminated process");
            child.kill().await.ok();
        }
        Err(_) => {
            warn!(stage, "Process ignored SIGTERM, killing");
            child.kill().await.ok();
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sh(script: &str, dir: &std::path::Path) -> ToolCommand {
        ToolCommand::new("/bin/sh", dir).arg("-c").arg(script)
    }

    fn fast(deadline_ms: u64) -> SupervisorPolicy {
        SupervisorPolicy::new(Duration::from_millis(deadline_ms))
            .with_poll_interval(Duration::from_millis(20))
            .with_terminate_grace(Duration::from_millis(500))
    }

    #[tokio::test]
    async fn satisfied_predicate_never_spawns() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("spawned");
        let artifact = dir.path().join("done.db");
        std::fs::write(&artifact, "").unwrap();

        let cmd = sh(&format!("touch {}", marker.display()), dir.path());
        let mut sup = Supervisor::new("syn", fast(1_000));
        let outcome = sup.run(&cmd, &ArtifactExists(artifact)).await.unwrap();

        assert_eq!(outcome, Outcome::AlreadyComplete);
        assert_eq!(sup.state(), SupervisionState::Succeeded);
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn artifact_written_then_exit_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("out.enc");
        let cmd = sh(&format!("sleep 0.05; touch {}", artifact.display()), dir.path());

        let mut sup = Supervisor::new("init", fast(5_000));
        let outcome = sup.run(&cmd, &ArtifactExists(artifact)).await.unwrap();
        assert!(matches!(outcome, Outcome::Completed { .. }));
        assert_eq!(sup.state(), SupervisionState::Succeeded);
    }

    #[tokio::test]
    async fn nonzero_exit_with_artifact_still_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("out.enc");
        let cmd = sh(&format!("touch {}; exit 3", artifact.display()), dir.path());

        let mut sup = Supervisor::new("cts", fast(5_000));
        match sup.run(&cmd, &ArtifactExists(artifact)).await.unwrap() {
            Outcome::Completed { status, .. } => assert_eq!(status.code(), Some(3)),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn exit_without_artifact_checks_predicate_once_after_exit() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = sh("exit 0", dir.path());
        let calls = AtomicUsize::new(0);
        let check = || {
            calls.fetch_add(1, Ordering::SeqCst);
            false
        };

        let mut sup = Supervisor::new("placement", fast(5_000));
        let err = sup.run(&cmd, &check).await.unwrap_err();

        assert!(matches!(err, SupervisionError::ExitedWithoutArtifact { .. }));
        assert_eq!(err.stage(), "placement");
        assert_eq!(sup.state(), SupervisionState::FailedPredicate);
        // once before spawning, once after the exit was observed
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn deadline_terminates_within_one_poll_interval() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = sh("exec sleep 30", dir.path());
        let policy = fast(300);

        let started = Instant::now();
        let mut sup = Supervisor::new("routing", policy);
        let err = sup
            .run(&cmd, &ArtifactExists(dir.path().join("never")))
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, SupervisionError::Timeout { .. }));
        assert_eq!(sup.state(), SupervisionState::FailedTimeout);
        assert!(elapsed >= policy.deadline);
        assert!(
            elapsed < policy.deadline + policy.poll_interval + Duration::from_millis(400),
            "took {elapsed:?}"
        );
    }

    #[tokio::test]
    async fn sigterm_trapping_child_is_killed_within_one_poll_interval() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = sh("trap '' TERM; while :; do sleep 0.05; done", dir.path());
        let policy = SupervisorPolicy::new(Duration::from_millis(300))
            .with_poll_interval(Duration::from_millis(20));
        assert_eq!(policy.terminate_grace, SupervisorPolicy::DEFAULT_TERMINATE_GRACE);

        let started = Instant::now();
        let mut sup = Supervisor::new("routing", policy);
        let err = sup
            .run(&cmd, &ArtifactExists(dir.path().join("never")))
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, SupervisionError::Timeout { .. }));
        assert_eq!(sup.state(), SupervisionState::FailedTimeout);
        assert!(
            elapsed < policy.deadline + policy.poll_interval + Duration::from_millis(400),
            "took {elapsed:?}"
        );
    }

    #[test]
    fn grace_is_capped_by_poll_interval() {
        let policy = SupervisorPolicy::new(Duration::from_secs(60))
            .with_poll_interval(Duration::from_millis(250));
        assert_eq!(policy.effective_grace(), Duration::from_millis(250));
        let short = policy.with_terminate_grace(Duration::from_millis(100));
        assert_eq!(short.effective_grace(), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = ToolCommand::new(dir.path().join("no-such-tool"), dir.path());
        let mut sup = Supervisor::new("syn", fast(1_000));
        let err = sup
            .run(&cmd, &ArtifactExists(dir.path().join("x")))
            .await
            .unwrap_err();
        assert!(matches!(err, SupervisionError::Spawn { .. }));
        assert_eq!(sup.state(), SupervisionState::NotStarted);
    }

    #[tokio::test]
    async fn output_goes_to_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("log/syn.log");
        let artifact = dir.path().join("a");
        let cmd = sh(&format!("echo hello; echo oops >&2; touch {}", artifact.display()), dir.path())
            .log_file(&log);

        Supervisor::new("syn", fast(5_000))
            .run(&cmd, &ArtifactExists(artifact))
            .await
            .unwrap();
        let text = std::fs::read_to_string(&log).unwrap();
        assert!(text.contains("hello"));
        assert!(text.contains("oops"));
    }
}
