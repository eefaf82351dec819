//! Process execution for git invocations.
//!
//! [`ProcessRunner`] is the seam between the service facade and the operating
//! system. [`CliRunner`] is the real implementation: it takes a slot from the
//! shared [`ConcurrencyLimiter`], spawns the program with separated stdout and
//! stderr, and enforces the deadline of the invocation's [`TimeoutClass`].
//!
//! # Public API
//! - [`ProcessRunner`]: the `run_raw(workdir, env, class, args)` contract, with
//!   [`ProcessRunner::run`] as the UTF-8 convenience on top
//! - [`CliRunner`]: limiter + timeout enforcing implementation
//! - [`TimeoutClass`], [`Timeouts`]: per-operation-class deadlines

use crate::core::error::{ConduitError, Result, WaitStage};
use crate::core::limiter::ConcurrencyLimiter;
use log::{debug, warn};
use std::ffi::{OsStr, OsString};
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

/// Environment variable that stops git from taking optional locks.
pub const OPTIONAL_LOCKS_ENV: &str = "GIT_OPTIONAL_LOCKS";

/// Deadline class of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeoutClass {
    /// Queries. A slow read usually means lock contention.
    Read,
    /// Index and ref mutations.
    Write,
    /// Anything that talks to a remote.
    Network,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub read: Duration,
    pub write: Duration,
    pub network: Duration,
}

impl Timeouts {
    pub fn for_class(&self, class: TimeoutClass) -> Duration {
        match class {
            TimeoutClass::Read => self.read,
            TimeoutClass::Write => self.write,
            TimeoutClass::Network => self.network,
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(10),
            write: Duration::from_secs(30),
            network: Duration::from_secs(120),
        }
    }
}

/// Executes one git invocation and returns its stdout.
///
/// Implementations must return [`ConduitError::ExecutionTimeout`] when the
/// class deadline expires and [`ConduitError::ExecutionFailed`] when the tool
/// exits non-zero.
pub trait ProcessRunner: Send + Sync {
    /// Run with OS-string arguments and return stdout byte for byte.
    ///
    /// File names are arbitrary bytes to git; anything that reads paths back
    /// or passes them in goes through here.
    fn run_raw(
        &self,
        workdir: &Path,
        env: &[(&str, &str)],
        class: TimeoutClass,
        args: &[&OsStr],
    ) -> Result<Vec<u8>>;

    /// Run with UTF-8 arguments; invalid UTF-8 in stdout is replaced.
    fn run(
        &self,
        workdir: &Path,
        env: &[(&str, &str)],
        class: TimeoutClass,
        args: &[&str],
    ) -> Result<String> {
        let args: Vec<&OsStr> = args.iter().map(OsStr::new).collect();
        let out = self.run_raw(workdir, env, class, &args)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for Arc<R> {
    fn run_raw(
        &self,
        workdir: &Path,
        env: &[(&str, &str)],
        class: TimeoutClass,
        args: &[&OsStr],
    ) -> Result<Vec<u8>> {
        (**self).run_raw(workdir, env, class, args)
    }
}

/// Arguments joined for logs and error messages.
fn display_args(args: &[&OsStr]) -> String {
    args.iter()
        .map(|arg| arg.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Runs the git executable under the shared limiter.
#[derive(Debug, Clone)]
pub struct CliRunner {
    program: OsString,
    timeouts: Timeouts,
    limiter: Arc<ConcurrencyLimiter>,
}

impl CliRunner {
    pub fn new(limiter: Arc<ConcurrencyLimiter>, timeouts: Timeouts) -> Self {
        Self::with_program("git", limiter, timeouts)
    }

    /// Use a program other than `git` (a wrapper script, or a fixed path).
    pub fn with_program(
        program: impl Into<OsString>,
        limiter: Arc<ConcurrencyLimiter>,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            program: program.into(),
            timeouts,
            limiter,
        }
    }

    pub fn limiter(&self) -> &Arc<ConcurrencyLimiter> {
        &self.limiter
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }
}

impl ProcessRunner for CliRunner {
    fn run_raw(
        &self,
        workdir: &Path,
        env: &[(&str, &str)],
        class: TimeoutClass,
        args: &[&OsStr],
    ) -> Result<Vec<u8>> {
        let command_line = display_args(args);
        let timeout = self.timeouts.for_class(class);
        let deadline = Instant::now() + timeout;

        let Some(_slot) = self.limiter.acquire_until(deadline) else {
            warn!("git {command_line}: no process slot within {timeout:?}");
            return Err(ConduitError::timeout(command_line, timeout, WaitStage::Slot));
        };

        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if class == TimeoutClass::Read {
            cmd.env(OPTIONAL_LOCKS_ENV, "0");
        }
        for (key, value) in env {
            cmd.env(key, value);
        }

        debug!("git {command_line} ({class:?})");
        let output = execute(cmd, deadline).map_err(|failure| match failure {
            Failure::Spawn(e) => ConduitError::spawn(&command_line, e),
            Failure::Io(e) => ConduitError::from(e),
            Failure::TimedOut => {
                warn!("git {command_line}: killed after {timeout:?}");
                ConduitError::timeout(&command_line, timeout, WaitStage::Exit)
            }
        })?;

        if !output.success {
            let detail = output.diagnostic();
            debug!("git {command_line} failed: {detail}");
            return Err(ConduitError::execution_failed(
                command_line,
                detail,
                output.status,
            ));
        }

        Ok(output.stdout)
    }
}

struct Captured {
    success: bool,
    status: String,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl Captured {
    /// Trimmed stderr, or trimmed stdout when stderr is empty.
    fn diagnostic(&self) -> String {
        let stderr = String::from_utf8_lossy(&self.stderr);
        let stderr = stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        String::from_utf8_lossy(&self.stdout).trim().to_string()
    }
}

enum Failure {
    Spawn(std::io::Error),
    Io(std::io::Error),
    TimedOut,
}

/// Spawn and wait until `deadline`, draining both pipes on reader threads so a
/// chatty child can never block on a full pipe.
fn execute(mut cmd: Command, deadline: Instant) -> std::result::Result<Captured, Failure> {
    let mut child = cmd.spawn().map_err(Failure::Spawn)?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_handle = thread::spawn(move || drain(stdout));
    let stderr_handle = thread::spawn(move || drain(stderr));

    let remaining = deadline.saturating_duration_since(Instant::now());
    // Grandchildren may still hold the pipes after a kill; the readers are
    // then left detached and finish when the last writer closes.
    let status = wait_or_reap(&mut child, remaining, |child, remaining| {
        child.wait_timeout(remaining)
    })?;

    let stdout = join(stdout_handle)?;
    let stderr = join(stderr_handle)?;

    Ok(Captured {
        success: status.success(),
        status: status.to_string(),
        stdout,
        stderr,
    })
}

/// Wait for exit; on timeout or a failed wait the child is killed and reaped.
fn wait_or_reap<W>(
    child: &mut Child,
    remaining: Duration,
    wait: W,
) -> std::result::Result<ExitStatus, Failure>
where
    W: FnOnce(&mut Child, Duration) -> std::io::Result<Option<ExitStatus>>,
{
    let failure = match wait(child, remaining) {
        Ok(Some(status)) => return Ok(status),
        Ok(None) => Failure::TimedOut,
        Err(e) => Failure::Io(e),
    };
    let _ = child.kill();
    let _ = child.wait();
    Err(failure)
}

fn drain<R: Read>(stream: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        stream.read_to_end(&mut buf)?;
    }
    Ok(buf)
}

fn join(
    handle: thread::JoinHandle<std::io::Result<Vec<u8>>>,
) -> std::result::Result<Vec<u8>, Failure> {
    match handle.join() {
        Ok(result) => result.map_err(Failure::Io),
        Err(_) => Err(Failure::Io(std::io::Error::other(
            "output reader thread panicked",
        ))),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sh_runner(capacity: usize, read: Duration) -> CliRunner {
        CliRunner::with_program(
            "sh",
            Arc::new(ConcurrencyLimiter::new(capacity)),
            Timeouts {
                read,
                write: Duration::from_secs(5),
                network: Duration::from_secs(5),
            },
        )
    }

    fn tmp() -> std::path::PathBuf {
        std::env::temp_dir()
    }

    #[test]
    fn test_returns_stdout_on_success() {
        let runner = sh_runner(1, Duration::from_secs(5));
        let out = runner
            .run(&tmp(), &[], TimeoutClass::Write, &["-c", "printf hello"])
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[test]
    fn test_read_class_disables_optional_locks() {
        let runner = sh_runner(1, Duration::from_secs(5));
        let script = "printf %s \"$GIT_OPTIONAL_LOCKS\"";
        let read = runner
            .run(&tmp(), &[], TimeoutClass::Read, &["-c", script])
            .unwrap();
        assert_eq!(read, "0");

        let write = runner
            .run(&tmp(), &[], TimeoutClass::Write, &["-c", script])
            .unwrap();
        assert_eq!(write, "");
    }

    #[test]
    fn test_env_overrides_are_applied() {
        let runner = sh_runner(1, Duration::from_secs(5));
        let out = runner
            .run(
                &tmp(),
                &[("CONDUIT_EXTRA", "yes")],
                TimeoutClass::Write,
                &["-c", "printf %s \"$CONDUIT_EXTRA\""],
            )
            .unwrap();
        assert_eq!(out, "yes");
    }

    #[test]
    fn test_nonzero_exit_carries_stderr() {
        let runner = sh_runner(1, Duration::from_secs(5));
        let err = runner
            .run(
                &tmp(),
                &[],
                TimeoutClass::Write,
                &["-c", "echo out; echo '  boom  ' >&2; exit 3"],
            )
            .unwrap_err();
        match err {
            ConduitError::ExecutionFailed {
                command, detail, ..
            } => {
                assert!(command.starts_with("-c"));
                assert_eq!(detail, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_nonzero_exit_falls_back_to_stdout() {
        let runner = sh_runner(1, Duration::from_secs(5));
        let err = runner
            .run(&tmp(), &[], TimeoutClass::Write, &["-c", "echo only-out; exit 1"])
            .unwrap_err();
        assert!(err.is_rejected());
        assert!(err.to_string().contains("only-out"));
    }

    #[test]
    fn test_timeout_kills_process_and_releases_slot() {
        let runner = sh_runner(1, Duration::from_millis(100));
        let started = Instant::now();
        let err = runner
            .run(&tmp(), &[], TimeoutClass::Read, &["-c", "sleep 5"])
            .unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(4));
        assert!(matches!(
            err,
            ConduitError::ExecutionTimeout {
                waiting_for: WaitStage::Exit,
                ..
            }
        ));
        assert_eq!(runner.limiter().in_use(), 0);
    }

    #[test]
    fn test_failed_wait_kills_child() {
        let mut child = Command::new("sh").args(["-c", "sleep 5"]).spawn().unwrap();
        let started = Instant::now();
        let result = wait_or_reap(&mut child, Duration::from_secs(5), |_, _| {
            Err(std::io::Error::other("wait failed"))
        });

        assert!(matches!(result, Err(Failure::Io(_))));
        assert!(child.try_wait().unwrap().is_some());
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_raw_output_keeps_invalid_utf8() {
        let runner = sh_runner(1, Duration::from_secs(5));
        let args = [OsStr::new("-c"), OsStr::new("printf 'caf\\351'")];
        let out = runner
            .run_raw(&tmp(), &[], TimeoutClass::Write, &args)
            .unwrap();
        assert_eq!(out, b"caf\xe9");
    }

    #[test]
    fn test_slot_wait_times_out() {
        let runner = sh_runner(1, Duration::from_millis(50));
        let _held = runner.limiter().try_acquire().unwrap();
        let err = runner
            .run(&tmp(), &[], TimeoutClass::Read, &["-c", "true"])
            .unwrap_err();
        assert!(matches!(
            err,
            ConduitError::ExecutionTimeout {
                waiting_for: WaitStage::Slot,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let runner = CliRunner::with_program(
            "definitely-not-a-real-program-xyz",
            Arc::new(ConcurrencyLimiter::new(1)),
            Timeouts::default(),
        );
        let err = runner
            .run(&tmp(), &[], TimeoutClass::Read, &["status"])
            .unwrap_err();
        assert!(matches!(err, ConduitError::Spawn { .. }));
        assert_eq!(runner.limiter().in_use(), 0);
    }

    #[test]
    fn test_concurrent_calls_respect_capacity() {
        let runner = Arc::new(sh_runner(2, Duration::from_secs(10)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let runner = Arc::clone(&runner);
                thread::spawn(move || {
                    runner.run(&tmp(), &[], TimeoutClass::Read, &["-c", "sleep 0.1"])
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert!(runner.limiter().peak() <= 2);
        assert_eq!(runner.limiter().in_use(), 0);
    }
}
