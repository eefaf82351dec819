//! Scriptable [`ProcessRunner`] for tests.
//!
//! [`FakeRunner`] answers invocations from rules keyed by argv prefix, records
//! every call, and tracks how many calls were inside `run` at the same time.

use crate::core::error::{ConduitError, Result};
use crate::core::runner::{ProcessRunner, TimeoutClass};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub workdir: PathBuf,
    /// Arguments as text, invalid UTF-8 replaced.
    pub args: Vec<String>,
    /// Arguments exactly as passed.
    pub raw_args: Vec<OsString>,
    pub env: Vec<(String, String)>,
    pub class: TimeoutClass,
}

impl Call {
    pub fn starts_with(&self, prefix: &[&str]) -> bool {
        self.args.len() >= prefix.len() && self.args.iter().zip(prefix).all(|(a, p)| a == p)
    }
}

#[derive(Debug)]
struct Rule {
    prefix: Vec<String>,
    response: Result<Vec<u8>>,
}

#[derive(Debug, Default)]
struct Script {
    rules: Vec<Rule>,
    calls: Vec<Call>,
}

/// Unscripted invocations succeed with empty stdout.
#[derive(Debug, Default)]
pub struct FakeRunner {
    script: Mutex<Script>,
    delay: Option<Duration>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps for `delay` while counted as running.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Answer calls whose argv starts with `prefix` with `stdout`.
    /// Rules added later win over earlier ones.
    pub fn respond(&self, prefix: &[&str], stdout: &str) -> &Self {
        self.add_rule(prefix, Ok(stdout.as_bytes().to_vec()))
    }

    /// Like [`respond`](Self::respond) with stdout that need not be UTF-8.
    pub fn respond_bytes(&self, prefix: &[&str], stdout: &[u8]) -> &Self {
        self.add_rule(prefix, Ok(stdout.to_vec()))
    }

    /// Fail calls whose argv starts with `prefix` with `error`.
    pub fn fail(&self, prefix: &[&str], error: ConduitError) -> &Self {
        self.add_rule(prefix, Err(error))
    }

    /// Fail like git does when it rejects a command.
    pub fn reject(&self, prefix: &[&str], stderr: &str) -> &Self {
        let command = prefix.join(" ");
        self.fail(
            prefix,
            ConduitError::execution_failed(command, stderr, "exit status: 128"),
        )
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    pub fn calls_matching(&self, prefix: &[&str]) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    pub fn last_call(&self) -> Option<Call> {
        self.lock().calls.last().cloned()
    }

    /// Highest number of calls observed inside `run` at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn add_rule(&self, prefix: &[&str], response: Result<Vec<u8>>) -> &Self {
        self.lock().rules.push(Rule {
            prefix: prefix.iter().map(|s| s.to_string()).collect(),
            response,
        });
        self
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ProcessRunner for FakeRunner {
    fn run_raw(
        &self,
        workdir: &Path,
        env: &[(&str, &str)],
        class: TimeoutClass,
        args: &[&OsStr],
    ) -> Result<Vec<u8>> {
        let call = Call {
            workdir: workdir.to_path_buf(),
            args: args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect(),
            raw_args: args.iter().map(|arg| arg.to_os_string()).collect(),
            env: env
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            class,
        };

        let response = {
            let mut script = self.lock();
            let response = script
                .rules
                .iter()
                .rev()
                .find(|rule| {
                    let prefix: Vec<&str> = rule.prefix.iter().map(String::as_str).collect();
                    call.starts_with(&prefix)
                })
                .map(|rule| rule.response.clone())
                .unwrap_or_else(|| Ok(Vec::new()));
            script.calls.push(call);
            response
        };

        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        response
    }
}
