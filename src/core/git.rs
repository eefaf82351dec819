//! CLI-backed repository operations.
//!
//! [`CliService`] implements [`GitService`] by invoking git through a
//! [`ProcessRunner`]. It only builds argument lists, picks the timeout class
//! and hands the output to [`parser`](crate::core::parser); process limits and
//! deadlines are the runner's business.
//!
//! # Public API
//! - [`CliService`]: the uncached service
//! - [`DEFAULT_MAX_DIFF_BYTES`]: ceiling applied to diff-producing calls

use crate::core::{
    error::{ConduitError, Result},
    parser::{self, BRANCH_FORMAT, STASH_FORMAT},
    runner::{ProcessRunner, TimeoutClass},
    service::GitService,
    types::{Branch, Commit, GraphEntry, Remote, StashEntry, StatusResult, Worktree},
};
use log::debug;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_MAX_DIFF_BYTES: usize = 512 * 1024;

pub struct CliService {
    root: PathBuf,
    git_dir: PathBuf,
    runner: Arc<dyn ProcessRunner>,
    max_diff_bytes: usize,
}

impl std::fmt::Debug for CliService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CliService")
            .field("root", &self.root)
            .field("git_dir", &self.git_dir)
            .field("max_diff_bytes", &self.max_diff_bytes)
            .finish_non_exhaustive()
    }
}

impl CliService {
    /// Resolve the repository containing `path`.
    ///
    /// Fails with [`ConduitError::NotARepository`] when `path` is not a
    /// directory or git refuses to resolve a top level for it.
    pub fn open<P: AsRef<Path>>(path: P, runner: Arc<dyn ProcessRunner>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(ConduitError::not_a_repository(path));
        }

        let resolve = |flag: &str| -> Result<PathBuf> {
            match runner.run(path, &[], TimeoutClass::Read, &["rev-parse", flag]) {
                Ok(out) => Ok(PathBuf::from(out.trim_end_matches(['\r', '\n']))),
                Err(ConduitError::ExecutionFailed { .. }) => {
                    Err(ConduitError::not_a_repository(path))
                }
                Err(e) => Err(e),
            }
        };
        let root = resolve("--show-toplevel")?;
        let git_dir = resolve("--absolute-git-dir")?;
        if root.as_os_str().is_empty() || git_dir.as_os_str().is_empty() {
            return Err(ConduitError::not_a_repository(path));
        }

        debug!(
            "opened repository {} (git dir {})",
            root.display(),
            git_dir.display()
        );
        Ok(Self::from_parts(root, git_dir, runner))
    }

    /// Build a service for already resolved paths without running git.
    pub fn from_parts(root: PathBuf, git_dir: PathBuf, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            root,
            git_dir,
            runner,
            max_diff_bytes: DEFAULT_MAX_DIFF_BYTES,
        }
    }

    pub fn with_max_diff_bytes(mut self, max_diff_bytes: usize) -> Self {
        self.max_diff_bytes = max_diff_bytes.max(1);
        self
    }

    pub fn max_diff_bytes(&self) -> usize {
        self.max_diff_bytes
    }

    fn execute(&self, class: TimeoutClass, args: &[&OsStr]) -> Result<Vec<u8>> {
        self.runner.run_raw(&self.root, &[], class, args)
    }

    fn read(&self, args: &[&str]) -> Result<String> {
        self.runner.run(&self.root, &[], TimeoutClass::Read, args)
    }

    /// Stdout untouched, for output that carries file names.
    fn read_raw(&self, args: &[&str]) -> Result<Vec<u8>> {
        self.execute(TimeoutClass::Read, &os_args(args))
    }

    fn write(&self, args: &[&str]) -> Result<()> {
        self.write_os(&os_args(args))
    }

    fn write_os(&self, args: &[&OsStr]) -> Result<()> {
        self.execute(TimeoutClass::Write, args).map(drop)
    }

    fn network(&self, args: &[&str]) -> Result<()> {
        self.execute(TimeoutClass::Network, &os_args(args)).map(drop)
    }

    /// Run a write command over a path list; no-op when the list is empty.
    fn write_paths(&self, base: &[&str], paths: &[PathBuf]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = os_args(base);
        args.push(OsStr::new("--"));
        args.extend(paths.iter().map(|p| p.as_os_str()));
        self.write_os(&args)
    }

    fn read_diff(&self, args: &[&OsStr]) -> Result<String> {
        let out = self.execute(TimeoutClass::Read, args)?;
        let out = String::from_utf8_lossy(&out).into_owned();
        Ok(truncate_diff(out, self.max_diff_bytes))
    }
}

fn os_args<'a>(args: &[&'a str]) -> Vec<&'a OsStr> {
    args.iter().map(|s| OsStr::new(*s)).collect()
}

/// Cut `out` to at most `limit` bytes on a char boundary and append a notice.
fn truncate_diff(mut out: String, limit: usize) -> String {
    if out.len() <= limit {
        return out;
    }
    let total = out.len();
    let mut cut = limit;
    while cut > 0 && !out.is_char_boundary(cut) {
        cut -= 1;
    }
    out.truncate(cut);
    debug!("diff truncated from {total} to {cut} bytes");
    out.push_str(&format!(
        "\n... diff truncated: showing {cut} of {total} bytes ...\n"
    ));
    out
}

fn stash_ref(index: usize) -> String {
    format!("stash@{{{index}}}")
}


impl GitService for CliService {
    fn repo_root(&self) -> &Path {
        &self.root
    }

    fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    fn head(&self) -> Result<String> {
        match self.read(&["symbolic-ref", "--short", "HEAD"]) {
            Ok(out) => Ok(out.trim().to_string()),
            Err(ConduitError::ExecutionFailed { .. }) => {
                // Detached HEAD
                let out = self.read(&["rev-parse", "--short", "HEAD"])?;
                Ok(out.trim().to_string())
            }
            Err(e) => Err(e),
        }
    }

    fn is_clean(&self) -> Result<bool> {
        let out = self.read(&["status", "--porcelain", "--untracked-files=no"])?;
        Ok(out.trim().is_empty())
    }

    fn is_merging(&self) -> Result<bool> {
        Ok(self.git_dir.join("MERGE_HEAD").is_file())
    }

    fn is_rebasing(&self) -> Result<bool> {
        Ok(["rebase-merge", "rebase-apply"]
            .iter()
            .any(|dir| self.git_dir.join(dir).is_dir()))
    }

    fn ahead_behind(&self) -> Result<(usize, usize)> {
        let out = match self.read(&["rev-list", "--left-right", "--count", "HEAD...@{upstream}"]) {
            Ok(out) => out,
            // No upstream configured
            Err(ConduitError::ExecutionFailed { .. }) => return Ok((0, 0)),
            Err(e) => return Err(e),
        };
        let mut counts = out.split_whitespace().map(|n| n.parse::<usize>().unwrap_or(0));
        match (counts.next(), counts.next()) {
            (Some(ahead), Some(behind)) => Ok((ahead, behind)),
            _ => Ok((0, 0)),
        }
    }

    fn upstream(&self) -> Result<Option<String>> {
        match self.read(&["rev-parse", "--abbrev-ref", "@{upstream}"]) {
            Ok(out) => {
                let name = out.trim();
                Ok((!name.is_empty()).then(|| name.to_string()))
            }
            Err(ConduitError::ExecutionFailed { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn status(&self) -> Result<StatusResult> {
        let out = self.read_raw(&["status", "--porcelain=v1", "-z", "--untracked-files=normal"])?;
        Ok(parser::parse_status(&out))
    }

    fn stage(&self, paths: &[PathBuf]) -> Result<()> {
        self.write_paths(&["add"], paths)
    }

    fn stage_all(&self) -> Result<()> {
        self.write(&["add", "-A"])
    }

    fn unstage(&self, paths: &[PathBuf]) -> Result<()> {
        self.write_paths(&["reset", "HEAD"], paths)
    }

    fn unstage_all(&self) -> Result<()> {
        self.write(&["reset", "HEAD"])
    }

    fn discard(&self, paths: &[PathBuf]) -> Result<()> {
        self.write_paths(&["checkout"], paths)
    }

    fn commit(&self, message: &str) -> Result<()> {
        self.write(&["commit", "-m", message])
    }

    fn commit_amend(&self, message: &str) -> Result<()> {
        self.write(&["commit", "--amend", "-m", message])
    }

    fn log(&self, limit: usize, args: &[&str]) -> Result<Vec<Commit>> {
        let max_count = format!("--max-count={limit}");
        let format = parser::log_format_flag();
        let mut cmd = vec!["log", max_count.as_str(), "--decorate=full", format.as_str()];
        cmd.extend_from_slice(args);
        let out = self.read(&cmd)?;
        Ok(parser::parse_log(&out))
    }

    fn log_graph(&self, limit: usize) -> Result<Vec<GraphEntry>> {
        let max_count = format!("--max-count={limit}");
        let format = parser::log_format_flag();
        let out = self.read(&[
            "log",
            &max_count,
            "--graph",
            "--all",
            "--decorate=full",
            &format,
        ])?;
        Ok(parser::parse_graph(&out))
    }

    fn show(&self, hash: &str) -> Result<(Commit, String)> {
        let commit = self
            .log(1, &[hash])?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ConduitError::execution_failed(format!("log -1 {hash}"), "no such commit", "empty output")
            })?;
        let patch = self.read_diff(&os_args(&["show", "--format=", "--patch", "--no-color", hash]))?;
        Ok((commit, patch))
    }

    fn diff(&self, staged: bool, path: Option<&Path>) -> Result<String> {
        let mut args = os_args(&["diff", "--color=never", "--no-ext-diff"]);
        if staged {
            args.push(OsStr::new("--cached"));
        }
        if let Some(path) = path {
            args.extend([OsStr::new("--"), path.as_os_str()]);
        }
        self.read_diff(&args)
    }

    fn diff_range(&self, from: &str, to: &str) -> Result<String> {
        let range = format!("{from}..{to}");
        self.read_diff(&os_args(&["diff", "--color=never", "--no-ext-diff", &range]))
    }

    fn branches(&self) -> Result<Vec<Branch>> {
        let format = format!("--format={BRANCH_FORMAT}");
        let out = self.read(&["branch", "-a", &format, "--sort=-committerdate"])?;
        Ok(parser::parse_branches(&out))
    }

    fn create_branch(&self, name: &str) -> Result<()> {
        self.write(&["branch", name])
    }

    fn switch_branch(&self, name: &str) -> Result<()> {
        self.write(&["switch", name])
    }

    fn delete_branch(&self, name: &str, force: bool) -> Result<()> {
        let flag = if force { "-D" } else { "-d" };
        self.write(&["branch", flag, name])
    }

    fn merge_branch(&self, name: &str) -> Result<()> {
        self.write(&["merge", name])
    }

    fn rename_branch(&self, old_name: &str, new_name: &str) -> Result<()> {
        self.write(&["branch", "-m", old_name, new_name])
    }

    fn stash_list(&self) -> Result<Vec<StashEntry>> {
        let format = format!("--format={STASH_FORMAT}");
        let out = self.read(&["stash", "list", &format])?;
        Ok(parser::parse_stash_list(&out))
    }

    fn stash_save(&self, message: Option<&str>) -> Result<()> {
        match message.filter(|m| !m.is_empty()) {
            Some(message) => self.write(&["stash", "push", "-m", message]),
            None => self.write(&["stash", "push"]),
        }
    }

    fn stash_pop(&self, index: usize) -> Result<()> {
        self.write(&["stash", "pop", &stash_ref(index)])
    }

    fn stash_apply(&self, index: usize) -> Result<()> {
        self.write(&["stash", "apply", &stash_ref(index)])
    }

    fn stash_drop(&self, index: usize) -> Result<()> {
        self.write(&["stash", "drop", &stash_ref(index)])
    }

    fn stash_show(&self, index: usize) -> Result<String> {
        self.read_diff(&os_args(&["stash", "show", "-p", "--no-color", &stash_ref(index)]))
    }

    fn remotes(&self) -> Result<Vec<Remote>> {
        let out = self.read(&["remote", "-v"])?;
        Ok(parser::parse_remotes(&out))
    }

    fn fetch(&self, remote: &str) -> Result<()> {
        self.network(&["fetch", remote])
    }

    fn pull(&self, remote: &str, branch: &str) -> Result<()> {
        self.network(&["pull", remote, branch])
    }

    fn push(&self, remote: &str, branch: &str, force: bool) -> Result<()> {
        if force {
            self.network(&["push", remote, branch, "--force-with-lease"])
        } else {
            self.network(&["push", remote, branch])
        }
    }

    fn worktrees(&self) -> Result<Vec<Worktree>> {
        let out = self.read(&["worktree", "list", "--porcelain"])?;
        Ok(parser::parse_worktrees(&out))
    }

    fn worktree_add(&self, path: &Path, branch: Option<&str>) -> Result<()> {
        let mut args = os_args(&["worktree", "add"]);
        args.push(path.as_os_str());
        if let Some(branch) = branch.filter(|b| !b.is_empty()) {
            args.extend(os_args(&["-b", branch]));
        }
        self.write_os(&args)
    }

    fn worktree_remove(&self, path: &Path) -> Result<()> {
        let mut args = os_args(&["worktree", "remove"]);
        args.push(path.as_os_str());
        self.write_os(&args)
    }

    fn rebase_interactive(&self, onto: &str) -> Result<()> {
        self.write(&["rebase", "-i", onto])
    }

    fn rebase_continue(&self) -> Result<()> {
        self.write(&["rebase", "--continue"])
    }

    fn rebase_abort(&self) -> Result<()> {
        self.write(&["rebase", "--abort"])
    }

    fn bisect_start(&self, bad: &str, good: &str) -> Result<()> {
        self.write(&["bisect", "start", bad, good])
    }

    fn bisect_good(&self) -> Result<()> {
        self.write(&["bisect", "good"])
    }

    fn bisect_bad(&self) -> Result<()> {
        self.write(&["bisect", "bad"])
    }

    fn bisect_reset(&self) -> Result<()> {
        self.write(&["bisect", "reset"])
    }

    fn bisect_log(&self) -> Result<String> {
        self.read(&["bisect", "log"])
    }

    fn conflicted_files(&self) -> Result<Vec<PathBuf>> {
        let out = self.read_raw(&["diff", "--name-only", "--diff-filter=U", "-z"])?;
        Ok(parser::parse_conflicted_paths(&out))
    }

    fn mark_resolved(&self, path: &Path) -> Result<()> {
        self.write_paths(&["add"], &[path.to_path_buf()])
    }
}
