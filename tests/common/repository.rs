//! Test repository setup.
//!
//! Every repository gets a fixed identity and `main` as its initial branch so
//! results do not depend on the machine's git configuration.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// A repository in a temporary directory. Keep it alive for the whole test.
pub struct TestRepo {
    pub temp_dir: TempDir,
    pub path: PathBuf,
}

impl TestRepo {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn git_dir(&self) -> PathBuf {
        self.path.join(".git")
    }
}

pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

/// Run git in `repo_path`, failing the test when git exits non-zero.
pub fn git(repo_path: &Path, args: &[&str]) -> anyhow::Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_path)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()?;
    anyhow::ensure!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// An empty repository on branch `main`.
pub fn setup_test_repo() -> anyhow::Result<TestRepo> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().to_path_buf();

    git(&path, &["init", "--quiet"])?;
    git(&path, &["symbolic-ref", "HEAD", "refs/heads/main"])?;
    git(&path, &["config", "user.name", "Test User"])?;
    git(&path, &["config", "user.email", "test@example.com"])?;
    git(&path, &["config", "commit.gpgsign", "false"])?;

    Ok(TestRepo { temp_dir, path })
}

/// A repository with one commit containing `initial.txt`.
pub fn setup_test_repo_with_initial_commit() -> anyhow::Result<TestRepo> {
    let repo = setup_test_repo()?;
    create_file(&repo.path, "initial.txt", "initial content\n")?;
    git(&repo.path, &["add", "initial.txt"])?;
    git(&repo.path, &["commit", "--quiet", "-m", "Initial commit"])?;
    Ok(repo)
}

pub fn create_file(repo_path: &Path, filename: &str, content: &str) -> anyhow::Result<()> {
    let file = repo_path.join(filename);
    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(file, content)?;
    Ok(())
}

pub fn commit_file(repo_path: &Path, filename: &str, content: &str, message: &str) -> anyhow::Result<()> {
    create_file(repo_path, filename, content)?;
    git(repo_path, &["add", filename])?;
    git(repo_path, &["commit", "--quiet", "-m", message])?;
    Ok(())
}

/// Put the repository in the middle of a conflicted merge on `conflict.txt`.
pub fn setup_merge_conflict(repo: &TestRepo) -> anyhow::Result<()> {
    commit_file(&repo.path, "conflict.txt", "base\n", "Add conflict file")?;
    git(&repo.path, &["checkout", "--quiet", "-b", "topic"])?;
    commit_file(&repo.path, "conflict.txt", "topic side\n", "Topic change")?;
    git(&repo.path, &["checkout", "--quiet", "main"])?;
    commit_file(&repo.path, "conflict.txt", "main side\n", "Main change")?;

    // Expected to fail with a conflict
    let merged = Command::new("git")
        .args(["merge", "topic"])
        .current_dir(&repo.path)
        .output()?;
    anyhow::ensure!(!merged.status.success(), "merge unexpectedly succeeded");
    Ok(())
}
