//! Parsers for git's machine-oriented output.
//!
//! Every invocation asks git for an explicit format with NUL field separators
//! (and `\x01` record separators for history), so cosmetic or localized output
//! changes never reach these functions. Input is scanned lazily record by record:
//! nothing here splits the whole output into an intermediate list first.
//!
//! Malformed records are dropped and logged at `trace` level. They never abort
//! the batch and never surface as errors.
//!
//! # Public API
//! - [`parse_log`], [`parse_graph`], [`parse_refs`]: history
//! - [`parse_status`]: porcelain v1 `-z` status with conflict classification
//! - [`parse_branches`], [`parse_stash_list`], [`parse_remotes`], [`parse_worktrees`]
//! - [`parse_conflicted_paths`]: NUL-delimited path lists
//! - [`LOG_FORMAT`], [`BRANCH_FORMAT`], [`STASH_FORMAT`]: the formats the parsers expect

use crate::core::status_code::StatusCode;
use crate::core::types::{
    Branch, Commit, FileStatus, GraphEntry, Ref, RefKind, Remote, StashEntry, StatusResult,
    Worktree,
};
use log::trace;
use std::path::PathBuf;

const NUL: u8 = 0;

/// Ten NUL-separated commit fields, each record closed by `\x01`.
pub const LOG_FORMAT: &str = "%H%x00%h%x00%an%x00%ae%x00%at%x00%ar%x00%s%x00%b%x00%P%x00%D%x01";

pub const RECORD_SEPARATOR: char = '\x01';

const FIELD_SEPARATOR: char = '\0';

const COMMIT_FIELDS: usize = 10;

pub const BRANCH_FORMAT: &str = "%(HEAD)%00%(refname)%00%(objectname:short)%00%(upstream:short)%00%(upstream:track)%00%(subject)";

const BRANCH_FIELDS: usize = 6;

pub const STASH_FORMAT: &str = "%gd%x00%gs";

/// The `--format=` flag for `git log` matching [`parse_log`].
pub fn log_format_flag() -> String {
    format!("--format={LOG_FORMAT}")
}

// ── History ─────────────────────────────────────────────────────────────────

/// Parse `git log --format=<LOG_FORMAT>` output.
pub fn parse_log(out: &str) -> Vec<Commit> {
    // A typical record is ~200 bytes.
    let mut commits = Vec::with_capacity((out.len() / 200).max(8));
    for record in out.split(RECORD_SEPARATOR) {
        let record = record.trim();
        if record.is_empty() {
            continue;
        }
        match parse_commit(record) {
            Some(commit) => commits.push(commit),
            None => trace!("skipping malformed commit record ({} bytes)", record.len()),
        }
    }
    commits
}

/// Decode one commit record. Returns `None` when fields are missing.
fn parse_commit(record: &str) -> Option<Commit> {
    let record = record.trim_end_matches(RECORD_SEPARATOR);
    let mut fields = record.splitn(COMMIT_FIELDS, FIELD_SEPARATOR);
    let hash = fields.next()?.trim();
    let short_hash = fields.next()?.trim();
    let author = fields.next()?.trim();
    let author_email = fields.next()?.trim();
    let timestamp = fields.next()?.trim();
    let relative_date = fields.next()?.trim();
    let subject = fields.next()?.trim();
    let body = fields.next()?.trim();
    let parents = fields.next()?.trim();
    let decoration = fields.next()?.trim();

    if hash.is_empty() {
        return None;
    }

    Some(Commit {
        hash: hash.to_string(),
        short_hash: short_hash.to_string(),
        author: author.to_string(),
        author_email: author_email.to_string(),
        timestamp: timestamp.parse().unwrap_or(0),
        relative_date: relative_date.to_string(),
        subject: subject.to_string(),
        body: body.to_string(),
        parents: parents.split_whitespace().map(str::to_string).collect(),
        refs: parse_refs(decoration),
    })
}

/// Parse a `%D` decoration string into typed refs.
///
/// Accepts both short names (`origin/main`, `tag: v1.0`) and fully qualified
/// ones (`refs/remotes/origin/main`). With short names a `/` is taken to mean
/// a remote-tracking branch.
pub fn parse_refs(raw: &str) -> Vec<Ref> {
    raw.split(", ")
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(parse_ref)
        .collect()
}

fn parse_ref(raw: &str) -> Ref {
    let local = |name: &str, kind| Ref {
        name: name.to_string(),
        kind,
        remote: None,
    };

    if raw == "HEAD" {
        return local("HEAD", RefKind::Head);
    }
    if let Some(target) = raw.strip_prefix("HEAD -> ") {
        let target = target.strip_prefix("refs/heads/").unwrap_or(target);
        return local(target, RefKind::Head);
    }
    if let Some(tag) = raw.strip_prefix("tag: ") {
        let tag = tag.strip_prefix("refs/tags/").unwrap_or(tag);
        return local(tag, RefKind::Tag);
    }
    if raw == "refs/stash" || raw == "stash" {
        return local("stash", RefKind::Stash);
    }
    if let Some(tag) = raw.strip_prefix("refs/tags/") {
        return local(tag, RefKind::Tag);
    }
    if let Some(branch) = raw.strip_prefix("refs/heads/") {
        return local(branch, RefKind::LocalBranch);
    }

    let remote_part = raw.strip_prefix("refs/remotes/").unwrap_or(raw);
    match remote_part.split_once('/') {
        Some((remote, name)) => Ref {
            name: name.to_string(),
            kind: RefKind::RemoteBranch,
            remote: Some(remote.to_string()),
        },
        None => local(raw, RefKind::LocalBranch),
    }
}

/// Parse `git log --graph --format=<LOG_FORMAT>` output.
///
/// Commit records may span several lines when the body is multi-line; each
/// continuation line carries its own graph prefix, as wide as the commit
/// line's, which is discarded. Lines with graph characters only (merge
/// connectors) become entries without a commit.
pub fn parse_graph(out: &str) -> Vec<GraphEntry> {
    let mut entries = Vec::new();
    // (graph prefix, accumulated record)
    let mut pending: Option<(String, String)> = None;

    for line in out.lines() {
        if line.is_empty() {
            continue;
        }
        let width = match &pending {
            Some((graph, _)) => continuation_end(line, graph.len()),
            None => graph_end(line),
        };
        let (graph, content) = line.split_at(width);

        if let Some((_, record)) = pending.as_mut() {
            record.push('\n');
            record.push_str(content);
        } else if content.is_empty() {
            entries.push(GraphEntry {
                graph: graph.to_string(),
                commit: None,
            });
            continue;
        } else {
            pending = Some((graph.to_string(), content.to_string()));
        }

        if content.contains(RECORD_SEPARATOR) {
            if let Some((graph, record)) = pending.take() {
                push_graph_commit(&mut entries, graph, &record);
            }
        }
    }

    // Output cut short (e.g. by max-count) can leave a final unterminated record.
    if let Some((graph, record)) = pending.take() {
        push_graph_commit(&mut entries, graph, &record);
    }
    entries
}

fn push_graph_commit(entries: &mut Vec<GraphEntry>, graph: String, record: &str) {
    match parse_commit(record.trim()) {
        Some(commit) => entries.push(GraphEntry {
            graph,
            commit: Some(commit),
        }),
        None => trace!("skipping malformed graph record"),
    }
}

/// Byte index where the ASCII graph prefix of a `--graph` line ends.
fn graph_end(line: &str) -> usize {
    line.find(|c: char| !is_graph_char(c))
        .unwrap_or(line.len())
}

/// Prefix end on a body line: the commit line's width, so body text that
/// starts with spaces or `*` is kept.
fn continuation_end(line: &str, width: usize) -> usize {
    match line.get(..width) {
        Some(prefix) if prefix.chars().all(is_graph_char) => width,
        _ => graph_end(line),
    }
}

fn is_graph_char(c: char) -> bool {
    matches!(c, '*' | '|' | '/' | '\\' | '_' | ' ')
}

// ── Status ──────────────────────────────────────────────────────────────────

/// Parse `git status --porcelain=v1 -z`.
///
/// Classification:
/// - unmerged on either side, or `AA` / `DD`: conflicts only
/// - `??`: untracked only
/// - otherwise staged when the index side changed, unstaged when the worktree
///   side changed; a partially staged path is in both lists
///
/// Works on raw bytes: git prints file names without re-encoding them, so a
/// path that is not UTF-8 must survive unchanged to be usable in a later write.
pub fn parse_status(out: &[u8]) -> StatusResult {
    let mut result = StatusResult::default();
    let mut fields = out.split(|&b| b == NUL);

    while let Some(entry) = fields.next() {
        if entry.len() < 4 {
            if !entry.is_empty() {
                trace!("skipping short status record {:?}", String::from_utf8_lossy(entry));
            }
            continue;
        }
        let (Some(staging), Some(worktree)) =
            (StatusCode::from_byte(entry[0]), StatusCode::from_byte(entry[1]))
        else {
            trace!(
                "skipping status record with unknown codes {:?}",
                String::from_utf8_lossy(entry)
            );
            continue;
        };
        let path = &entry[3..];

        let orig_path = if staging.has_origin() || worktree.has_origin() {
            fields.next().map(path_from_bytes)
        } else {
            None
        };

        classify(
            &mut result,
            FileStatus {
                staging,
                worktree,
                path: path_from_bytes(path),
                orig_path,
                staged: false,
            },
        );
    }
    result
}

fn classify(result: &mut StatusResult, file: FileStatus) {
    use StatusCode::{Added, Deleted, Unmerged, Untracked};

    match (file.staging, file.worktree) {
        (Untracked, Untracked) => result.untracked.push(file),
        (Unmerged, _) | (_, Unmerged) | (Added, Added) | (Deleted, Deleted) => {
            result.conflicts.push(file)
        }
        (staging, worktree) => {
            if worktree.is_change() {
                result.unstaged.push(file.clone());
            }
            if staging.is_change() {
                result.staged.push(FileStatus {
                    staged: true,
                    ..file
                });
            }
        }
    }
}

/// Parse NUL-separated path lists such as `git diff --name-only -z`.
pub fn parse_conflicted_paths(out: &[u8]) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = out
        .split(|&b| b == NUL)
        .map(trim_newlines)
        .filter(|p| !p.is_empty())
        .map(path_from_bytes)
        .collect();
    paths.dedup();
    paths
}

fn trim_newlines(mut bytes: &[u8]) -> &[u8] {
    while let [b'\n', rest @ ..] = bytes {
        bytes = rest;
    }
    while let [rest @ .., b'\n'] = bytes {
        bytes = rest;
    }
    bytes
}

/// A path exactly as git printed it.
#[cfg(unix)]
pub fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(OsStr::from_bytes(bytes))
}

/// A path as git printed it. Git for Windows emits UTF-8.
#[cfg(not(unix))]
pub fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

// ── Branches ────────────────────────────────────────────────────────────────

/// Parse `git branch -a --format=<BRANCH_FORMAT>`.
pub fn parse_branches(out: &str) -> Vec<Branch> {
    out.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let branch = parse_branch_line(line);
            if branch.is_none() {
                trace!("skipping malformed branch record {line:?}");
            }
            branch
        })
        .collect()
}

fn parse_branch_line(line: &str) -> Option<Branch> {
    let mut fields = line.splitn(BRANCH_FIELDS, FIELD_SEPARATOR);
    let head = fields.next()?;
    let refname = fields.next()?.trim();
    let short_hash = fields.next()?.trim();
    let upstream = fields.next()?.trim();
    let track = fields.next()?.trim();
    let subject = fields.next()?.trim();

    let (name, is_remote) = if let Some(local) = refname.strip_prefix("refs/heads/") {
        (local, false)
    } else if let Some(remote) = refname.strip_prefix("refs/remotes/") {
        (remote, true)
    } else if let Some(remote) = refname.strip_prefix("remotes/") {
        (remote, true)
    } else {
        (refname, false)
    };
    if name.is_empty() {
        return None;
    }

    let (ahead, behind) = parse_track(track);
    Some(Branch {
        name: name.to_string(),
        is_current: head.trim() == "*",
        is_remote,
        short_hash: short_hash.to_string(),
        upstream: upstream.to_string(),
        ahead,
        behind,
        subject: subject.to_string(),
    })
}

/// Decode `%(upstream:track)`: `[ahead 2]`, `[behind 1]`, `[ahead 2, behind 1]`, `[gone]`.
fn parse_track(track: &str) -> (usize, usize) {
    let inner = track.trim().trim_start_matches('[').trim_end_matches(']');
    let mut ahead = 0;
    let mut behind = 0;
    for part in inner.split(", ") {
        if let Some(n) = part.strip_prefix("ahead ") {
            ahead = n.trim().parse().unwrap_or(0);
        } else if let Some(n) = part.strip_prefix("behind ") {
            behind = n.trim().parse().unwrap_or(0);
        }
    }
    (ahead, behind)
}

// ── Stash ───────────────────────────────────────────────────────────────────

/// Parse `git stash list --format=<STASH_FORMAT>`.
pub fn parse_stash_list(out: &str) -> Vec<StashEntry> {
    out.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let (selector, subject) = line.split_once(FIELD_SEPARATOR).unwrap_or((line, ""));
            let Some(index) = stash_index(selector) else {
                trace!("skipping stash record without index {line:?}");
                return None;
            };

            let subject = subject.trim();
            let (branch, message) = match subject
                .strip_prefix("WIP on ")
                .or_else(|| subject.strip_prefix("On "))
            {
                Some(rest) => rest.split_once(": ").unwrap_or((rest, "")),
                None => ("", subject),
            };

            Some(StashEntry {
                index,
                branch: branch.to_string(),
                message: message.to_string(),
            })
        })
        .collect()
}

fn stash_index(selector: &str) -> Option<usize> {
    selector
        .trim()
        .strip_prefix("stash@{")?
        .strip_suffix('}')?
        .parse()
        .ok()
}

// ── Remotes ─────────────────────────────────────────────────────────────────

/// Parse `git remote -v`, merging fetch and push lines per remote in first-seen order.
pub fn parse_remotes(out: &str) -> Vec<Remote> {
    let mut remotes: Vec<Remote> = Vec::new();
    for line in out.lines() {
        let mut fields = line.split_whitespace();
        let (Some(name), Some(url), Some(kind)) = (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };

        let idx = match remotes.iter().position(|r| r.name == name) {
            Some(idx) => idx,
            None => {
                remotes.push(Remote {
                    name: name.to_string(),
                    ..Remote::default()
                });
                remotes.len() - 1
            }
        };
        match kind.trim_matches(|c| c == '(' || c == ')') {
            "fetch" => remotes[idx].fetch_url = url.to_string(),
            "push" => remotes[idx].push_url = url.to_string(),
            _ => {}
        }
    }
    remotes
}

// ── Worktrees ───────────────────────────────────────────────────────────────

/// Parse `git worktree list --porcelain`.
pub fn parse_worktrees(out: &str) -> Vec<Worktree> {
    let mut worktrees = Vec::new();
    let mut current: Option<Worktree> = None;

    for line in out.lines() {
        if let Some(path) = line.strip_prefix("worktree ") {
            worktrees.extend(current.take());
            current = Some(Worktree {
                path: PathBuf::from(path),
                ..Worktree::default()
            });
            continue;
        }
        let Some(wt) = current.as_mut() else {
            continue;
        };
        if let Some(head) = line.strip_prefix("HEAD ") {
            wt.head = head.to_string();
        } else if let Some(branch) = line.strip_prefix("branch ") {
            wt.branch = branch.strip_prefix("refs/heads/").unwrap_or(branch).to_string();
        } else if line == "bare" {
            wt.bare = true;
        } else if line == "detached" {
            wt.detached = true;
        } else if line == "locked" || line.starts_with("locked ") {
            wt.locked = true;
        }
    }
    worktrees.extend(current);
    worktrees
}
