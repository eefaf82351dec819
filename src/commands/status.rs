use crate::core::{
    error::Result,
    output::{format_ahead_behind, format_file_line},
    service::GitService,
    status_code::StatusCode,
    types::{FileStatus, RepoInfo, StatusResult},
};
use colored::*;

pub fn execute_status(service: &dyn GitService) -> Result<()> {
    let info = service.repo_info()?;
    let status = service.status()?;
    print!("{}", render_status(&info, &status));
    Ok(())
}

/// Header plus grouped sections: conflicts, staged, unstaged, untracked.
pub fn render_status(info: &RepoInfo, status: &StatusResult) -> String {
    let mut out = String::from("\n");
    out.push_str(&format!(
        "{} {}{}\n",
        "# On branch:".bright_black(),
        info.head.blue(),
        format_ahead_behind(info.ahead, info.behind)
    ));
    if let Some(upstream) = &info.upstream {
        out.push_str(&format!("{} {}\n", "# Tracking:".bright_black(), upstream.white()));
    }
    if info.is_merging {
        out.push_str(&format!("{}\n", "# Merge in progress".yellow()));
    }
    if info.is_rebasing {
        out.push_str(&format!("{}\n", "# Rebase in progress".yellow()));
    }
    out.push('\n');

    if status.is_empty() {
        out.push_str(&format!("{}\n\n", "Nothing to commit, working tree clean".white()));
        return out;
    }

    push_section(&mut out, "Unmerged", &status.conflicts, |_| StatusCode::Unmerged);
    push_section(&mut out, "Changes to be committed", &status.staged, |f| f.staging);
    push_section(&mut out, "Changes not staged for commit", &status.unstaged, |f| {
        f.worktree
    });
    push_section(&mut out, "Untracked files", &status.untracked, |_| {
        StatusCode::Untracked
    });
    out
}

fn push_section<F>(out: &mut String, title: &str, files: &[FileStatus], code: F)
where
    F: Fn(&FileStatus) -> StatusCode,
{
    if files.is_empty() {
        return;
    }
    out.push_str(&format!("{}\n", format!("➤ {title}").white().bold()));
    for file in files {
        out.push_str(&format_file_line(file, code(file)));
        out.push('\n');
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::parse_status;
    use std::path::PathBuf;

    fn info(head: &str) -> RepoInfo {
        RepoInfo {
            root: PathBuf::from("/repo"),
            git_dir: PathBuf::from("/repo/.git"),
            head: head.to_string(),
            is_clean: true,
            is_merging: false,
            is_rebasing: false,
            ahead: 0,
            behind: 0,
            upstream: None,
        }
    }

    #[test]
    fn test_render_clean_repository() {
        colored::control::set_override(false);
        let out = render_status(&info("main"), &StatusResult::default());
        assert!(out.contains("# On branch: main"));
        assert!(out.contains("working tree clean"));
    }

    #[test]
    fn test_render_groups_sections_in_order() {
        colored::control::set_override(false);
        let status = parse_status(b"UU both.txt\0MM a.txt\0?? new.txt\0");
        let mut repo = info("feature");
        repo.is_merging = true;
        repo.ahead = 2;

        let out = render_status(&repo, &status);
        assert!(out.contains("# On branch: feature (+2)"));
        assert!(out.contains("# Merge in progress"));

        let unmerged = out.find("Unmerged").unwrap();
        let staged = out.find("Changes to be committed").unwrap();
        let unstaged = out.find("Changes not staged").unwrap();
        let untracked = out.find("Untracked files").unwrap();
        assert!(unmerged < staged && staged < unstaged && unstaged < untracked);
        assert_eq!(out.matches("a.txt").count(), 2);
    }
}
