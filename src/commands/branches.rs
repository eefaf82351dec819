use crate::core::{
    error::Result,
    output::{format_ahead_behind, print_info, print_section_header},
    service::GitService,
    types::Branch,
};
use colored::*;

pub fn execute_branches(service: &dyn GitService) -> Result<()> {
    let branches = service.branches()?;
    if branches.is_empty() {
        print_info("No branches found. Make your first commit to create one.");
        return Ok(());
    }

    let (remote, local): (Vec<&Branch>, Vec<&Branch>) =
        branches.iter().partition(|b| b.is_remote);

    print_section_header("Local Branches");
    for branch in &local {
        println!("{}", format_branch(branch));
    }
    if !remote.is_empty() {
        print_section_header("Remote Branches");
        for branch in &remote {
            println!("{}", format_branch(branch));
        }
    }
    println!();
    Ok(())
}

/// `[*] main (+1/-2) <subject>` for the current branch, `[ ] name <subject>` otherwise.
pub fn format_branch(branch: &Branch) -> String {
    let marker = if branch.is_current { "*" } else { " " };
    let name = if branch.is_current {
        branch.name.blue().bold()
    } else {
        branch.name.blue()
    };
    format!(
        "{}{}{} {}{} {}",
        "[".bright_black(),
        marker.white(),
        "]".bright_black(),
        name,
        format_ahead_behind(branch.ahead, branch.behind),
        branch.subject.bright_black()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_current_branch() {
        colored::control::set_override(false);
        let branch = Branch {
            name: "main".to_string(),
            is_current: true,
            ahead: 1,
            behind: 2,
            subject: "Latest".to_string(),
            ..Branch::default()
        };
        assert_eq!(format_branch(&branch), "[*] main (+1/-2) Latest");
    }

    #[test]
    fn test_format_other_branch() {
        colored::control::set_override(false);
        let branch = Branch {
            name: "origin/topic".to_string(),
            is_remote: true,
            subject: "WIP".to_string(),
            ..Branch::default()
        };
        assert_eq!(format_branch(&branch), "[ ] origin/topic WIP");
    }
}
