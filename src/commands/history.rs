use crate::core::{
    error::Result,
    service::GitService,
    types::{Commit, RefKind},
};
use colored::*;

pub fn execute_log(service: &dyn GitService, limit: usize, graph: bool) -> Result<()> {
    if graph {
        for entry in service.log_graph(limit)? {
            match &entry.commit {
                Some(commit) => println!("{}{}", entry.graph.bright_black(), format_commit(commit)),
                None => println!("{}", entry.graph.bright_black()),
            }
        }
        return Ok(());
    }

    let commits = service.log(limit, &[])?;
    if commits.is_empty() {
        println!("\n{}\n", "No commits yet".white());
        return Ok(());
    }
    println!();
    for commit in &commits {
        println!("{}", format_commit(commit));
    }
    println!();
    Ok(())
}

/// `<short hash> (<refs>) <subject> <author>, <relative date>`
pub fn format_commit(commit: &Commit) -> String {
    let mut line = format!("{}", commit.short_hash.yellow());
    let refs = format_refs(commit);
    if !refs.is_empty() {
        line.push_str(&format!(" {}{}{}", "(".bright_black(), refs, ")".bright_black()));
    }
    line.push_str(&format!(
        " {} {}",
        commit.subject.white(),
        format!("{}, {}", commit.author, commit.relative_date).bright_black()
    ));
    line
}

fn format_refs(commit: &Commit) -> String {
    commit
        .refs
        .iter()
        .map(|r| match (r.kind, &r.remote) {
            (RefKind::Head, _) => format!("HEAD -> {}", r.name).cyan().bold().to_string(),
            (RefKind::Tag, _) => format!("tag: {}", r.name).yellow().to_string(),
            (RefKind::RemoteBranch, Some(remote)) => format!("{remote}/{}", r.name).red().to_string(),
            (RefKind::Stash, _) => r.name.magenta().to_string(),
            _ => r.name.green().to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
