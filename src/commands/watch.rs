use crate::commands::status::render_status;
use crate::core::{
    bootstrap::Session,
    error::Result,
    output::{print_info, print_success},
};
use log::info;

/// Print status now and again on every refresh notification.
///
/// Returns after `max_refreshes` notifications when given, otherwise when the
/// watcher stops.
pub fn execute_watch(session: &Session, max_refreshes: Option<usize>) -> Result<()> {
    let service = session.service();
    let (mut watcher, refreshes) = session.watch()?;
    print_success(&format!("Watching {}", service.repo_root().display()));
    print!("{}", render_status(&service.repo_info()?, &service.status()?));

    let mut seen = 0;
    for _ in refreshes.iter() {
        info!("refresh requested");
        session.refresh();
        print!("{}", render_status(&service.repo_info()?, &service.status()?));
        seen += 1;
        if max_refreshes.is_some_and(|max| seen >= max) {
            watcher.stop();
            return Ok(());
        }
    }

    print_info("Watcher stopped. Run `git-conduit status` to refresh manually.");
    Ok(())
}
