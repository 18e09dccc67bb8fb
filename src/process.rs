//! Process spawn/terminate primitives behind the orchestrator's
//! `ProcessControl` seam.

use std::time::Duration;

use anyhow::{Context, Result};

use crate::orchestrator::ProcessControl;

pub const CLOSE_GRACE: Duration = Duration::from_millis(500);

pub struct ProcessManager {
    close_grace: Duration,
}

impl Default for ProcessManager {
    fn default() -> Self {
        Self {
            close_grace: CLOSE_GRACE,
        }
    }
}

impl ProcessManager {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProcessControl for ProcessManager {
    fn spawn_detached(&self, path: &str) -> Result<()> {
        spawn_detached(path)
    }

    fn close_all(&self, path: &str) -> Result<usize> {
        close_all(path, self.close_grace)
    }
}

/// Start the executable without waiting on it. Only an immediate spawn
/// failure (bad path, access denied) is reported; whatever the process does
/// afterwards is its own business.
pub fn spawn_detached(path: &str) -> Result<()> {
    let mut cmd = std::process::Command::new(path);
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        use windows::Win32::System::Threading::{CREATE_NEW_PROCESS_GROUP, DETACHED_PROCESS};
        cmd.creation_flags((DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP).0);
    }
    cmd.spawn().with_context(|| format!("failed to start {path}"))?;
    Ok(())
}

/// Ask every process whose executable path equals `path` to close its
/// windows, give it `grace` to comply, then force-terminate the rest.
/// Returns how many processes were asked.
#[cfg(windows)]
pub fn close_all(path: &str, grace: Duration) -> Result<usize> {
    use tracing::{debug, warn};

    use crate::{hwnd, inspector, prober, win_api};

    let pids = prober::pids_for_path(path);
    if pids.is_empty() {
        return Ok(0);
    }
    debug!("closing {} process(es) for {path}", pids.len());

    for raw in inspector::windows_for_pids(&pids) {
        if let Err(err) = win_api::post_close(hwnd!(raw)) {
            warn!("close request for window {raw} failed: {err}");
        }
    }
    std::thread::sleep(grace);

    let mut first_err: Option<anyhow::Error> = None;
    for pid in prober::pids_for_path(path) {
        debug!("process {pid} survived the grace period, terminating");
        if let Err(err) = win_api::terminate_pid(pid) {
            warn!("force-terminate of {pid} failed: {err}");
            first_err.get_or_insert(err);
        }
    }
    match first_err {
        Some(err) => Err(err.context(format!("failed to close {path}"))),
        None => Ok(pids.len()),
    }
}

#[cfg(not(windows))]
pub fn close_all(path: &str, _grace: Duration) -> Result<usize> {
    tracing::warn!("process termination is only available on Windows, ignoring {path}");
    Ok(0)
}
