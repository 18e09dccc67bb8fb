//! Running-state checks against the OS process table.
//!
//! Tier 1 is an in-process snapshot: fast, but it cannot see into processes
//! owned by other sessions or running elevated. Tier 2 shells out to an
//! administrative enumeration that can, and its answer is authoritative.

use std::time::Duration;

use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};

pub const TIER1_TIMEOUT: Duration = Duration::from_secs(5);
pub const TIER2_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Prober {
    tier1_timeout: Duration,
    tier2_timeout: Duration,
}

impl Default for Prober {
    fn default() -> Self {
        Self {
            tier1_timeout: TIER1_TIMEOUT,
            tier2_timeout: TIER2_TIMEOUT,
        }
    }
}

impl Prober {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if any process's executable path equals `path`
    /// (case-insensitive). Query errors and timeouts count as "not found" at
    /// their tier; this never errors.
    pub fn is_running(&self, path: &str) -> bool {
        let own = path.to_string();
        let tier1 = run_bounded(self.tier1_timeout, move || process_table_has(&own));
        // A tier-1 "yes" is trustworthy; a "no" may just be a process we
        // cannot open, so fall through to the broader check.
        if tier1.unwrap_or(false) {
            return true;
        }
        admin_table_has(path, self.tier2_timeout)
    }
}

impl crate::orchestrator::SystemProbe for Prober {
    fn is_running(&self, path: &str) -> bool {
        Prober::is_running(self, path)
    }
}

/// Run `task` on a helper thread, give up after `timeout`. The task keeps
/// running past the deadline but its result is discarded.
fn run_bounded<T, F>(timeout: Duration, task: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = flume::bounded(1);
    std::thread::spawn(move || {
        let _ = tx.send(task());
    });
    rx.recv_timeout(timeout).ok()
}

fn process_table_has(path: &str) -> bool {
    let mut sys = System::new();
    sys.refresh_processes_specifics(
        ProcessesToUpdate::All,
        true,
        ProcessRefreshKind::nothing().with_exe(UpdateKind::Always),
    );
    sys.processes().values().any(|process| {
        process
            .exe()
            .is_some_and(|exe| exe.to_string_lossy().eq_ignore_ascii_case(path))
    })
}

/// Pids of every process whose executable path equals `path`.
#[cfg(windows)]
pub(crate) fn pids_for_path(path: &str) -> Vec<u32> {
    let mut sys = System::new();
    sys.refresh_processes_specifics(
        ProcessesToUpdate::All,
        true,
        ProcessRefreshKind::nothing().with_exe(UpdateKind::Always),
    );
    sys.processes()
        .values()
        .filter(|process| {
            process
                .exe()
                .is_some_and(|exe| exe.to_string_lossy().eq_ignore_ascii_case(path))
        })
        .map(|process| process.pid().as_u32())
        .collect()
}

#[cfg(windows)]
fn admin_table_has(path: &str, timeout: Duration) -> bool {
    let Some(raw) = admin_table_output(timeout) else {
        return false;
    };
    match parse_process_paths(&raw) {
        Some(paths) => paths.iter().any(|p| p.eq_ignore_ascii_case(path)),
        None => {
            tracing::debug!("administrative process query returned an unexpected shape");
            false
        }
    }
}

#[cfg(windows)]
fn admin_table_output(timeout: Duration) -> Option<String> {
    use std::os::windows::process::CommandExt;
    use std::process::Command;
    use tracing::debug;
    use windows::Win32::System::Threading::CREATE_NO_WINDOW;

    const ADMIN_PROCESS_QUERY: &str = "Get-CimInstance Win32_Process | \
         Select-Object -ExpandProperty ExecutablePath | ConvertTo-Json";

    let result = run_bounded(timeout, move || {
        Command::new("powershell")
            .args(["-NoProfile", "-NonInteractive", "-Command", ADMIN_PROCESS_QUERY])
            .creation_flags(CREATE_NO_WINDOW.0)
            .output()
    })?;
    match result {
        Ok(output) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(output) => {
            debug!("administrative process query exited with {}", output.status);
            None
        }
        Err(err) => {
            debug!("administrative process query failed to run: {err}");
            None
        }
    }
}

#[cfg(not(windows))]
fn admin_table_has(_path: &str, _timeout: Duration) -> bool {
    false
}

/// Strict schema for the helper's output: a JSON array of nullable strings,
/// one bare string, or null. Anything else is rejected wholesale.
#[cfg_attr(not(windows), allow(dead_code))]
fn parse_process_paths(raw: &str) -> Option<Vec<String>> {
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HelperOutput {
        Many(Vec<Option<String>>),
        One(Option<String>),
    }

    let raw = raw.trim();
    if raw.is_empty() {
        return Some(Vec::new());
    }
    match serde_json::from_str::<HelperOutput>(raw).ok()? {
        HelperOutput::Many(paths) => Some(paths.into_iter().flatten().collect()),
        HelperOutput::One(path) => Some(path.into_iter().collect()),
    }
}
