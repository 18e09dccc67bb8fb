//! Desktop snapshot: which GUI apps are running, and which windows they own.

use once_cell::sync::Lazy;

use crate::types::{RunningApp, WindowInfo, WorkspaceApp};

/// Processes living under these paths are OS plumbing, not launchable apps.
/// Matched case-insensitively as substrings of the resolved executable path.
static SYSTEM_PATH_DENYLIST: Lazy<Vec<String>> = Lazy::new(|| {
    let mut deny: Vec<String> = [
        r"\windows\system32",
        r"\windows\systemapps",
        r"\windows\winsxs",
        r"\windows\immersivecontrolpanel",
        r"\windows\explorer.exe",
    ]
    .iter()
    .map(|entry| entry.to_string())
    .collect();
    if let Ok(root) = std::env::var("SystemRoot") {
        let mut root = root.to_ascii_lowercase();
        if !root.ends_with('\\') {
            root.push('\\');
        }
        deny.push(root);
    }
    deny
});

pub fn is_system_path(path: &str) -> bool {
    let lowered = path.to_ascii_lowercase();
    SYSTEM_PATH_DENYLIST
        .iter()
        .any(|entry| lowered.contains(entry))
}

/// Case-insensitive executable-name match, tolerant of a missing `.exe`
/// suffix on either side.
pub fn name_matches(exe: &str, wanted: &str) -> bool {
    fn stem(name: &str) -> &str {
        let len = name.len();
        if len >= 4
            && name.is_char_boundary(len - 4)
            && name[len - 4..].eq_ignore_ascii_case(".exe")
        {
            &name[..len - 4]
        } else {
            name
        }
    }
    stem(exe).eq_ignore_ascii_case(stem(wanted))
}

/// One `RunningApp` per distinct executable name. Grouping is by name, not
/// path, so instances spawned through symlinked paths still collapse into
/// one entry; the first-seen path wins.
fn group_by_executable(windows: Vec<(String, String, u32, WindowInfo)>) -> Vec<RunningApp> {
    let mut apps: Vec<RunningApp> = Vec::new();
    for (exe, path, pid, info) in windows {
        if path.is_empty() || is_system_path(&path) {
            continue;
        }
        match apps.iter_mut().find(|app| name_matches(&app.name, &exe)) {
            Some(app) => {
                app.window_count += 1;
                app.windows.push(info);
            }
            None => apps.push(RunningApp {
                name: exe,
                path,
                pid,
                window_count: 1,
                windows: vec![info],
            }),
        }
    }
    apps
}

/// Snapshot the current desktop as persisted workspace entries.
pub fn capture_workspace_apps() -> Vec<WorkspaceApp> {
    list_running_apps()
        .iter()
        .map(RunningApp::to_workspace_app)
        .collect()
}

pub use imp::{find_main_window, list_running_apps};
#[cfg(windows)]
pub use imp::windows_for_pids;

#[cfg(windows)]
mod imp {
    use tracing::warn;
    use windows::{
        Win32::{
            Foundation::{HWND, LPARAM, TRUE},
            UI::WindowsAndMessaging::{
                EnumWindows, GA_ROOTOWNER, GWL_EXSTYLE, GetAncestor, GetWindowLongW,
                GetWindowTextLengthW, IsWindowVisible, WINDOW_EX_STYLE, WS_EX_TOOLWINDOW,
            },
        },
        core::BOOL,
    };

    use super::{group_by_executable, name_matches};
    use crate::{hwnd, types::RunningApp, win_api, window::AppWindow};

    extern "system" fn collect_hwnds(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let out = unsafe { &mut *(lparam.0 as *mut Vec<isize>) };
        out.push(hwnd.0 as isize);
        TRUE
    }

    fn all_top_level_windows() -> anyhow::Result<Vec<isize>> {
        let mut hwnds: Vec<isize> = Vec::new();
        unsafe { EnumWindows(Some(collect_hwnds), LPARAM(&mut hwnds as *mut _ as isize))? };
        Ok(hwnds)
    }

    /// Visible, titled, root-owned and not a tool window: what a user would
    /// call "an open app window".
    fn is_app_window(raw: isize) -> bool {
        let hwnd = hwnd!(raw);
        unsafe {
            if !IsWindowVisible(hwnd).as_bool() || GetWindowTextLengthW(hwnd) == 0 {
                return false;
            }
            if GetAncestor(hwnd, GA_ROOTOWNER) != hwnd {
                return false;
            }
            let ex_style = WINDOW_EX_STYLE(GetWindowLongW(hwnd, GWL_EXSTYLE) as u32);
            !ex_style.contains(WS_EX_TOOLWINDOW)
        }
    }

    pub fn list_running_apps() -> Vec<RunningApp> {
        let hwnds = match all_top_level_windows() {
            Ok(hwnds) => hwnds,
            Err(err) => {
                warn!("window enumeration failed: {err}");
                return Vec::new();
            }
        };
        let windows = hwnds
            .into_iter()
            .filter(|&raw| is_app_window(raw))
            .filter_map(|raw| AppWindow { hwnd: raw }.snapshot())
            .map(|snap| {
                let info = snap.to_window_info();
                (snap.exe, snap.exe_path, snap.pid, info)
            })
            .collect();
        group_by_executable(windows)
    }

    /// First window of a process matching `process_name` that currently has a
    /// non-empty title. The positioning target.
    pub fn find_main_window(process_name: &str) -> Option<isize> {
        for raw in all_top_level_windows().ok()? {
            if !is_app_window(raw) {
                continue;
            }
            let hwnd = hwnd!(raw);
            let Some(path) = win_api::get_process_path(hwnd) else {
                continue;
            };
            let exe = path.split('\\').next_back().unwrap_or_default();
            if name_matches(exe, process_name) {
                return Some(raw);
            }
        }
        None
    }

    /// Every top-level window owned by one of `pids`, titled or not. Used to
    /// deliver close requests.
    pub fn windows_for_pids(pids: &[u32]) -> Vec<isize> {
        let Ok(hwnds) = all_top_level_windows() else {
            return Vec::new();
        };
        hwnds
            .into_iter()
            .filter(|&raw| {
                win_api::get_process_id(hwnd!(raw)).is_some_and(|pid| pids.contains(&pid))
            })
            .collect()
    }
}

#[cfg(not(windows))]
mod imp {
    use tracing::warn;

    use crate::types::RunningApp;

    pub fn list_running_apps() -> Vec<RunningApp> {
        warn!("window enumeration is only available on Windows");
        super::group_by_executable(Vec::new())
    }

    pub fn find_main_window(_process_name: &str) -> Option<isize> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(title: &str) -> WindowInfo {
        WindowInfo {
            title: title.to_string(),
            handle: None,
            position: None,
        }
    }

    #[test]
    fn groups_by_executable_name() {
        let apps = group_by_executable(vec![
            (
                "editor.exe".into(),
                r"C:\apps\editor.exe".into(),
                10,
                window("a"),
            ),
            (
                "browser.exe".into(),
                r"C:\apps\browser.exe".into(),
                20,
                window("b"),
            ),
            (
                "EDITOR.EXE".into(),
                r"D:\links\editor.exe".into(),
                30,
                window("c"),
            ),
        ]);
        assert_eq!(apps.len(), 2);
        let editor = &apps[0];
        assert_eq!(editor.name, "editor.exe");
        // first-seen path wins for the whole group
        assert_eq!(editor.path, r"C:\apps\editor.exe");
        assert_eq!(editor.window_count, 2);
        assert_eq!(editor.windows.len(), 2);
    }

    #[test]
    fn system_and_empty_paths_are_dropped() {
        let apps = group_by_executable(vec![
            ("ghost.exe".into(), String::new(), 1, window("g")),
            (
                "svchost.exe".into(),
                r"C:\Windows\System32\svchost.exe".into(),
                2,
                window("s"),
            ),
            (
                "editor.exe".into(),
                r"C:\apps\editor.exe".into(),
                3,
                window("e"),
            ),
        ]);
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].name, "editor.exe");
    }

    #[test]
    fn denylist_match_is_case_insensitive() {
        assert!(is_system_path(r"c:\WINDOWS\SysTem32\cmd.exe"));
        assert!(is_system_path(r"C:\Windows\explorer.exe"));
        assert!(!is_system_path(r"C:\Program Files\Editor\editor.exe"));
    }

    #[test]
    fn name_matching_ignores_case_and_exe_suffix() {
        assert!(name_matches("Editor.exe", "editor"));
        assert!(name_matches("editor", "EDITOR.EXE"));
        assert!(!name_matches("editor.exe", "browser.exe"));
    }
}
