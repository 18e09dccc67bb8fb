use windows::Win32::Foundation::HWND;

use crate::{
    hwnd,
    types::{WindowInfo, WindowPlacement},
    win_api,
};

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct AppWindow {
    pub hwnd: isize,
}

impl From<HWND> for AppWindow {
    fn from(value: HWND) -> Self {
        Self {
            hwnd: value.0 as isize,
        }
    }
}

/// Everything the inspector needs to know about one window, resolved in one
/// pass. Windows whose owning process cannot be opened resolve to None.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSnapshot {
    pub hwnd: isize,
    pub pid: u32,
    pub exe: String,
    pub exe_path: String,
    pub title: String,
    pub placement: WindowPlacement,
}

impl AppWindow {
    pub fn snapshot(&self) -> Option<WindowSnapshot> {
        let hwnd = hwnd!(self.hwnd);
        let exe_path = win_api::get_process_path(hwnd)?;
        let exe = exe_path.split('\\').next_back()?.to_string();
        let title = win_api::get_app_title(hwnd)?;
        let pid = win_api::get_process_id(hwnd).unwrap_or(0);
        let (x, y, width, height) = win_api::get_dwm_rect(hwnd);
        Some(WindowSnapshot {
            hwnd: self.hwnd,
            pid,
            exe,
            exe_path,
            title,
            placement: WindowPlacement {
                x,
                y,
                width,
                height,
                is_maximized: win_api::is_zoomed(hwnd),
            },
        })
    }
}

impl WindowSnapshot {
    pub fn to_window_info(&self) -> WindowInfo {
        WindowInfo {
            title: self.title.clone(),
            handle: Some(self.hwnd.to_string()),
            position: Some(self.placement),
        }
    }
}
