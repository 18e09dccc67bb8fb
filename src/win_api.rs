use std::{ffi::OsString, os::windows::ffi::OsStringExt};

use anyhow::{Context, Result};
use tracing::warn;
use windows::{
    Win32::{
        Foundation::{CloseHandle, HWND, LPARAM, RECT, TRUE, WPARAM},
        Graphics::Dwm::{DWMWA_EXTENDED_FRAME_BOUNDS, DwmGetWindowAttribute},
        System::Threading::{
            OpenProcess, PROCESS_NAME_FORMAT, PROCESS_QUERY_INFORMATION, PROCESS_TERMINATE,
            PROCESS_VM_READ, QueryFullProcessImageNameW, TerminateProcess,
        },
        UI::WindowsAndMessaging::{
            GetWindowTextLengthW, GetWindowTextW, GetWindowThreadProcessId, IsWindow, IsZoomed,
            PostMessageW, SW_MAXIMIZE, SW_RESTORE, SWP_NOZORDER, SetWindowPos, ShowWindow,
            WM_CLOSE,
        },
    },
    core::PWSTR,
};

use crate::types::WindowPlacement;

pub fn is_window(hwnd: HWND) -> bool {
    unsafe { IsWindow(Some(hwnd)) } == TRUE
}

pub fn is_zoomed(hwnd: HWND) -> bool {
    unsafe { IsZoomed(hwnd) } == TRUE
}

/// Un-minimize/un-maximize so a following move lands on a normal window.
pub fn restore_window(hwnd: HWND) {
    if !is_window(hwnd) {
        return;
    }
    let _ = unsafe { ShowWindow(hwnd, SW_RESTORE) };
}

pub fn maximize_window(hwnd: HWND) {
    if !is_window(hwnd) {
        return;
    }
    let _ = unsafe { ShowWindow(hwnd, SW_MAXIMIZE) };
}

/// Exact bounds, z-order untouched.
pub fn set_window_bounds(hwnd: HWND, x: i32, y: i32, width: i32, height: i32) {
    if !is_window(hwnd) {
        return;
    }
    if let Err(err) = unsafe { SetWindowPos(hwnd, None, x, y, width, height, SWP_NOZORDER) } {
        warn!("SetWindowPos failed for {:?}: {err}", hwnd);
    }
}

/// Restore first, then either maximize or apply the recorded bounds.
pub fn apply_placement(hwnd: HWND, placement: &WindowPlacement) {
    restore_window(hwnd);
    if placement.is_maximized {
        maximize_window(hwnd);
    } else {
        set_window_bounds(
            hwnd,
            placement.x,
            placement.y,
            placement.width,
            placement.height,
        );
    }
}

/// Ask the window to close itself (graceful, the app may prompt to save).
pub fn post_close(hwnd: HWND) -> Result<()> {
    unsafe { PostMessageW(Some(hwnd), WM_CLOSE, WPARAM(0), LPARAM(0)) }
        .context("PostMessageW(WM_CLOSE) failed")
}

pub fn terminate_pid(pid: u32) -> Result<()> {
    unsafe {
        let handle = OpenProcess(PROCESS_TERMINATE, false, pid)
            .with_context(|| format!("OpenProcess({pid}) failed"))?;
        let result = TerminateProcess(handle, 1);
        let _ = CloseHandle(handle);
        result.with_context(|| format!("TerminateProcess({pid}) failed"))
    }
}

pub fn get_app_title(hwnd: HWND) -> Option<String> {
    unsafe {
        let length = GetWindowTextLengthW(hwnd);
        if length == 0 {
            return None;
        }

        let mut buffer: Vec<u16> = vec![0; (length + 1) as usize];
        let copied = GetWindowTextW(hwnd, &mut buffer);

        if copied > 0 {
            buffer.truncate(copied as usize);
            Some(OsString::from_wide(&buffer).to_string_lossy().into_owned())
        } else {
            None
        }
    }
}

pub fn get_process_id(hwnd: HWND) -> Option<u32> {
    let mut process_id: u32 = 0;
    unsafe { GetWindowThreadProcessId(hwnd, Some(&mut process_id)) };
    (process_id != 0).then_some(process_id)
}

/// Full executable path of the process owning `hwnd`. None when the process
/// cannot be opened (gone, or owned by a higher-privilege session).
pub fn get_process_path(hwnd: HWND) -> Option<String> {
    let process_id = get_process_id(hwnd)?;
    unsafe {
        let process_handle = OpenProcess(
            PROCESS_QUERY_INFORMATION | PROCESS_VM_READ,
            false,
            process_id,
        )
        .ok()?;

        let mut path_buffer: Vec<u16> = vec![0; 1024];
        let mut size: u32 = path_buffer.len() as u32;

        let result = QueryFullProcessImageNameW(
            process_handle,
            PROCESS_NAME_FORMAT(0),
            PWSTR(path_buffer.as_mut_ptr()),
            &mut size,
        )
        .ok();

        let _ = CloseHandle(process_handle);

        if result.is_some() && size > 0 {
            path_buffer.truncate(size as usize);
            Some(
                OsString::from_wide(&path_buffer)
                    .to_string_lossy()
                    .into_owned(),
            )
        } else {
            None
        }
    }
}

/// Visible frame of the window as the user sees it (drop shadow excluded).
pub fn get_dwm_rect(hwnd: HWND) -> (i32, i32, i32, i32) {
    let mut rect = RECT::default();
    unsafe {
        let _ = DwmGetWindowAttribute(
            hwnd,
            DWMWA_EXTENDED_FRAME_BOUNDS,
            &mut rect as *mut _ as *mut _,
            std::mem::size_of::<RECT>() as u32,
        );
    }
    (
        rect.left,
        rect.top,
        rect.right - rect.left,
        rect.bottom - rect.top,
    )
}
