//! Midclose Platform Win32
//!
//! Windows-specific half of the interception pipeline.
//!
//! This crate handles:
//! - The live [`WindowQuery`] implementation over user32 calls
//! - Desktop snapshot capture from the real window list
//! - The low-level mouse hook lifecycle (see [`hook`])
//! - Close dispatch via `WM_CLOSE` and process-identity lookup

pub mod hook;

use midclose_core::{ClassPolicy, DesktopSnapshot, ScreenPoint, WindowId, WindowQuery};
use thiserror::Error;
use windows::Win32::Foundation::{CloseHandle, FALSE, HWND, LPARAM, POINT, WPARAM};
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32,
    PROCESS_QUERY_LIMITED_INFORMATION,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetClassNameW, GetForegroundWindow, GetParent, GetTopWindow, GetWindow,
    GetWindowTextW, GetWindowThreadProcessId, IsWindow, IsWindowVisible, PostMessageW,
    WindowFromPoint, GW_HWNDNEXT, GW_OWNER, WM_CLOSE,
};

/// Errors that can occur during Win32 operations.
#[derive(Debug, Error)]
pub enum Win32Error {
    #[error("Failed to install mouse hook: {0}")]
    HookInstallFailed(String),

    #[error("Mouse hook is already installed in this process")]
    HookAlreadyInstalled,

    #[error("Failed to spawn hook thread: {0}")]
    HookThreadFailed(String),

    #[error("Failed to post close request to window {0}: {1}")]
    CloseFailed(WindowId, String),
}

fn to_hwnd(id: WindowId) -> HWND {
    HWND(id as isize as *mut core::ffi::c_void)
}

fn from_hwnd(hwnd: HWND) -> WindowId {
    hwnd.0 as isize as u64
}

fn utf16_to_string(buf: &[u16], len: i32) -> String {
    if len <= 0 {
        return String::new();
    }
    String::from_utf16_lossy(&buf[..len as usize])
}

/// The live desktop, queried through user32.
///
/// A zero-sized view; every method is a fresh OS call, so results reflect
/// the desktop at the moment of the call.
#[derive(Debug, Clone, Copy, Default)]
pub struct Win32Desktop;

impl WindowQuery for Win32Desktop {
    fn is_window(&self, id: WindowId) -> bool {
        id != 0 && unsafe { IsWindow(Some(to_hwnd(id))) }.as_bool()
    }

    fn class_name(&self, id: WindowId) -> String {
        let mut buf = [0u16; 256];
        let len = unsafe { GetClassNameW(to_hwnd(id), &mut buf) };
        utf16_to_string(&buf, len)
    }

    fn parent(&self, id: WindowId) -> Option<WindowId> {
        unsafe { GetParent(to_hwnd(id)) }
            .ok()
            .filter(|h| !h.is_invalid())
            .map(from_hwnd)
    }

    fn owner(&self, id: WindowId) -> Option<WindowId> {
        unsafe { GetWindow(to_hwnd(id), GW_OWNER) }
            .ok()
            .filter(|h| !h.is_invalid())
            .map(from_hwnd)
    }

    fn is_visible(&self, id: WindowId) -> bool {
        unsafe { IsWindowVisible(to_hwnd(id)) }.as_bool()
    }

    fn title(&self, id: WindowId) -> String {
        let mut buf = [0u16; 512];
        let len = unsafe { GetWindowTextW(to_hwnd(id), &mut buf) };
        utf16_to_string(&buf, len)
    }

    fn foreground_window(&self) -> Option<WindowId> {
        let hwnd = unsafe { GetForegroundWindow() };
        if hwnd.is_invalid() {
            None
        } else {
            Some(from_hwnd(hwnd))
        }
    }

    fn windows_top_to_bottom(&self) -> Vec<WindowId> {
        let mut out = Vec::new();
        let mut current = unsafe { GetTopWindow(None) }.ok().filter(|h| !h.is_invalid());
        while let Some(hwnd) = current {
            out.push(from_hwnd(hwnd));
            current = unsafe { GetWindow(hwnd, GW_HWNDNEXT) }
                .ok()
                .filter(|h| !h.is_invalid());
        }
        out
    }

    fn window_at(&self, point: ScreenPoint) -> Option<WindowId> {
        let hwnd = unsafe {
            WindowFromPoint(POINT {
                x: point.x,
                y: point.y,
            })
        };
        if hwnd.is_invalid() {
            None
        } else {
            Some(from_hwnd(hwnd))
        }
    }
}

/// Capture the current desktop state through the live query.
pub fn capture_snapshot(policy: &ClassPolicy) -> DesktopSnapshot {
    DesktopSnapshot::capture(&Win32Desktop, policy)
}

/// Post an asynchronous close request to a window.
///
/// The window may honor it, prompt the user, or ignore it; the outcome is
/// not observed here.
pub fn close_window(id: WindowId) -> Result<(), Win32Error> {
    unsafe { PostMessageW(Some(to_hwnd(id)), WM_CLOSE, WPARAM(0), LPARAM(0)) }
        .map_err(|e| Win32Error::CloseFailed(id, e.to_string()))
}

/// The process id owning a window, if the window is still alive.
pub fn window_process_id(id: WindowId) -> Option<u32> {
    let mut pid = 0u32;
    let thread = unsafe { GetWindowThreadProcessId(to_hwnd(id), Some(&mut pid)) };
    if thread == 0 || pid == 0 {
        None
    } else {
        Some(pid)
    }
}

/// Executable name (file stem) of a process, for diagnostics.
pub fn process_image_name(pid: u32) -> Option<String> {
    let handle = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, FALSE, pid) }.ok()?;
    let mut buf = [0u16; 1024];
    let mut len = buf.len() as u32;
    let result = unsafe {
        QueryFullProcessImageNameW(
            handle,
            PROCESS_NAME_WIN32,
            windows::core::PWSTR(buf.as_mut_ptr()),
            &mut len,
        )
    };
    unsafe {
        let _ = CloseHandle(handle);
    }
    result.ok()?;
    let path = String::from_utf16_lossy(&buf[..len as usize]);
    path.rsplit(['\\', '/'])
        .next()
        .map(|name| name.trim_end_matches(".exe").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_id_handle_round_trip() {
        for id in [1u64, 0x0004_2A3Cu64, u32::MAX as u64] {
            assert_eq!(from_hwnd(to_hwnd(id)), id);
        }
    }

    #[test]
    fn test_utf16_conversion_respects_length() {
        let buf: Vec<u16> = "Shell_TrayWnd\0\0garbage".encode_utf16().collect();
        assert_eq!(utf16_to_string(&buf, 13), "Shell_TrayWnd");
        assert_eq!(utf16_to_string(&buf, 0), "");
        assert_eq!(utf16_to_string(&buf, -1), "");
    }
}
