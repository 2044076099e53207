//! Low-level mouse hook lifecycle and substitute-click injection.
//!
//! The hook callback runs synchronously on a dedicated message-pump thread
//! owned by the OS input subsystem; blocking there gets the hook evicted.
//! Per event the callback only consults the pure filter, captures a
//! snapshot, injects the substitute click, and hands the rest to the
//! daemon over a channel.
//!
//! The hook is uninstalled for the duration of the injection so the
//! synthetic primary click is not re-intercepted by this same hook, then
//! reinstalled under a fresh handle. The handle lives in an atomic because
//! it is replaced from the hook callback and read once more during final
//! cleanup.

use std::sync::atomic::{AtomicBool, AtomicIsize, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, OnceLock};

use midclose_core::{
    filter_pointer_event, ClassPolicy, DesktopSnapshot, HookVerdict, PointerAction,
    PointerButton, PointerEvent, ScreenPoint,
};
use tracing::{debug, error, info, warn};
use windows::Win32::Foundation::{LPARAM, LRESULT, POINT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_MOUSE, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP,
    MOUSEINPUT, MOUSE_EVENT_FLAGS,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PostThreadMessageW, SetWindowsHookExW,
    TranslateMessage, UnhookWindowsHookEx, HHOOK, MSG, MSLLHOOKSTRUCT, WH_MOUSE_LL,
    WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MBUTTONDOWN, WM_MBUTTONUP, WM_MOUSEMOVE, WM_QUIT,
    WM_RBUTTONDOWN, WM_RBUTTONUP, WM_XBUTTONDOWN, WM_XBUTTONUP,
};

use crate::{Win32Desktop, Win32Error};

/// An intercepted taskbar middle-click, handed from the hook thread to the
/// daemon for delayed resolution.
#[derive(Debug, Clone)]
pub struct TaskbarClick {
    /// Where the gesture occurred.
    pub point: ScreenPoint,
    /// Desktop state captured before the substitute click was injected.
    pub before: DesktopSnapshot,
}

/// State shared between the hook callback, the handle, and resolution
/// guards. Installed once per process.
struct HookShared {
    /// The currently installed hook handle, or 0 while the hook is down
    /// during injection (and after final cleanup).
    hhook: AtomicIsize,
    /// Whether interception is active; when false every event is forwarded.
    enabled: AtomicBool,
    /// The single in-flight marker for a gesture whose resolution has not
    /// completed. Shared with [`InFlightGuard`]s.
    in_flight: Arc<AtomicBool>,
    policy: ClassPolicy,
    tx: Sender<TaskbarClick>,
}

static HOOK_SHARED: OnceLock<HookShared> = OnceLock::new();

/// Owner of the installed hook and its message-pump thread.
///
/// Dropping the handle wakes the pump with `WM_QUIT`, which uninstalls the
/// hook and ends the thread.
pub struct MouseHookHandle {
    thread: Option<std::thread::JoinHandle<()>>,
    thread_id: u32,
    in_flight: Arc<AtomicBool>,
}

impl MouseHookHandle {
    /// Enable or disable interception without uninstalling the hook.
    pub fn set_enabled(&self, enabled: bool) {
        if let Some(shared) = HOOK_SHARED.get() {
            shared.enabled.store(enabled, Ordering::Release);
        }
    }

    /// Take the guard that clears the in-flight flag when resolution ends.
    ///
    /// The flag was set by the hook callback when it accepted the gesture;
    /// the guard clears it on drop, so every exit path of the resolution
    /// task (including panics) releases the gesture.
    pub fn resolution_guard(&self) -> InFlightGuard {
        InFlightGuard(self.in_flight.clone())
    }
}

impl Drop for MouseHookHandle {
    fn drop(&mut self) {
        unsafe {
            let _ = PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Clears the in-flight flag on drop.
pub struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Install the system-wide low-level mouse hook.
///
/// Spawns the `mouse-hook` pump thread and blocks until installation
/// succeeds or fails there. Intercepted clicks arrive on the returned
/// receiver. Only one hook per process; a second call fails.
pub fn install_mouse_hook(
    policy: ClassPolicy,
    start_enabled: bool,
) -> Result<(MouseHookHandle, Receiver<TaskbarClick>), Win32Error> {
    let (tx, rx) = std::sync::mpsc::channel();
    let in_flight = Arc::new(AtomicBool::new(false));

    let shared = HookShared {
        hhook: AtomicIsize::new(0),
        enabled: AtomicBool::new(start_enabled),
        in_flight: in_flight.clone(),
        policy,
        tx,
    };
    if HOOK_SHARED.set(shared).is_err() {
        return Err(Win32Error::HookAlreadyInstalled);
    }

    let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<u32, String>>();

    let thread = std::thread::Builder::new()
        .name("mouse-hook".to_string())
        .spawn(move || {
            // Set above, never unset.
            let Some(shared) = HOOK_SHARED.get() else {
                let _ = ready_tx.send(Err("hook state missing".to_string()));
                return;
            };

            let hook = match unsafe { SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_hook_proc), None, 0) } {
                Ok(hook) => hook,
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
            };
            shared.hhook.store(hook.0 as isize, Ordering::SeqCst);

            let thread_id = unsafe { GetCurrentThreadId() };
            let _ = ready_tx.send(Ok(thread_id));
            info!("Low-level mouse hook installed");

            // Low-level hooks only fire while this thread pumps messages.
            let mut msg = MSG::default();
            loop {
                let ret = unsafe { GetMessageW(&mut msg, None, 0, 0) };
                if ret.0 <= 0 || msg.message == WM_QUIT {
                    break;
                }
                unsafe {
                    let _ = TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                }
            }

            let hook = shared.hhook.swap(0, Ordering::SeqCst);
            if hook != 0 {
                unsafe {
                    let _ = UnhookWindowsHookEx(HHOOK(hook as *mut _));
                }
            }
            info!("Mouse hook removed, pump thread exiting");
        })
        .map_err(|e| Win32Error::HookThreadFailed(e.to_string()))?;

    let thread_id = match ready_rx.recv() {
        Ok(Ok(thread_id)) => thread_id,
        Ok(Err(message)) => {
            let _ = thread.join();
            return Err(Win32Error::HookInstallFailed(message));
        }
        Err(_) => {
            let _ = thread.join();
            return Err(Win32Error::HookInstallFailed(
                "hook thread exited before reporting".to_string(),
            ));
        }
    };

    Ok((
        MouseHookHandle {
            thread: Some(thread),
            thread_id,
            in_flight,
        },
        rx,
    ))
}

/// Map a hook message to a pointer event, or `None` for messages the
/// filter has no opinion on (wheel, horizontal wheel, ...).
fn pointer_event_from(message: u32, point: POINT) -> Option<PointerEvent> {
    let (button, action) = match message {
        WM_LBUTTONDOWN => (PointerButton::Primary, PointerAction::Down),
        WM_LBUTTONUP => (PointerButton::Primary, PointerAction::Up),
        WM_RBUTTONDOWN => (PointerButton::Secondary, PointerAction::Down),
        WM_RBUTTONUP => (PointerButton::Secondary, PointerAction::Up),
        WM_MBUTTONDOWN => (PointerButton::Middle, PointerAction::Down),
        WM_MBUTTONUP => (PointerButton::Middle, PointerAction::Up),
        WM_XBUTTONDOWN => (PointerButton::Other, PointerAction::Down),
        WM_XBUTTONUP => (PointerButton::Other, PointerAction::Up),
        WM_MOUSEMOVE => (PointerButton::Other, PointerAction::Move),
        _ => return None,
    };
    Some(PointerEvent {
        button,
        action,
        point: ScreenPoint::new(point.x, point.y),
    })
}

fn mouse_input(flags: MOUSE_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: 0,
                dy: 0,
                mouseData: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

/// Replace the swallowed middle-click with a primary click at the current
/// cursor position.
///
/// Sequence: uninstall the hook, inject primary down+up, reinstall the
/// hook. Each step runs even if an earlier one failed; a failed reinstall
/// leaves interception dead and is reported loudly.
fn reinject_primary_click(shared: &HookShared) {
    let old = shared.hhook.swap(0, Ordering::SeqCst);
    if old != 0 {
        if let Err(e) = unsafe { UnhookWindowsHookEx(HHOOK(old as *mut _)) } {
            warn!("Failed to remove hook before injection: {}", e);
        }
    }

    let inputs = [
        mouse_input(MOUSEEVENTF_LEFTDOWN),
        mouse_input(MOUSEEVENTF_LEFTUP),
    ];
    let sent = unsafe { SendInput(&inputs, std::mem::size_of::<INPUT>() as i32) };
    if sent != inputs.len() as u32 {
        warn!("Substitute click only partially injected ({}/2 events)", sent);
    }

    match unsafe { SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_hook_proc), None, 0) } {
        Ok(hook) => {
            shared.hhook.store(hook.0 as isize, Ordering::SeqCst);
        }
        Err(e) => {
            error!(
                "Failed to reinstall mouse hook after injection: {}. \
                 Interception is dead until the daemon restarts.",
                e
            );
        }
    }
}

unsafe extern "system" fn mouse_hook_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code < 0 {
        return CallNextHookEx(None, code, wparam, lparam);
    }
    let Some(shared) = HOOK_SHARED.get() else {
        return CallNextHookEx(None, code, wparam, lparam);
    };
    if !shared.enabled.load(Ordering::Acquire) {
        return CallNextHookEx(None, code, wparam, lparam);
    }

    let data = &*(lparam.0 as *const MSLLHOOKSTRUCT);
    let Some(event) = pointer_event_from(wparam.0 as u32, data.pt) else {
        return CallNextHookEx(None, code, wparam, lparam);
    };

    let desktop = Win32Desktop;
    let in_flight = shared.in_flight.load(Ordering::Acquire);
    let verdict = filter_pointer_event(&event, in_flight, |pt| {
        shared.policy.is_taskbar_point(&desktop, pt)
    });

    match verdict {
        HookVerdict::Forward => CallNextHookEx(None, code, wparam, lparam),
        HookVerdict::Consume => LRESULT(1),
        HookVerdict::BeginInterception(point) => {
            debug!("Middle click on taskbar at ({}, {})", point.x, point.y);
            shared.in_flight.store(true, Ordering::Release);

            let before = DesktopSnapshot::capture(&desktop, &shared.policy);
            reinject_primary_click(shared);

            if shared.tx.send(TaskbarClick { point, before }).is_err() {
                // Receiver is gone; nobody will resolve this gesture, so
                // release it here or button-ups stay swallowed forever.
                shared.in_flight.store(false, Ordering::Release);
            }
            LRESULT(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_guard_clears_on_drop() {
        let flag = Arc::new(AtomicBool::new(true));
        {
            let _guard = InFlightGuard(flag.clone());
            assert!(flag.load(Ordering::Acquire));
        }
        assert!(!flag.load(Ordering::Acquire));
    }

    #[test]
    fn test_pointer_event_mapping() {
        let pt = POINT { x: 10, y: 20 };
        let ev = pointer_event_from(WM_MBUTTONDOWN, pt).unwrap();
        assert_eq!(ev.button, PointerButton::Middle);
        assert_eq!(ev.action, PointerAction::Down);
        assert_eq!(ev.point, ScreenPoint::new(10, 20));

        let ev = pointer_event_from(WM_MBUTTONUP, pt).unwrap();
        assert_eq!(ev.action, PointerAction::Up);

        let ev = pointer_event_from(WM_LBUTTONDOWN, pt).unwrap();
        assert_eq!(ev.button, PointerButton::Primary);

        // Wheel messages carry no verdict-relevant button.
        assert!(pointer_event_from(0x020A, pt).is_none());
    }
}
