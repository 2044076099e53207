//! The synchronous pointer-event filter.
//!
//! The hook callback must answer "consume or forward?" for every pointer
//! event in the system without blocking. The decision itself is a pure
//! function, kept here so it can be tested without installing a hook; the
//! platform layer supplies the in-flight flag and the taskbar hit-test and
//! acts on the verdict.

use serde::{Deserialize, Serialize};

use crate::ScreenPoint;

/// Pointer button identity as seen by the hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerButton {
    Primary,
    Middle,
    Secondary,
    Other,
}

/// What the button did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerAction {
    Down,
    Up,
    Move,
}

/// One pointer event delivered to the hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub button: PointerButton,
    pub action: PointerAction,
    pub point: ScreenPoint,
}

/// Filter decision for a single pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookVerdict {
    /// Pass the event to the next hook in the chain.
    Forward,
    /// Swallow the event.
    Consume,
    /// Swallow the event and start an interception at this point: snapshot
    /// the desktop, inject the substitute click, schedule resolution.
    BeginInterception(ScreenPoint),
}

/// Decide the fate of one pointer event.
///
/// A middle-button-down over the taskbar begins an interception. A
/// middle-button-up is swallowed while a gesture is in flight so the shell
/// never sees an unpaired button-up. Everything else is forwarded
/// untouched. `over_taskbar` is only invoked for middle-button-downs.
pub fn filter_pointer_event(
    event: &PointerEvent,
    in_flight: bool,
    over_taskbar: impl FnOnce(ScreenPoint) -> bool,
) -> HookVerdict {
    match (event.button, event.action) {
        (PointerButton::Middle, PointerAction::Down) => {
            if over_taskbar(event.point) {
                HookVerdict::BeginInterception(event.point)
            } else {
                HookVerdict::Forward
            }
        }
        (PointerButton::Middle, PointerAction::Up) => {
            if in_flight {
                HookVerdict::Consume
            } else {
                HookVerdict::Forward
            }
        }
        _ => HookVerdict::Forward,
    }
}
