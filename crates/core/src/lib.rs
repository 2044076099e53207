//! Midclose Core
//!
//! Platform-agnostic heuristics for the taskbar middle-click-to-close
//! pipeline.
//!
//! This crate decides, it never touches the OS:
//! - Is a window part of the shell taskbar? ([`ClassPolicy::is_taskbar_window`])
//! - May a window be closed at all? ([`ClassPolicy::is_closable_target`])
//! - Which window did a substitute click activate? ([`resolve_activated_window`])
//! - Should a raw pointer event be consumed or forwarded? ([`filter_pointer_event`])
//!
//! Everything is expressed against the narrow [`WindowQuery`] capability
//! trait so the heuristics run identically against the live Win32 desktop
//! and against an in-memory fake in tests.

use serde::{Deserialize, Serialize};

pub mod filter;
pub mod resolver;
pub mod snapshot;
pub mod taskbar;

pub use filter::{filter_pointer_event, HookVerdict, PointerAction, PointerButton, PointerEvent};
pub use resolver::{resolve_activated_window, Activation};
pub use snapshot::DesktopSnapshot;
pub use taskbar::ClassPolicy;

#[cfg(test)]
pub(crate) mod fake;

/// Unique identifier for a window.
/// On Windows, this is the HWND cast to u64. The referenced window may be
/// destroyed at any time; liveness must be re-checked before each use.
pub type WindowId = u64;

/// A point in screen coordinates (pixels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

impl ScreenPoint {
    /// Create a new screen point.
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Read-only view of the windowing system.
///
/// The platform crate implements this over live Win32 calls; tests use an
/// in-memory fake. Queries about a dead window return the "empty" value
/// (`false`, `None`, or an empty string) rather than an error — a window
/// disappearing mid-query is an expected outcome, not a fault.
pub trait WindowQuery {
    /// Whether `id` still refers to a live window.
    fn is_window(&self, id: WindowId) -> bool;

    /// The window's class name, or an empty string if unavailable.
    fn class_name(&self, id: WindowId) -> String;

    /// The window's parent in the ancestor chain, if any.
    fn parent(&self, id: WindowId) -> Option<WindowId>;

    /// The window's owner, if any. Owned windows are not top-level.
    fn owner(&self, id: WindowId) -> Option<WindowId>;

    /// Whether the window is currently visible.
    fn is_visible(&self, id: WindowId) -> bool;

    /// The window's title text, or an empty string.
    fn title(&self, id: WindowId) -> String;

    /// The window that currently has foreground focus.
    fn foreground_window(&self) -> Option<WindowId>;

    /// All top-level sibling windows, topmost first.
    ///
    /// This is the raw Z-order walk; callers apply their own filtering.
    fn windows_top_to_bottom(&self) -> Vec<WindowId>;

    /// Hit-test a screen point to the window under it, if any.
    fn window_at(&self, point: ScreenPoint) -> Option<WindowId>;
}
