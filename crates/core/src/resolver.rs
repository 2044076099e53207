//! Resolution of which window a substitute click activated.
//!
//! The shell gives no direct signal about which window a taskbar click
//! activated, so this module diffs two [`DesktopSnapshot`]s taken before
//! and after the click and applies three strategies in strict priority
//! order. The first strategy that yields a policy-approved candidate wins;
//! yielding no candidate is an expected outcome, not an error.

use serde::{Deserialize, Serialize};

use crate::{ClassPolicy, DesktopSnapshot, WindowId, WindowQuery};

/// Which observation identified the activated window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// Foreground focus moved to a different window.
    FocusChanged,
    /// A different window arrived at the top of the Z-order while the
    /// foreground stayed put.
    RaisedToTop,
    /// Nothing observable changed: the clicked taskbar button belonged to
    /// the window that was already focused.
    AlreadyFocused,
}

/// Pick the window the substitute click activated, if any.
///
/// Strategies, in priority order:
/// 1. the new foreground window, when it differs from the old one, is
///    still alive, and is closable;
/// 2. the new top of the Z-order, when it is closable and differs from the
///    old top (an empty old Z-order counts as different);
/// 3. the unchanged foreground window, when it is closable.
///
/// Strategy 2 does not check that the old top is still alive; a window
/// destroyed between the snapshots therefore reads as a top change.
pub fn resolve_activated_window(
    query: &impl WindowQuery,
    policy: &ClassPolicy,
    before: &DesktopSnapshot,
    after: &DesktopSnapshot,
) -> Option<(WindowId, Activation)> {
    if let Some(fg) = after.foreground {
        if before.foreground != Some(fg)
            && query.is_window(fg)
            && policy.is_closable_target(query, fg)
        {
            return Some((fg, Activation::FocusChanged));
        }
    }

    if let Some(&top) = after.z_order.first() {
        if policy.is_closable_target(query, top) && before.z_order.first() != Some(&top) {
            return Some((top, Activation::RaisedToTop));
        }
    }

    if let Some(fg) = after.foreground {
        if before.foreground == Some(fg) && policy.is_closable_target(query, fg) {
            return Some((fg, Activation::AlreadyFocused));
        }
    }

    None
}
