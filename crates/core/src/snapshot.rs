//! Point-in-time captures of desktop window state.

use serde::{Deserialize, Serialize};

use crate::{ClassPolicy, WindowId, WindowQuery};

/// Foreground window plus filtered Z-order at one instant.
///
/// Two snapshots taken around a substitute click are the resolver's only
/// input; snapshots are never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesktopSnapshot {
    /// The window holding foreground focus, if any.
    pub foreground: Option<WindowId>,
    /// Visible top-level windows, topmost first. Excludes owned windows,
    /// untitled windows, and protected shell windows.
    pub z_order: Vec<WindowId>,
}

impl DesktopSnapshot {
    /// Capture the current desktop state.
    ///
    /// A pure read with no side effects, O(number of top-level windows).
    /// This runs adjacent to the hook callback and must stay cheap.
    pub fn capture(query: &impl WindowQuery, policy: &ClassPolicy) -> Self {
        let z_order = query
            .windows_top_to_bottom()
            .into_iter()
            .filter(|&id| {
                query.is_visible(id)
                    && query.owner(id).is_none()
                    && !query.title(id).is_empty()
                    && policy.is_closable_target(query, id)
            })
            .collect();
        Self {
            foreground: query.foreground_window(),
            z_order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeDesktop;

    #[test]
    fn capture_keeps_only_visible_titled_unowned_windows() {
        let mut desktop = FakeDesktop::new();
        let app = desktop.add_window(1, "Notepad", "Untitled - Notepad", true);
        desktop.add_window(2, "HiddenApp", "Hidden", false);
        desktop.add_window(3, "NoTitle", "", true);
        let dialog_owner = desktop.add_window(4, "OwnerApp", "Owner", true);
        desktop.add_owned(5, "DialogClass", "Save As", dialog_owner);
        desktop.add_window(6, "Shell_TrayWnd", "Taskbar", true);
        desktop.set_foreground(Some(app));

        let snap = DesktopSnapshot::capture(&desktop, &ClassPolicy::default());
        assert_eq!(snap.foreground, Some(app));
        assert_eq!(snap.z_order, vec![app, dialog_owner]);
    }

    #[test]
    fn capture_preserves_z_order() {
        let mut desktop = FakeDesktop::new();
        let a = desktop.add_window(1, "AppA", "A", true);
        let b = desktop.add_window(2, "AppB", "B", true);
        let c = desktop.add_window(3, "AppC", "C", true);
        desktop.raise_to_top(c);

        let snap = DesktopSnapshot::capture(&desktop, &ClassPolicy::default());
        assert_eq!(snap.z_order, vec![c, a, b]);
    }

    #[test]
    fn capture_of_empty_desktop_is_empty() {
        let desktop = FakeDesktop::new();
        let snap = DesktopSnapshot::capture(&desktop, &ClassPolicy::default());
        assert_eq!(snap, DesktopSnapshot::default());
    }
}
