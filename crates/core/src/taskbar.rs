//! Taskbar region classification and close-target validation.
//!
//! Both checks are substring matches against window class names. The
//! built-in fragment lists cover the classic and modern Windows shells;
//! configuration may append fragments but never remove the built-ins.

use crate::{ScreenPoint, WindowId, WindowQuery};

/// Class-name fragments that identify the shell taskbar and its children:
/// the primary and secondary tray windows, the task list and task switcher,
/// and the toolbar/rebar containers they sit in.
pub const TASKBAR_CLASS_FRAGMENTS: &[&str] = &[
    "Shell_TrayWnd",
    "Shell_SecondaryTrayWnd",
    "TaskList",
    "MSTaskSwWClass",
    "ReBarWindow32",
    "ToolbarWindow32",
];

/// Class-name fragments of shell infrastructure that must never receive a
/// close request: tray windows, the desktop (Progman/WorkerW), and the
/// modern shell core window.
pub const PROTECTED_CLASS_FRAGMENTS: &[&str] = &[
    "Shell_TrayWnd",
    "Shell_SecondaryTrayWnd",
    "Progman",
    "WorkerW",
    "Windows.UI.Core.CoreWindow",
];

/// Upper bound on the ancestor walk when classifying a point as taskbar.
/// Ancestor chains are unbounded in principle; a taskbar button is always
/// shallowly nested under one of the known container classes, so ten hops
/// is a generous margin.
pub const MAX_ANCESTOR_HOPS: usize = 10;

/// Class-name policy for region classification and target validation.
///
/// Holds the built-in fragment lists plus any configured extras.
#[derive(Debug, Clone)]
pub struct ClassPolicy {
    taskbar_fragments: Vec<String>,
    protected_fragments: Vec<String>,
}

impl Default for ClassPolicy {
    fn default() -> Self {
        Self::with_extras(&[], &[])
    }
}

impl ClassPolicy {
    /// Build a policy from the built-in lists plus configured extras.
    pub fn with_extras(extra_taskbar: &[String], extra_protected: &[String]) -> Self {
        let taskbar_fragments = TASKBAR_CLASS_FRAGMENTS
            .iter()
            .map(|s| s.to_string())
            .chain(extra_taskbar.iter().cloned())
            .collect();
        let protected_fragments = PROTECTED_CLASS_FRAGMENTS
            .iter()
            .map(|s| s.to_string())
            .chain(extra_protected.iter().cloned())
            .collect();
        Self {
            taskbar_fragments,
            protected_fragments,
        }
    }

    /// Whether `id` belongs to the shell taskbar.
    ///
    /// Walks the ancestor chain starting at `id`, at most
    /// [`MAX_ANCESTOR_HOPS`] hops, and returns true on the first window
    /// whose class name contains a taskbar fragment. Returns false when the
    /// bound is exhausted or an ancestor-less window is reached.
    pub fn is_taskbar_window(&self, query: &impl WindowQuery, id: WindowId) -> bool {
        let mut current = id;
        for _ in 0..MAX_ANCESTOR_HOPS {
            let class = query.class_name(current);
            if self.taskbar_fragments.iter().any(|f| class.contains(f)) {
                return true;
            }
            match query.parent(current) {
                Some(parent) => current = parent,
                None => break,
            }
        }
        false
    }

    /// Whether the window under `point` belongs to the shell taskbar.
    pub fn is_taskbar_point(&self, query: &impl WindowQuery, point: ScreenPoint) -> bool {
        match query.window_at(point) {
            Some(id) => self.is_taskbar_window(query, id),
            None => false,
        }
    }

    /// Whether `id` is a window this system may attempt to close.
    ///
    /// False for dead handles and for any window whose class name matches
    /// the protected shell list, regardless of visibility or title.
    pub fn is_closable_target(&self, query: &impl WindowQuery, id: WindowId) -> bool {
        if !query.is_window(id) {
            return false;
        }
        let class = query.class_name(id);
        !self.protected_fragments.iter().any(|f| class.contains(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeDesktop;

    #[test]
    fn taskbar_button_is_classified_through_ancestors() {
        let mut desktop = FakeDesktop::new();
        let tray = desktop.add_window(1, "Shell_TrayWnd", "", true);
        let rebar = desktop.add_child(2, "ReBarWindow32", tray);
        let tasklist = desktop.add_child(3, "MSTaskListWClass", rebar);
        let button = desktop.add_child(4, "SomeButtonClass", tasklist);

        let policy = ClassPolicy::default();
        assert!(policy.is_taskbar_window(&desktop, button));
        assert!(policy.is_taskbar_window(&desktop, tasklist));
        assert!(policy.is_taskbar_window(&desktop, tray));
    }

    #[test]
    fn ordinary_window_is_not_taskbar() {
        let mut desktop = FakeDesktop::new();
        let win = desktop.add_window(1, "Notepad", "Untitled", true);

        let policy = ClassPolicy::default();
        assert!(!policy.is_taskbar_window(&desktop, win));
    }

    #[test]
    fn ancestor_walk_stops_at_the_hop_bound() {
        // Chain of anonymous containers with a tray window at the far end.
        // The tray sits 10 hops up, one past the last window the walk
        // visits, so classification must fail; at 9 hops it must succeed.
        let mut desktop = FakeDesktop::new();
        let tray = desktop.add_window(100, "Shell_TrayWnd", "", true);
        let mut parent = tray;
        for i in 0..MAX_ANCESTOR_HOPS as u64 {
            parent = desktop.add_child(i + 1, "ContainerClass", parent);
        }
        let too_deep = parent;

        let policy = ClassPolicy::default();
        assert!(!policy.is_taskbar_window(&desktop, too_deep));

        // One level shallower is within the bound.
        let shallower = desktop.parent_of(too_deep).unwrap();
        assert!(policy.is_taskbar_window(&desktop, shallower));
    }

    #[test]
    fn taskbar_point_hit_tests_before_classifying() {
        let mut desktop = FakeDesktop::new();
        let tray = desktop.add_window(1, "Shell_TrayWnd", "", true);
        desktop.place_at(tray, ScreenPoint::new(500, 1060));

        let policy = ClassPolicy::default();
        assert!(policy.is_taskbar_point(&desktop, ScreenPoint::new(500, 1060)));
        assert!(!policy.is_taskbar_point(&desktop, ScreenPoint::new(500, 200)));
    }

    #[test]
    fn protected_classes_are_never_closable() {
        let mut desktop = FakeDesktop::new();
        let policy = ClassPolicy::default();
        for (i, class) in PROTECTED_CLASS_FRAGMENTS.iter().enumerate() {
            let id = desktop.add_window(i as u64 + 1, class, "Visible and titled", true);
            assert!(
                !policy.is_closable_target(&desktop, id),
                "{class} must be protected"
            );
        }
    }

    #[test]
    fn dead_handle_is_not_closable() {
        let desktop = FakeDesktop::new();
        let policy = ClassPolicy::default();
        assert!(!policy.is_closable_target(&desktop, 0));
        assert!(!policy.is_closable_target(&desktop, 9999));
    }

    #[test]
    fn ordinary_application_window_is_closable() {
        let mut desktop = FakeDesktop::new();
        let win = desktop.add_window(1, "Chrome_WidgetWin_1", "Browser", true);

        let policy = ClassPolicy::default();
        assert!(policy.is_closable_target(&desktop, win));
    }

    #[test]
    fn extra_fragments_extend_both_lists() {
        let mut desktop = FakeDesktop::new();
        let dock = desktop.add_window(1, "MyDockClass", "", true);
        let kiosk = desktop.add_window(2, "KioskShell", "Kiosk", true);

        let policy = ClassPolicy::with_extras(
            &["MyDockClass".to_string()],
            &["KioskShell".to_string()],
        );
        assert!(policy.is_taskbar_window(&desktop, dock));
        assert!(!policy.is_closable_target(&desktop, kiosk));

        // Built-ins survive the extension.
        let tray = desktop.add_window(3, "Shell_TrayWnd", "", true);
        assert!(policy.is_taskbar_window(&desktop, tray));
        assert!(!policy.is_closable_target(&desktop, tray));
    }
}
