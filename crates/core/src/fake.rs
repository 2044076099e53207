//! In-memory window system used by the unit tests in this crate.

use std::collections::HashMap;

use crate::{ScreenPoint, WindowId, WindowQuery};

#[derive(Debug, Clone)]
struct FakeWindow {
    class: String,
    title: String,
    visible: bool,
    parent: Option<WindowId>,
    owner: Option<WindowId>,
}

/// A scriptable stand-in for the live desktop.
///
/// Top-level windows keep insertion order as their Z-order (first added is
/// topmost) unless rearranged with [`FakeDesktop::raise_to_top`].
#[derive(Debug, Default)]
pub struct FakeDesktop {
    windows: HashMap<WindowId, FakeWindow>,
    z_order: Vec<WindowId>,
    foreground: Option<WindowId>,
    hits: HashMap<(i32, i32), WindowId>,
}

impl FakeDesktop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a top-level window at the bottom of the Z-order.
    pub fn add_window(&mut self, id: WindowId, class: &str, title: &str, visible: bool) -> WindowId {
        self.windows.insert(
            id,
            FakeWindow {
                class: class.to_string(),
                title: title.to_string(),
                visible,
                parent: None,
                owner: None,
            },
        );
        self.z_order.push(id);
        id
    }

    /// Add a child window nested under `parent`. Children do not appear in
    /// the top-level Z-order.
    pub fn add_child(&mut self, id: WindowId, class: &str, parent: WindowId) -> WindowId {
        self.windows.insert(
            id,
            FakeWindow {
                class: class.to_string(),
                title: String::new(),
                visible: true,
                parent: Some(parent),
                owner: None,
            },
        );
        id
    }

    /// Add a top-level window owned by another window.
    pub fn add_owned(&mut self, id: WindowId, class: &str, title: &str, owner: WindowId) -> WindowId {
        self.add_window(id, class, title, true);
        if let Some(win) = self.windows.get_mut(&id) {
            win.owner = Some(owner);
        }
        id
    }

    pub fn set_foreground(&mut self, id: Option<WindowId>) {
        self.foreground = id;
    }

    /// Move a window to the top of the Z-order.
    pub fn raise_to_top(&mut self, id: WindowId) {
        self.z_order.retain(|&w| w != id);
        self.z_order.insert(0, id);
    }

    /// Make a hit-test at `point` resolve to `id`.
    pub fn place_at(&mut self, id: WindowId, point: ScreenPoint) {
        self.hits.insert((point.x, point.y), id);
    }

    /// Destroy a window. Handles captured earlier become stale.
    pub fn destroy(&mut self, id: WindowId) {
        self.windows.remove(&id);
        self.z_order.retain(|&w| w != id);
        if self.foreground == Some(id) {
            self.foreground = None;
        }
    }

    pub fn parent_of(&self, id: WindowId) -> Option<WindowId> {
        self.windows.get(&id).and_then(|w| w.parent)
    }
}

impl WindowQuery for FakeDesktop {
    fn is_window(&self, id: WindowId) -> bool {
        self.windows.contains_key(&id)
    }

    fn class_name(&self, id: WindowId) -> String {
        self.windows.get(&id).map(|w| w.class.clone()).unwrap_or_default()
    }

    fn parent(&self, id: WindowId) -> Option<WindowId> {
        self.windows.get(&id).and_then(|w| w.parent)
    }

    fn owner(&self, id: WindowId) -> Option<WindowId> {
        self.windows.get(&id).and_then(|w| w.owner)
    }

    fn is_visible(&self, id: WindowId) -> bool {
        self.windows.get(&id).map(|w| w.visible).unwrap_or(false)
    }

    fn title(&self, id: WindowId) -> String {
        self.windows.get(&id).map(|w| w.title.clone()).unwrap_or_default()
    }

    fn foreground_window(&self) -> Option<WindowId> {
        self.foreground
    }

    fn windows_top_to_bottom(&self) -> Vec<WindowId> {
        self.z_order.clone()
    }

    fn window_at(&self, point: ScreenPoint) -> Option<WindowId> {
        self.hits.get(&(point.x, point.y)).copied()
    }
}
