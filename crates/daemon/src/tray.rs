//! System tray icon management for the midclose daemon.
//!
//! Provides a system tray icon with a context menu for common operations:
//! - Pause/resume interception
//! - Open configuration
//! - Exit daemon

use std::sync::mpsc;
use thiserror::Error;
use tracing::{debug, info};
use tray_icon::{
    menu::{Menu, MenuEvent, MenuItem, PredefinedMenuItem},
    TrayIcon, TrayIconBuilder,
};

/// Menu item IDs for tray context menu.
mod menu_ids {
    pub const TOGGLE_PAUSE: &str = "toggle_pause";
    pub const OPEN_CONFIG: &str = "open_config";
    pub const EXIT: &str = "exit";
}

/// Events emitted by the tray icon.
#[derive(Debug, Clone)]
pub enum TrayEvent {
    /// User clicked "Pause/Resume Interception" menu item.
    TogglePause,
    /// User clicked "Open Config" menu item.
    OpenConfig,
    /// User clicked "Exit" menu item.
    Exit,
}

/// Manages the system tray icon and context menu.
pub struct TrayManager {
    _tray: TrayIcon,
}

impl TrayManager {
    /// Create a new tray manager with icon and context menu.
    ///
    /// The provided sender will receive tray events when menu items are
    /// clicked; it should be a `std::sync::mpsc::Sender` bridged to the
    /// daemon event loop.
    pub fn new(event_sender: mpsc::Sender<TrayEvent>) -> Result<Self, TrayError> {
        let menu = Menu::new();

        // Title item (disabled)
        let title = MenuItem::new("Midclose", false, None);
        menu.append(&title).map_err(|e| TrayError::Menu(e.to_string()))?;

        menu.append(&PredefinedMenuItem::separator())
            .map_err(|e| TrayError::Menu(e.to_string()))?;

        let toggle_pause =
            MenuItem::with_id(menu_ids::TOGGLE_PAUSE, "Pause Interception", true, None);
        menu.append(&toggle_pause)
            .map_err(|e| TrayError::Menu(e.to_string()))?;

        let open_config = MenuItem::with_id(menu_ids::OPEN_CONFIG, "Open Config", true, None);
        menu.append(&open_config)
            .map_err(|e| TrayError::Menu(e.to_string()))?;

        menu.append(&PredefinedMenuItem::separator())
            .map_err(|e| TrayError::Menu(e.to_string()))?;

        let exit = MenuItem::with_id(menu_ids::EXIT, "Exit", true, None);
        menu.append(&exit).map_err(|e| TrayError::Menu(e.to_string()))?;

        let icon = create_default_icon()?;

        let tray = TrayIconBuilder::new()
            .with_menu(Box::new(menu))
            .with_tooltip("Midclose - middle-click a taskbar button to close its window")
            .with_icon(icon)
            .build()
            .map_err(|e| TrayError::Build(e.to_string()))?;

        info!("System tray icon created");

        // Spawn thread to handle menu events and forward them
        std::thread::spawn(move || {
            let menu_channel = MenuEvent::receiver();
            while let Ok(event) = menu_channel.recv() {
                let tray_event = match event.id.0.as_str() {
                    menu_ids::TOGGLE_PAUSE => TrayEvent::TogglePause,
                    menu_ids::OPEN_CONFIG => TrayEvent::OpenConfig,
                    menu_ids::EXIT => TrayEvent::Exit,
                    id => {
                        debug!("Unknown menu item clicked: {}", id);
                        continue;
                    }
                };

                if event_sender.send(tray_event).is_err() {
                    // Receiver dropped, exit thread
                    break;
                }
            }
        });

        Ok(Self { _tray: tray })
    }
}

/// Create a default icon for the tray.
///
/// A dark disc with a light cross, drawn in memory so no icon file is
/// needed on disk.
fn create_default_icon() -> Result<tray_icon::Icon, TrayError> {
    const SIZE: usize = 32;
    let mut rgba = vec![0u8; SIZE * SIZE * 4];

    let disc = (45u8, 52u8, 64u8);
    let cross = (216u8, 222u8, 233u8);

    let center = SIZE as f32 / 2.0;
    let radius = center - 2.0;
    let arm = SIZE as f32 * 0.22;

    for y in 0..SIZE {
        for x in 0..SIZE {
            let idx = (y * SIZE + x) * 4;
            let dx = x as f32 - center;
            let dy = y as f32 - center;
            let dist = (dx * dx + dy * dy).sqrt();

            if dist >= radius {
                continue; // transparent outside the disc
            }

            // Diagonal strokes of the close glyph.
            let on_cross = (dx - dy).abs() < 2.0 && dx.abs() < arm && dy.abs() < arm
                || (dx + dy).abs() < 2.0 && dx.abs() < arm && dy.abs() < arm;

            let (r, g, b) = if on_cross { cross } else { disc };
            rgba[idx] = r;
            rgba[idx + 1] = g;
            rgba[idx + 2] = b;
            rgba[idx + 3] = 255;
        }
    }

    tray_icon::Icon::from_rgba(rgba, SIZE as u32, SIZE as u32)
        .map_err(|e| TrayError::Icon(e.to_string()))
}

/// Errors that can occur during tray operations.
#[derive(Debug, Error)]
pub enum TrayError {
    #[error("Failed to create menu: {0}")]
    Menu(String),

    #[error("Failed to build tray icon: {0}")]
    Build(String),

    #[error("Failed to create icon: {0}")]
    Icon(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_default_icon() {
        let icon = create_default_icon();
        assert!(icon.is_ok(), "Should create default icon successfully");
    }
}
