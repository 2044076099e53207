//! Midclose IPC Protocol
//!
//! Shared types for daemon-CLI communication over Windows named pipes.
//! The wire format is one JSON object per line in each direction.

use serde::{Deserialize, Serialize};

/// Named pipe path for IPC communication.
pub const PIPE_NAME: &str = r"\\.\pipe\midclose";

/// Upper bound on a single IPC message, in bytes. Clients sending more are
/// cut off.
pub const MAX_IPC_MESSAGE_SIZE: usize = 64 * 1024;

/// Commands that can be sent from the CLI to the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcCommand {
    /// Query daemon status and interception counters.
    Status,
    /// Stop intercepting; every pointer event is forwarded untouched.
    Pause,
    /// Resume intercepting after a pause.
    Resume,
    /// Stop the daemon.
    Stop,
}

/// Responses from the daemon to the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IpcResponse {
    /// Command executed successfully.
    Ok,
    /// Command failed with an error.
    Error {
        /// Error message describing what went wrong.
        message: String,
    },
    /// Status query response.
    StatusInfo {
        /// Daemon version string.
        version: String,
        /// Whether interception is currently paused.
        paused: bool,
        /// Seconds since the daemon started.
        uptime_seconds: u64,
        /// Taskbar middle-clicks intercepted since startup.
        clicks_intercepted: u64,
        /// Close requests dispatched since startup.
        windows_closed: u64,
        /// Which resolution strategy fired most recently, if any.
        last_activation: Option<String>,
    },
}

impl IpcResponse {
    /// Create an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
