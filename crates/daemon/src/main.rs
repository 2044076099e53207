//! Midclose Daemon
//!
//! Background process that turns a middle-click on a taskbar button into
//! "activate, then close" for the window that button represents.
//!
//! Responsibilities:
//! - Install the system-wide low-level mouse hook
//! - Run the settle-and-resolve task for each intercepted click
//! - Dispatch close requests to resolved windows
//! - Handle IPC commands from the CLI
//! - System tray icon and menu

mod config;
mod tray;

use anyhow::Result;
use config::Config;
use midclose_core::{resolve_activated_window, Activation, ClassPolicy};
use midclose_ipc::{IpcCommand, IpcResponse, MAX_IPC_MESSAGE_SIZE, PIPE_NAME};
use midclose_platform_win32::hook::{install_mouse_hook, TaskbarClick};
use midclose_platform_win32::{
    capture_snapshot, close_window, process_image_name, window_process_id, Win32Desktop,
};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::windows::named_pipe::{PipeMode, ServerOptions};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Events that the daemon event loop processes.
enum DaemonEvent {
    /// An IPC command from a CLI client.
    IpcCommand {
        cmd: IpcCommand,
        responder: oneshot::Sender<IpcResponse>,
    },
    /// The hook intercepted a taskbar middle-click.
    Taskbar(TaskbarClick),
    /// A settle-and-resolve task finished. `activation` is set when a
    /// close request was dispatched.
    Resolved { activation: Option<Activation> },
    /// A tray menu event.
    Tray(tray::TrayEvent),
    /// Shutdown signal.
    Shutdown,
}

/// IPC read timeout - clients must send within this period.
const IPC_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Daemon state. Owned by the event loop; the hook thread and resolution
/// tasks only reach it through events.
struct AppState {
    /// User configuration.
    config: Config,
    /// Class policy compiled from built-ins plus configured extras.
    policy: ClassPolicy,
    /// Whether interception is paused.
    paused: bool,
    /// Daemon start time for uptime reporting.
    start_time: Instant,
    /// Taskbar middle-clicks intercepted since startup.
    clicks_intercepted: u64,
    /// Close requests dispatched since startup.
    windows_closed: u64,
    /// The strategy that identified the most recent close target.
    last_activation: Option<Activation>,
}

impl AppState {
    /// Create new state from config.
    fn new_with_config(config: Config) -> Self {
        let policy = config.class_policy();
        let paused = config.behavior.start_paused;
        Self {
            config,
            policy,
            paused,
            start_time: Instant::now(),
            clicks_intercepted: 0,
            windows_closed: 0,
            last_activation: None,
        }
    }

    /// Process an IPC command and return a response.
    ///
    /// Pause state changes are applied to the hook by the event loop after
    /// this returns; this function never touches the OS.
    fn handle_command(&mut self, cmd: IpcCommand) -> IpcResponse {
        match cmd {
            IpcCommand::Status => IpcResponse::StatusInfo {
                version: env!("CARGO_PKG_VERSION").to_string(),
                paused: self.paused,
                uptime_seconds: self.start_time.elapsed().as_secs(),
                clicks_intercepted: self.clicks_intercepted,
                windows_closed: self.windows_closed,
                last_activation: self.last_activation.map(|a| activation_label(a).to_string()),
            },
            IpcCommand::Pause => {
                if !self.paused {
                    self.paused = true;
                    info!("Interception paused");
                }
                IpcResponse::Ok
            }
            IpcCommand::Resume => {
                if self.paused {
                    self.paused = false;
                    info!("Interception resumed");
                }
                IpcResponse::Ok
            }
            IpcCommand::Stop => {
                // This is handled specially in the event loop
                IpcResponse::Ok
            }
        }
    }
}

/// Stable wire label for a resolution strategy.
fn activation_label(activation: Activation) -> &'static str {
    match activation {
        Activation::FocusChanged => "focus_changed",
        Activation::RaisedToTop => "raised_to_top",
        Activation::AlreadyFocused => "already_focused",
    }
}

/// The delayed half of an interception: sample the desktop again, pick the
/// activated window, and dispatch a close request to it.
///
/// Returns the strategy that fired when a close was dispatched. Every
/// other outcome (no candidate, target vanished, pid lookup failed, post
/// failed) is an expected miss, logged at debug.
fn resolve_and_close(policy: &ClassPolicy, click: &TaskbarClick) -> Option<Activation> {
    let desktop = Win32Desktop;
    let after = capture_snapshot(policy);

    let Some((target, activation)) =
        resolve_activated_window(&desktop, policy, &click.before, &after)
    else {
        debug!(
            "No activation detected after taskbar click at ({}, {})",
            click.point.x, click.point.y
        );
        return None;
    };

    // The window may die between resolution and dispatch; a failed pid
    // lookup means it already did, so skip the close.
    let Some(pid) = window_process_id(target) else {
        debug!("Resolved window {} vanished before close dispatch", target);
        return None;
    };
    let process = process_image_name(pid).unwrap_or_else(|| format!("pid {}", pid));

    match close_window(target) {
        Ok(()) => {
            info!(
                "Closing {} (window {}, via {})",
                process,
                target,
                activation_label(activation)
            );
            Some(activation)
        }
        Err(e) => {
            debug!("Close dispatch to window {} failed: {}", target, e);
            None
        }
    }
}

/// Spawn a named forwarding thread that receives events from a
/// `std::sync::mpsc` channel and forwards them to a tokio mpsc sender.
/// Returns the JoinHandle for graceful shutdown.
fn spawn_forwarding_thread<T: Send + 'static>(
    name: &str,
    receiver: std::sync::mpsc::Receiver<T>,
    sender: mpsc::Sender<DaemonEvent>,
    map_fn: impl Fn(T) -> DaemonEvent + Send + 'static,
) -> Result<std::thread::JoinHandle<()>> {
    let thread_name = name.to_string();
    std::thread::Builder::new()
        .name(thread_name.clone())
        .spawn(move || {
            while let Ok(event) = receiver.recv() {
                if sender.blocking_send(map_fn(event)).is_err() {
                    break; // Channel closed, daemon shutting down
                }
            }
        })
        .map_err(|e| anyhow::anyhow!("Failed to spawn {} thread: {}", thread_name, e))
}

/// Serialize a response and write it to the client, newline-terminated.
async fn write_response<W: tokio::io::AsyncWrite + Unpin>(
    writer: &mut W,
    response: &IpcResponse,
) -> Result<()> {
    let json = match serde_json::to_string(response) {
        Ok(json) => json + "\n",
        Err(e) => {
            warn!("Failed to serialize IPC response: {}", e);
            "{\"status\":\"error\",\"message\":\"Internal serialization error\"}\n".to_string()
        }
    };
    writer.write_all(json.as_bytes()).await?;
    Ok(())
}

/// Run the IPC server, accepting connections and dispatching commands.
async fn run_ipc_server(event_tx: mpsc::Sender<DaemonEvent>) {
    let mut is_first_instance = true;

    loop {
        let server = match ServerOptions::new()
            .first_pipe_instance(is_first_instance)
            .pipe_mode(PipeMode::Byte)
            .create(PIPE_NAME)
        {
            Ok(s) => {
                is_first_instance = false;
                s
            }
            Err(e) => {
                error!("Failed to create named pipe server: {}", e);
                if is_first_instance {
                    error!("Is another midclose daemon already running?");
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };

        debug!("Waiting for client connection on {}", PIPE_NAME);

        if let Err(e) = server.connect().await {
            error!("Failed to accept client connection: {}", e);
            continue;
        }

        let event_tx = event_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_client(server, event_tx).await {
                warn!("Client handler error: {}", e);
            }
        });
    }
}

/// Handle a single client connection.
async fn handle_client(
    pipe: tokio::net::windows::named_pipe::NamedPipeServer,
    event_tx: mpsc::Sender<DaemonEvent>,
) -> Result<()> {
    let (reader, mut writer) = tokio::io::split(pipe);
    let limited_reader = reader.take(MAX_IPC_MESSAGE_SIZE as u64);
    let mut reader = BufReader::new(limited_reader);
    let mut line = String::new();

    // Read command (single line of JSON) with timeout and size bound
    let read_result = tokio::time::timeout(IPC_READ_TIMEOUT, reader.read_line(&mut line)).await;
    let bytes_read = match read_result {
        Ok(Ok(n)) => n,
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            // Timeout: client did not send in time, silently close
            return Ok(());
        }
    };
    if bytes_read == 0 {
        return Ok(()); // Client disconnected
    }

    let line = line.trim();
    debug!("Received command: {}", line);

    let cmd: IpcCommand = match serde_json::from_str(line) {
        Ok(cmd) => cmd,
        Err(e) => {
            write_response(&mut writer, &IpcResponse::error(format!("Invalid command: {}", e)))
                .await?;
            return Ok(());
        }
    };

    let is_stop = matches!(cmd, IpcCommand::Stop);

    let (resp_tx, resp_rx) = oneshot::channel();
    if event_tx
        .send(DaemonEvent::IpcCommand {
            cmd,
            responder: resp_tx,
        })
        .await
        .is_err()
    {
        write_response(&mut writer, &IpcResponse::error("Daemon is shutting down")).await?;
        return Ok(());
    }

    let response = match resp_rx.await {
        Ok(resp) => resp,
        Err(_) => IpcResponse::error("Failed to get response from daemon"),
    };
    write_response(&mut writer, &response).await?;

    // If this was a stop command, signal shutdown
    if is_stop {
        let _ = event_tx.send(DaemonEvent::Shutdown).await;
    }

    Ok(())
}

/// Check if another daemon instance is already running by probing the named pipe.
async fn check_already_running() -> bool {
    tokio::net::windows::named_pipe::ClientOptions::new()
        .open(PIPE_NAME)
        .is_ok()
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (needed for log level)
    let mut config = Config::load().unwrap_or_else(|e| {
        // Can't use tracing yet, fall back to eprintln
        eprintln!("Failed to load configuration: {}. Using defaults.", e);
        Config::default()
    });

    // Initialize logging with configured log level
    let log_level = match config.behavior.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO, // default fallback for invalid values
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Validate and clamp config values
    for w in &config.validate() {
        warn!("Config: {} - {}", w.field, w.message);
    }

    info!("Midclose daemon starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Check if another instance is already running
    if check_already_running().await {
        error!(
            "Another midclose daemon is already running (pipe {} is active)",
            PIPE_NAME
        );
        return Ok(());
    }

    info!(
        "Configuration loaded: settle_delay_ms={}, start_paused={}, log_level={}",
        config.behavior.settle_delay_ms, config.behavior.start_paused, config.behavior.log_level
    );

    let mut state = AppState::new_with_config(config);

    // Create event channel
    let (event_tx, mut event_rx) = mpsc::channel::<DaemonEvent>(100);

    // Collect forwarding thread handles for graceful shutdown
    let mut thread_handles: Vec<std::thread::JoinHandle<()>> = Vec::new();

    // Install the low-level mouse hook. Without it the daemon has no
    // purpose, so installation failure ends the process.
    let hook_handle = match install_mouse_hook(state.policy.clone(), !state.paused) {
        Ok((handle, click_rx)) => {
            info!(
                "Mouse hook installed (interception {})",
                if state.paused { "paused" } else { "active" }
            );
            match spawn_forwarding_thread(
                "taskbar-fwd",
                click_rx,
                event_tx.clone(),
                DaemonEvent::Taskbar,
            ) {
                Ok(handle) => thread_handles.push(handle),
                Err(e) => warn!("{}", e),
            }
            handle
        }
        Err(e) => {
            error!(
                "Failed to install mouse hook: {}. No pointer events will ever be seen.",
                e
            );
            return Err(e.into());
        }
    };

    // Initialize system tray icon.
    // Bridge tray events to the async event loop over a sync channel.
    let _tray_manager = {
        let (tray_sync_tx, tray_sync_rx) = std::sync::mpsc::channel();

        match spawn_forwarding_thread("tray-fwd", tray_sync_rx, event_tx.clone(), DaemonEvent::Tray)
        {
            Ok(handle) => thread_handles.push(handle),
            Err(e) => warn!("{}", e),
        }

        match tray::TrayManager::new(tray_sync_tx) {
            Ok(manager) => {
                info!("System tray icon initialized");
                Some(manager)
            }
            Err(e) => {
                warn!("Failed to create system tray icon: {}. Tray disabled.", e);
                None
            }
        }
    };

    // Spawn IPC server
    let ipc_tx = event_tx.clone();
    tokio::spawn(async move {
        run_ipc_server(ipc_tx).await;
    });

    info!("IPC server listening on {}", PIPE_NAME);

    // Install Ctrl+C handler so terminal kill triggers graceful shutdown
    {
        let shutdown_tx = event_tx.clone();
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Ctrl+C received, initiating shutdown...");
                let _ = shutdown_tx.send(DaemonEvent::Shutdown).await;
            }
        });
    }

    info!("Ready. Middle-click a taskbar button to close its window.");

    // Main event loop
    loop {
        let event = match event_rx.recv().await {
            Some(e) => e,
            None => break,
        };

        match event {
            DaemonEvent::IpcCommand { cmd, responder } => {
                let response = state.handle_command(cmd);

                // Apply pause state to the hook after every command; cheap
                // and covers both Pause and Resume.
                hook_handle.set_enabled(!state.paused);

                if responder.send(response).is_err() {
                    debug!("Client disconnected before receiving IPC response");
                }
            }
            DaemonEvent::Taskbar(click) => {
                state.clicks_intercepted += 1;
                debug!(
                    "Interception #{} at ({}, {}); {} windows in snapshot",
                    state.clicks_intercepted,
                    click.point.x,
                    click.point.y,
                    click.before.z_order.len()
                );

                // The hook thread has already swallowed the gesture and
                // injected the substitute click; wait for the shell to
                // react, then resolve off the hook thread. The guard
                // clears the in-flight flag on every exit path.
                let guard = hook_handle.resolution_guard();
                let delay = state.config.settle_delay();
                let policy = state.policy.clone();
                let events = event_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _guard = guard;
                    let activation = resolve_and_close(&policy, &click);
                    let _ = events.send(DaemonEvent::Resolved { activation }).await;
                });
            }
            DaemonEvent::Resolved { activation } => {
                if let Some(activation) = activation {
                    state.windows_closed += 1;
                    state.last_activation = Some(activation);
                }
            }
            DaemonEvent::Tray(tray_event) => match tray_event {
                tray::TrayEvent::TogglePause => {
                    state.paused = !state.paused;
                    hook_handle.set_enabled(!state.paused);
                    info!(
                        "Tray: Interception {}",
                        if state.paused { "paused" } else { "resumed" }
                    );
                }
                tray::TrayEvent::OpenConfig => {
                    info!("Tray: Open config requested");
                    if let Some(dirs) = directories::ProjectDirs::from("com", "midclose", "midclose")
                    {
                        let config_path = dirs.config_dir().join("config.toml");
                        let _ = std::process::Command::new("cmd")
                            .args(["/c", "start", "", &config_path.to_string_lossy()])
                            .spawn();
                    }
                }
                tray::TrayEvent::Exit => {
                    info!("Tray: Exit requested");
                    let _ = event_tx.send(DaemonEvent::Shutdown).await;
                }
            },
            DaemonEvent::Shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    // Uninstall the hook before joining forwarders so no further clicks
    // arrive on a closed channel.
    drop(hook_handle);

    info!("Waiting for forwarding threads to exit...");
    for handle in thread_handles {
        let _ = handle.join();
    }

    info!("Midclose daemon shutting down.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> AppState {
        AppState::new_with_config(Config::default())
    }

    #[test]
    fn test_app_state_new() {
        let state = test_state();
        assert!(!state.paused);
        assert_eq!(state.clicks_intercepted, 0);
        assert_eq!(state.windows_closed, 0);
        assert!(state.last_activation.is_none());
    }

    #[test]
    fn test_app_state_honors_start_paused() {
        let mut config = Config::default();
        config.behavior.start_paused = true;
        let state = AppState::new_with_config(config);
        assert!(state.paused);
    }

    #[test]
    fn test_cmd_pause_and_resume() {
        let mut state = test_state();
        assert_eq!(state.handle_command(IpcCommand::Pause), IpcResponse::Ok);
        assert!(state.paused);
        // Pausing twice stays paused
        assert_eq!(state.handle_command(IpcCommand::Pause), IpcResponse::Ok);
        assert!(state.paused);
        assert_eq!(state.handle_command(IpcCommand::Resume), IpcResponse::Ok);
        assert!(!state.paused);
    }

    #[test]
    fn test_cmd_stop() {
        let mut state = test_state();
        assert_eq!(state.handle_command(IpcCommand::Stop), IpcResponse::Ok);
    }

    #[test]
    fn test_cmd_status_fresh() {
        let mut state = test_state();
        match state.handle_command(IpcCommand::Status) {
            IpcResponse::StatusInfo {
                version,
                paused,
                clicks_intercepted,
                windows_closed,
                last_activation,
                ..
            } => {
                assert!(!version.is_empty());
                assert!(!paused);
                assert_eq!(clicks_intercepted, 0);
                assert_eq!(windows_closed, 0);
                assert!(last_activation.is_none());
            }
            other => panic!("Expected StatusInfo, got {:?}", other),
        }
    }

    #[test]
    fn test_cmd_status_reports_counters() {
        let mut state = test_state();
        state.clicks_intercepted = 7;
        state.windows_closed = 4;
        state.last_activation = Some(Activation::RaisedToTop);
        match state.handle_command(IpcCommand::Status) {
            IpcResponse::StatusInfo {
                clicks_intercepted,
                windows_closed,
                last_activation,
                ..
            } => {
                assert_eq!(clicks_intercepted, 7);
                assert_eq!(windows_closed, 4);
                assert_eq!(last_activation.as_deref(), Some("raised_to_top"));
            }
            other => panic!("Expected StatusInfo, got {:?}", other),
        }
    }

    #[test]
    fn test_activation_labels_are_stable() {
        assert_eq!(activation_label(Activation::FocusChanged), "focus_changed");
        assert_eq!(activation_label(Activation::RaisedToTop), "raised_to_top");
        assert_eq!(
            activation_label(Activation::AlreadyFocused),
            "already_focused"
        );
    }

    #[test]
    fn test_ipc_read_timeout_is_reasonable() {
        assert!(IPC_READ_TIMEOUT.as_secs() >= 1);
        assert!(IPC_READ_TIMEOUT.as_secs() <= 30);
    }

    #[test]
    fn test_max_ipc_message_size_is_reasonable() {
        const { assert!(midclose_ipc::MAX_IPC_MESSAGE_SIZE >= 1024) };
        const { assert!(midclose_ipc::MAX_IPC_MESSAGE_SIZE <= 1024 * 1024) };
    }

    #[test]
    fn test_check_already_running_without_daemon() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let result = rt.block_on(check_already_running());
        // No daemon is running during tests, so this should be false
        assert!(!result);
    }
}
