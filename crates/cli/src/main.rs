//! Midclose CLI
//!
//! Command-line interface for controlling the midclose daemon.
//!
//! Commands are sent to the daemon via IPC (named pipe) as one line of
//! JSON; the daemon answers with one line of JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use midclose_ipc::{IpcCommand, IpcResponse, PIPE_NAME};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::windows::named_pipe::ClientOptions;

#[derive(Parser)]
#[command(name = "midclose-cli")]
#[command(author, version, about = "Control the midclose daemon")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show daemon status and interception counters
    Status,
    /// Pause interception; pointer events pass through untouched
    Pause,
    /// Resume interception after a pause
    Resume,
    /// Stop the daemon
    Stop,
}

impl Commands {
    fn to_ipc(&self) -> IpcCommand {
        match self {
            Commands::Status => IpcCommand::Status,
            Commands::Pause => IpcCommand::Pause,
            Commands::Resume => IpcCommand::Resume,
            Commands::Stop => IpcCommand::Stop,
        }
    }
}

/// Send one command to the daemon and read its one-line response.
async fn send_command(cmd: &IpcCommand) -> Result<IpcResponse> {
    let pipe = ClientOptions::new()
        .open(PIPE_NAME)
        .context("Could not reach the daemon. Is midclose running?")?;
    let (reader, mut writer) = tokio::io::split(pipe);

    let json = serde_json::to_string(cmd)? + "\n";
    writer.write_all(json.as_bytes()).await?;

    let mut line = String::new();
    BufReader::new(reader)
        .read_line(&mut line)
        .await
        .context("Daemon closed the connection without responding")?;

    serde_json::from_str(line.trim()).context("Malformed response from daemon")
}

/// Render seconds as "1h 02m 03s".
fn format_uptime(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

fn print_response(response: &IpcResponse) {
    match response {
        IpcResponse::Ok => println!("ok"),
        IpcResponse::Error { message } => eprintln!("error: {}", message),
        IpcResponse::StatusInfo {
            version,
            paused,
            uptime_seconds,
            clicks_intercepted,
            windows_closed,
            last_activation,
        } => {
            println!("midclose {}", version);
            println!(
                "  state:              {}",
                if *paused { "paused" } else { "intercepting" }
            );
            println!("  uptime:             {}", format_uptime(*uptime_seconds));
            println!("  clicks intercepted: {}", clicks_intercepted);
            println!("  windows closed:     {}", windows_closed);
            println!(
                "  last activation:    {}",
                last_activation.as_deref().unwrap_or("none yet")
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let response = send_command(&cli.command.to_ipc()).await?;
    let failed = matches!(response, IpcResponse::Error { .. });
    print_response(&response);

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subcommands_map_to_ipc_commands() {
        assert_eq!(Commands::Status.to_ipc(), IpcCommand::Status);
        assert_eq!(Commands::Pause.to_ipc(), IpcCommand::Pause);
        assert_eq!(Commands::Resume.to_ipc(), IpcCommand::Resume);
        assert_eq!(Commands::Stop.to_ipc(), IpcCommand::Stop);
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(0), "0s");
        assert_eq!(format_uptime(59), "59s");
        assert_eq!(format_uptime(60), "1m 00s");
        assert_eq!(format_uptime(3723), "1h 02m 03s");
    }
}
