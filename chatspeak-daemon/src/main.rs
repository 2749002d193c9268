//! Chatspeak Daemon - reads live chat aloud
//!
//! Joins a chat channel, speaks qualifying messages and join greetings
//! through espeak-ng one at a time, and streams the text being spoken to
//! overlay clients. Controlled via Unix socket (`chatspeak-daemon ctl toggle`).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chatspeak_broadcaster::DisplayBroadcaster;
use chatspeak_core::{Bridge, ChannelDisplay, ConnectionState, DisplayCommand, EspeakSynthesizer};
use chatspeak_daemon::ipc::{self, IpcServer};
use chatspeak_daemon::watcher::ConfigWatcher;
use chatspeak_daemon::{DaemonConfig, Daemon};
use clap::{Parser, Subcommand};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "chatspeak-daemon", version, about = "Reads live chat aloud")]
struct Cli {
    /// Config file (default: <config_dir>/chatspeak/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daemon (default)
    Run,
    /// Send a control command to a running daemon
    Ctl {
        /// enable, disable, toggle, status, drain, quit
        command: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level: tracing::Level = cli
        .log_level
        .parse()
        .with_context(|| format!("Invalid log level: {}", cli.log_level))?;
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(level)
        .init();

    let config = DaemonConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::Ctl { command } => {
            let socket_path = config.daemon.ipc_socket_path()?;
            let reply = ipc::send_command(&socket_path, &command).await?;
            println!("{}", reply);
            Ok(())
        }
    }
}

const PUMP_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Forward display commands and connection state to overlay clients.
///
/// Runs apart from the tick loop, which never waits on an overlay client.
fn spawn_display_pump(
    broadcaster: Arc<DisplayBroadcaster>,
    mut display_rx: mpsc::UnboundedReceiver<DisplayCommand>,
    mut state_rx: watch::Receiver<ConnectionState>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut state_open = true;
        loop {
            tokio::select! {
                command = display_rx.recv() => match command {
                    Some(command) => broadcaster.apply(command).await,
                    None => break,
                },
                changed = state_rx.changed(), if state_open => match changed {
                    Ok(()) => {
                        let state = *state_rx.borrow_and_update();
                        info!("Chat connection {}", state);
                        broadcaster.broadcast_connection_state(state).await;
                    }
                    Err(_) => state_open = false,
                },
            }
        }
    })
}

async fn run(config: DaemonConfig) -> Result<()> {
    info!("Starting Chatspeak daemon v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", config.config_path.display());

    let settings = config.daemon.clone();

    // Overlay broadcaster
    let display_socket = settings.display_socket_path()?;
    let broadcaster = Arc::new(
        DisplayBroadcaster::new(&display_socket)
            .await
            .context("Failed to create display broadcaster")?,
    );
    broadcaster
        .start()
        .await
        .context("Failed to start display broadcaster")?;

    // Control socket
    let ipc_socket = settings.ipc_socket_path()?;
    let ipc_server = IpcServer::bind(&ipc_socket).context("Failed to start IPC server")?;
    let (ipc_tx, mut ipc_rx) = mpsc::channel(16);
    let ipc_task = tokio::spawn(ipc_server.run(ipc_tx));

    // Hot reload
    let (reload_tx, mut reload_rx) = mpsc::unbounded_channel();
    let _watcher = match ConfigWatcher::start(&config.config_path, reload_tx) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            warn!("Config hot reload unavailable: {:#}", e);
            None
        }
    };

    let (display, display_rx) = ChannelDisplay::new();
    let synth = EspeakSynthesizer::new(settings.synth_binary.clone());
    let bridge = Bridge::new(settings.bridge_options(), Arc::new(synth), Arc::new(display));
    let pump = spawn_display_pump(Arc::clone(&broadcaster), display_rx, bridge.subscribe_state());
    let mut daemon = Daemon::new(bridge, config.chat.clone());

    info!("Chatspeak daemon ready");
    info!("   Use 'chatspeak-daemon ctl toggle' to start/stop reading chat");

    let mut ticker = tokio::time::interval(settings.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => daemon.tick().await,
            Some(request) = ipc_rx.recv() => {
                let outcome = daemon.handle_command(request.command);
                let _ = request.reply.send(outcome.reply);
                if outcome.quit {
                    break;
                }
            }
            Some(chat) = reload_rx.recv() => daemon.reload(chat),
            result = &mut shutdown => {
                if let Err(e) = result {
                    error!("Failed to listen for shutdown signal: {}", e);
                }
                info!("Received shutdown signal");
                break;
            }
        }
    }

    info!("Shutting down...");
    daemon.shutdown().await;

    // dropping the bridge closes the display channel; the pump flushes the
    // final hide and exits
    drop(daemon);
    if tokio::time::timeout(PUMP_FLUSH_TIMEOUT, pump).await.is_err() {
        warn!("Display pump did not finish in time");
    }
    if let Err(e) = broadcaster.stop().await {
        warn!("Failed to stop display broadcaster: {}", e);
    }

    ipc_task.abort();
    let _ = std::fs::remove_file(&ipc_socket);

    info!("Chatspeak daemon stopped");
    Ok(())
}
