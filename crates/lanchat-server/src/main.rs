//! LAN chat relay server: entry point.
//!
//! Accepts TCP connections from `lanchat-client` processes and relays every
//! chat line to all other connected participants.
//!
//! # Usage
//!
//! ```text
//! lanchat-server [OPTIONS]
//!
//! Options:
//!   --config <PATH>             TOML config file
//!   --port <PORT>               Listening port [default: 12345]
//!   --bind <IP>                 Bind address [default: 0.0.0.0]
//!   --bind-attempts <N>         Consecutive ports to try if busy [default: 10]
//!   --history-capacity <N>      Keep at most N events in history (0 = unbounded)
//!   --read-timeout <SECS>       Close sessions idle this long (0 = never)
//!   --write-timeout <SECS>      Drop a client whose write stalls this long [default: 10] (0 = never)
//!   --outbound-queue <FRAMES>   Drop a client that falls this far behind [default: 256]
//!   --print-config              Print the effective configuration and exit
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable                   | Flag                 |
//! |----------------------------|----------------------|
//! | `LANCHAT_CONFIG`           | `--config`           |
//! | `LANCHAT_PORT`             | `--port`             |
//! | `LANCHAT_BIND`             | `--bind`             |
//! | `LANCHAT_BIND_ATTEMPTS`    | `--bind-attempts`    |
//! | `LANCHAT_HISTORY_CAPACITY` | `--history-capacity` |
//! | `LANCHAT_OUTBOUND_QUEUE`   | `--outbound-queue`   |
//!
//! Precedence is: command line, then environment, then config file, then
//! built-in defaults.
//!
//! The server stops on Ctrl+C or when Enter is pressed on its console.

use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use lanchat_server::infrastructure::network::RelayServer;
use lanchat_server::infrastructure::storage::{load_config, ServerConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// LAN chat relay server.
#[derive(Debug, Parser)]
#[command(
    name = "lanchat-server",
    about = "Relays chat messages between LAN clients",
    version
)]
struct Cli {
    /// Path to a TOML configuration file.  A missing file means defaults.
    #[arg(long, env = "LANCHAT_CONFIG")]
    config: Option<PathBuf>,

    /// TCP port to listen on.
    #[arg(long, env = "LANCHAT_PORT")]
    port: Option<u16>,

    /// IP address to bind.  `0.0.0.0` accepts LAN clients, `127.0.0.1` only
    /// local ones.
    #[arg(long, env = "LANCHAT_BIND")]
    bind: Option<String>,

    /// How many consecutive ports to try when the first one is busy.
    #[arg(long, env = "LANCHAT_BIND_ATTEMPTS")]
    bind_attempts: Option<u16>,

    /// Maximum number of events kept in history (0 = unbounded).
    #[arg(long, env = "LANCHAT_HISTORY_CAPACITY")]
    history_capacity: Option<usize>,

    /// Idle read timeout in seconds (0 = none).
    #[arg(long)]
    read_timeout: Option<u64>,

    /// Per-frame write timeout in seconds (0 = none) [default: 10].
    #[arg(long)]
    write_timeout: Option<u64>,

    /// Frames a slow client may fall behind before it is disconnected.
    #[arg(long, env = "LANCHAT_OUTBOUND_QUEUE")]
    outbound_queue: Option<usize>,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    /// Loads the config file (if any) and applies the command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => ServerConfig::default(),
        };

        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(bind) = self.bind {
            config.network.bind_address = bind;
        }
        if let Some(attempts) = self.bind_attempts {
            config.network.bind_attempts = attempts;
        }
        if let Some(capacity) = self.history_capacity {
            config.relay.history_capacity = Some(capacity);
        }
        if let Some(secs) = self.read_timeout {
            config.relay.read_timeout_secs = Some(secs);
        }
        if let Some(secs) = self.write_timeout {
            config.relay.write_timeout_secs = Some(secs);
        }
        if let Some(frames) = self.outbound_queue {
            config.relay.outbound_queue = frames;
        }
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let print_config = cli.print_config;
    let config = cli.into_server_config()?;

    if print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let server = match RelayServer::bind(&config).await {
        Ok(server) => server,
        Err(e) => {
            error!("could not start the chat relay: {e}");
            return Err(e).context("failed to bind the chat relay listener");
        }
    };
    info!(
        "LAN chat relay ready on {} (press Enter or Ctrl+C to stop)",
        server.local_addr()
    );

    let handle = server.start();
    wait_for_stop_request().await;
    handle.stop().await;

    Ok(())
}

/// Resolves on Ctrl+C or when a line is read from stdin.
///
/// When stdin is not interactive (closed or redirected from `/dev/null`),
/// only Ctrl+C stops the server.
async fn wait_for_stop_request() {
    let enter = watch_for_enter(std::io::stdin());
    let enter_pressed = async {
        if enter.await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("received Ctrl+C; shutting down"),
            Err(e) => error!("failed to listen for Ctrl+C: {e}; shutting down"),
        },
        _ = enter_pressed => info!("Enter pressed; shutting down"),
    }
}

/// Reads one line of `input` on a detached thread.
///
/// A blocking console read cannot be cancelled, so it must not live on the
/// runtime's blocking pool: the runtime would wait for it on shutdown.  The
/// sender is dropped without a value on end of input or a read error.
fn watch_for_enter<I>(input: I) -> oneshot::Receiver<()>
where
    I: Read + Send + 'static,
{
    let (pressed, enter) = oneshot::channel();
    let spawned = std::thread::Builder::new()
        .name("stdin-watch".into())
        .spawn(move || {
            let mut line = String::new();
            if let Ok(n) = BufReader::new(input).read_line(&mut line) {
                if n > 0 {
                    let _ = pressed.send(());
                }
            }
        });
    if let Err(e) = spawned {
        warn!("could not watch stdin for Enter: {e}; only Ctrl+C stops the server");
    }
    enter
}

// ── Tests ─────────────────────────────────────────────────────────────────────
