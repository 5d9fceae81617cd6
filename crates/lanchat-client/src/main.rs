//! LAN chat terminal client: entry point.
//!
//! # Usage
//!
//! ```text
//! lanchat-client [OPTIONS]
//!
//! Options:
//!   --host <HOST>          Server hostname or IP [default: 127.0.0.1]
//!   --port <PORT>          Server port [default: 12345]
//!   --username <NAME>      Name shown to others (prompted if omitted)
//!   --no-color             Print without ANSI colours
//! ```
//!
//! Once connected, every line typed is sent to the room.  Two lines are
//! commands instead:
//!
//! - `exit` (or `/quit`) leaves the chat,
//! - `clear` clears the terminal.

use std::io::{BufRead, BufReader, Read};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use lanchat_client::application::config::DEFAULT_PORT;
use lanchat_client::application::{validate_username, ClientConfig};
use lanchat_client::infrastructure::console::ConsoleSink;
use lanchat_client::infrastructure::network::{ClientError, ClientSession};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// LAN chat terminal client.
#[derive(Debug, Parser)]
#[command(name = "lanchat-client", about = "Join a LAN chat room", version)]
struct Cli {
    /// Hostname or IP address of the chat server.
    #[arg(long, default_value = "127.0.0.1", env = "LANCHAT_HOST")]
    host: String,

    /// Port of the chat server.
    #[arg(long, default_value_t = DEFAULT_PORT, env = "LANCHAT_PORT")]
    port: u16,

    /// Username to join with.  Prompted for when omitted.
    #[arg(long, env = "LANCHAT_USERNAME")]
    username: Option<String>,

    /// Disable ANSI colours.
    #[arg(long)]
    no_color: bool,
}

impl Cli {
    fn into_client_config(self) -> ClientConfig {
        ClientConfig {
            host: self.host,
            port: self.port,
            username: self.username,
            color: !self.no_color,
        }
    }
}

/// What a typed line asks for.
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Exit,
    Clear,
    Say(&'a str),
}

fn parse_command(line: &str) -> Command<'_> {
    match line.trim() {
        "exit" | "/quit" => Command::Exit,
        "clear" => Command::Clear,
        _ => Command::Say(line),
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they never interleave with chat lines on stdout.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let config = Cli::parse().into_client_config();
    let mut lines = spawn_line_reader(std::io::stdin());

    let username = match &config.username {
        Some(name) => validate_username(name).context("invalid --username")?,
        None => match prompt_username(&mut lines).await? {
            Some(name) => name,
            None => return Ok(()),
        },
    };

    let sink = Arc::new(ConsoleSink::new(config.color));
    let addr = config.server_addr();
    let mut session = ClientSession::connect(&addr, &username, sink.clone())
        .await
        .with_context(|| format!("could not join the chat at {addr}"))?;
    println!("Connected to {addr} as {username}. Type 'exit' to leave, 'clear' to clear the screen.");

    loop {
        let line = tokio::select! {
            line = lines.recv() => line,
            _ = session.closed() => break,
        };
        let Some(line) = line else { break };

        match parse_command(&line) {
            Command::Exit => break,
            Command::Clear => sink.clear_screen(),
            Command::Say(text) => match session.send(text).await {
                Ok(()) => {}
                Err(ClientError::Frame(e)) if session.is_connected() => {
                    warn!("message not sent: {e}");
                }
                Err(e) => {
                    warn!("message not sent: {e}");
                    break;
                }
            },
        }
    }

    session.disconnect().await;
    Ok(())
}

/// Forwards lines of `input` from a detached thread.
///
/// A blocking console read cannot be cancelled, so it must not live on the
/// runtime's blocking pool, or leaving the chat would wait for one more line.
/// The channel closes on end of input or a read error.
fn spawn_line_reader<I>(input: I) -> mpsc::Receiver<String>
where
    I: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel(16);
    let spawned = std::thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || {
            for line in BufReader::new(input).lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("failed to read from stdin: {e}");
                        break;
                    }
                }
            }
        });
    if let Err(e) = spawned {
        warn!("could not start the stdin reader: {e}");
    }
    rx
}

/// Asks for a username until a valid one is entered.
///
/// Returns `None` if stdin closes first.
async fn prompt_username(lines: &mut mpsc::Receiver<String>) -> anyhow::Result<Option<String>> {
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"Enter your username: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.recv().await else {
            return Ok(None);
        };
        match validate_username(&line) {
            Ok(name) => return Ok(Some(name)),
            Err(e) => println!("{e}, please try again."),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
