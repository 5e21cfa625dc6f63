//! Asimov gateway client
//!
//! Talks to a running `asimovd` over the line protocol. Provides:
//! - `ping`: check that the gateway is up and no other session is active
//! - `send`: run a batch of commands in one session
//! - `shell`: interactive session over stdin

use std::time::Duration;

use anyhow::{Context, Result, bail};
use asimov_protocol::{
    ClientError, Command, DEFAULT_PORT, DEFAULT_REPLY_TIMEOUT, GatewayClient, is_end_of_session,
};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "asimov")]
#[command(about = "Control an iRobot Create through an asimov gateway")]
#[command(version)]
#[command(after_help = "\
Examples:
  asimov ping                              Check the gateway on localhost
  asimov send 'MODE FULL' 'DRIVE STRAIGHT DISTANCE 200 500'
  asimov --host robot.local shell          Type commands interactively")]
struct Cli {
    /// Gateway host name or address
    #[arg(long, global = true, default_value = "127.0.0.1")]
    host: String,

    /// Gateway TCP port
    #[arg(short, long, global = true, default_value = DEFAULT_PORT)]
    port: u16,

    /// Seconds to wait for each reply
    #[arg(long, global = true, default_value_t = DEFAULT_REPLY_TIMEOUT.as_secs())]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open and immediately end a session
    Ping,

    /// Send commands in order and print each reply
    Send {
        /// Command lines, e.g. "DRIVE STOP"
        #[arg(required = true)]
        lines: Vec<String>,

        /// Validate every line locally before connecting
        #[arg(long)]
        check: bool,
    },

    /// Read commands from stdin until END or end of input
    Shell,
}

impl Cli {
    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    async fn connect(&self) -> Result<GatewayClient> {
        match GatewayClient::connect((self.host.as_str(), self.port)).await {
            Ok(client) => Ok(client.with_timeout(Duration::from_secs(self.timeout))),
            Err(ClientError::Rejected) => {
                bail!("Gateway at {} is busy with another session", self.endpoint())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to connect to {}", self.endpoint())),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Ping => run_ping(&cli).await,
        Commands::Send { lines, check } => run_send(&cli, lines, *check).await,
        Commands::Shell => run_shell(&cli).await,
    }
}

async fn run_ping(cli: &Cli) -> Result<()> {
    let client = cli.connect().await?;
    client.end().await.context("Failed to end session")?;
    println!("Gateway at {} is ready", cli.endpoint());
    Ok(())
}

/// Reject lines the gateway would answer with `ERR` for syntax alone.
fn validate(lines: &[String]) -> Result<()> {
    for line in lines {
        if is_end_of_session(line) {
            continue;
        }
        line.parse::<Command>()
            .with_context(|| format!("Invalid command {line:?}"))?;
    }
    Ok(())
}

async fn run_send(cli: &Cli, lines: &[String], check: bool) -> Result<()> {
    if check {
        validate(lines)?;
    }

    let mut client = cli.connect().await?;
    let mut failed = 0;

    for line in lines {
        if is_end_of_session(line) {
            break;
        }
        let reply = client
            .send_line(line)
            .await
            .with_context(|| format!("No reply to {line:?}"))?;
        println!("{line}: {reply}");
        if !reply.is_ack() {
            failed += 1;
        }
    }

    client.end().await.context("Failed to end session")?;

    if failed > 0 {
        bail!("{failed} of {} commands failed", lines.len());
    }
    Ok(())
}

async fn run_shell(cli: &Cli) -> Result<()> {
    let mut client = cli.connect().await?;
    eprintln!(
        "Connected to {}. Type END or press Ctrl-D to quit.",
        cli.endpoint()
    );

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = input.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if is_end_of_session(line) {
            break;
        }
        let reply = client
            .send_line(line)
            .await
            .context("Gateway stopped responding")?;
        println!("{reply}");
    }

    client.end().await.context("Failed to end session")
}
