//! Asimov gateway entry point.
//!
//! Parses the command line, sets up logging, optionally detaches into the
//! background and runs the gateway until SIGINT or SIGTERM.

use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Command, ExitCode, Stdio};

use asimov_daemon::{DaemonError, ServerConfig, listener, open_device, shutdown_signal};
use asimov_protocol::{ArgPolicy, DEFAULT_PORT};
use clap::{ArgAction, Parser};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Asimov gateway - drive a robot over TCP
#[derive(Parser, Debug)]
#[command(name = "asimovd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Serial device the robot is attached to (defaults to `/dev/ttyUSB0`)
    #[arg(value_name = "DEVICE")]
    device: Option<PathBuf>,

    /// Port to listen on (defaults to 4545)
    #[arg(short, long, value_name = "PORT")]
    port: Option<String>,

    /// Stay in the foreground instead of detaching
    #[arg(short = 'f', long)]
    no_fork: bool,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Log robot operations instead of opening the device
    #[arg(long)]
    dry_run: bool,

    /// Reply ERR to integer arguments that are not plain decimal numbers
    #[arg(long)]
    strict: bool,

    /// Log to a file; set when relaunched in the background
    #[arg(long, hide = true)]
    detached: bool,
}

impl Args {
    fn config(&self) -> ServerConfig {
        let defaults = ServerConfig::default();
        ServerConfig {
            port: self.port.clone().unwrap_or(defaults.port),
            device: self.device.clone().unwrap_or(defaults.device),
            verbosity: self.verbose,
            foreground: self.no_fork,
            dry_run: self.dry_run,
            policy: if self.strict {
                ArgPolicy::Strict
            } else {
                ArgPolicy::Lenient
            },
        }
    }
}

/// Set up logging.
/// Foreground runs log to stderr. Detached runs log to a timestamped file in
/// the temp directory, with an `asimovd.log` symlink to the latest one.
fn setup_logging(default_level: &str, to_file: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("asimov={default_level}")));

    if to_file {
        let temp_dir = std::env::temp_dir();
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let log_filename = format!("asimovd-{timestamp}.log");
        let log_path = temp_dir.join(&log_filename);

        #[cfg(unix)]
        {
            let symlink_path = temp_dir.join("asimovd.log");
            let _ = std::fs::remove_file(&symlink_path);
            let _ = std::os::unix::fs::symlink(&log_path, &symlink_path);
        }

        let file_appender = tracing_appender::rolling::never(&temp_dir, &log_filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        std::mem::forget(guard);

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(file_layer)
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }
}

/// Line a relaunched gateway prints once it is listening.
const READY: &str = "ready";

/// Relaunch this binary in the background with the same arguments.
///
/// Returns once the child reports it is listening, so startup failures
/// still reach the caller.
fn detach() -> Result<u32, DaemonError> {
    let exe = std::env::current_exe()?;

    let mut command = Command::new(exe);
    command
        .args(std::env::args_os().skip(1))
        .arg("--no-fork")
        .arg("--detached")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let mut child = command.spawn()?;
    let ready = match child.stdout.take() {
        Some(output) => await_ready(BufReader::new(output))?,
        None => false,
    };
    if ready {
        return Ok(child.id());
    }

    let status = child.wait()?;
    Err(DaemonError::Startup(status))
}

/// Read the child's first line; anything but [`READY`] means it gave up.
fn await_ready(mut output: impl BufRead) -> std::io::Result<bool> {
    let mut line = String::new();
    output.read_line(&mut line)?;
    Ok(line.trim_end() == READY)
}

fn report_ready() {
    let mut stdout = std::io::stdout();
    if let Err(e) = writeln!(stdout, "{READY}").and_then(|()| stdout.flush()) {
        warn!("Failed to report readiness: {}", e);
    }
}

/// Bind, open the robot and serve until a signal arrives.
async fn serve_gateway(config: &ServerConfig, detached: bool) -> Result<(), DaemonError> {
    let listener = listener::bind(&config.port)?;
    let shutdown = shutdown_signal()?;
    let robot = open_device(config)?;

    if detached {
        report_ready();
    }

    info!("Starting Asimov gateway on port {}...", config.port);
    asimov_daemon::run(listener, config.policy, robot, shutdown).await;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let config = args.config();
    setup_logging(config.log_level(), args.detached);

    if !args.no_fork {
        return match detach() {
            Ok(pid) => {
                info!("Gateway running in the background (pid {})", pid);
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(
                    "Failed to start in the background: {}. See {}",
                    e,
                    std::env::temp_dir().join("asimovd.log").display()
                );
                ExitCode::FAILURE
            }
        };
    }

    if args.port.is_none() {
        info!("No port given, using {}", DEFAULT_PORT);
    }
    if args.device.is_none() && !config.dry_run {
        info!("No device given, using {}", config.device.display());
    }

    match serve_gateway(&config, args.detached).await {
        Ok(()) => {
            info!("Asimov gateway stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
