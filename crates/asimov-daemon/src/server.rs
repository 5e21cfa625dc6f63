//! Gateway server: admission gate and supervisor loop.
//!
//! The supervisor accepts connections, admits at most one session at a time,
//! reaps finished session tasks and aborts everything on SIGINT or SIGTERM.
//! Aborting a session does not stop a command already running on the blocking
//! pool, so shutdown also triggers the robot's [`Interrupt`] before
//! disconnecting it.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use asimov_core::{Dispatcher, Interrupt, LoggingDevice, OpenInterface};
use asimov_protocol::{ArgPolicy, LineCodec, Reply};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::codec::Framed;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::ServerConfig;
use crate::error::{DaemonError, Result};
use crate::session::{SessionHandler, SessionId, SharedDevice};
use crate::slot::{SessionSlot, SlotOccupied};

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Upper bound on writing `ERR` to a rejected connection and closing it.
pub const REJECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Upper bound on stopping the robot once the server has shut down.
pub const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// What the admission gate did with a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admitted(SessionId),
    /// Another session holds the slot.
    Rejected(SessionId),
}

/// The robot every session drives, and the interrupt that frees it.
#[derive(Clone)]
pub struct Robot {
    pub device: SharedDevice,
    pub interrupt: Interrupt,
}

impl Robot {
    #[must_use]
    pub fn new(device: SharedDevice, interrupt: Interrupt) -> Self {
        Self { device, interrupt }
    }

    /// Cut any running command short, then stop the robot and return it to
    /// passive mode, giving up after [`DISCONNECT_TIMEOUT`].
    pub async fn disconnect(self) {
        self.interrupt.trigger();

        let device = self.device;
        let disconnected = tokio::task::spawn_blocking(move || {
            device
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .disconnect()
        });

        match tokio::time::timeout(DISCONNECT_TIMEOUT, disconnected).await {
            Ok(Ok(Ok(()))) => debug!("Robot disconnected"),
            Ok(Ok(Err(e))) => warn!("Failed to disconnect robot: {}", e),
            Ok(Err(e)) => warn!("Disconnect task failed: {}", e),
            Err(_) => warn!("Robot did not disconnect within {:?}", DISCONNECT_TIMEOUT),
        }
    }
}

/// State shared by the gate and every session.
#[derive(Clone)]
pub struct ServerContext {
    slot: SessionSlot,
    device: SharedDevice,
    dispatcher: Dispatcher,
}

impl ServerContext {
    #[must_use]
    pub fn new(device: SharedDevice, dispatcher: Dispatcher) -> Self {
        Self {
            slot: SessionSlot::new(),
            device,
            dispatcher,
        }
    }

    #[must_use]
    pub fn slot(&self) -> &SessionSlot {
        &self.slot
    }

    /// Admit `stream` as the active session, or reject it with `ERR`.
    ///
    /// Either way the connection is handed to a task in `tasks`; the gate
    /// itself never waits on the client.
    pub fn admit(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        tasks: &mut JoinSet<()>,
    ) -> Admission {
        match self.slot.try_claim(SessionId::new()) {
            Ok(lease) => {
                let id = lease.id().clone();
                info!("Accepted session {} from {}", id, peer);

                let span = info_span!("session", id = %id, %peer);
                let handler = SessionHandler::new(
                    stream,
                    peer,
                    lease,
                    Arc::clone(&self.device),
                    self.dispatcher,
                );
                tasks.spawn(
                    async move {
                        handler.run().await;
                    }
                    .instrument(span),
                );
                Admission::Admitted(id)
            }
            Err(SlotOccupied(active)) => {
                info!("Rejecting {}: session {} is active", peer, active);
                tasks.spawn(reject(stream, peer));
                Admission::Rejected(active)
            }
        }
    }
}

/// Send `ERR`, close, and wait briefly for the client to hang up.
async fn reject(stream: TcpStream, peer: SocketAddr) {
    let mut framed = Framed::new(stream, LineCodec::new());

    let result = tokio::time::timeout(REJECT_TIMEOUT, async {
        framed.send(Reply::Err).await?;
        SinkExt::<Reply>::close(&mut framed).await?;
        // Closing with unread input would reset the connection and could
        // discard the ERR before the client reads it.
        while let Some(Ok(_)) = framed.next().await {}
        Ok::<(), asimov_protocol::CodecError>(())
    })
    .await;

    match result {
        Ok(Ok(())) => debug!("Rejected {}", peer),
        Ok(Err(e)) => debug!("Failed to reject {}: {}", peer, e),
        Err(_) => debug!("Rejected {} (client did not hang up)", peer),
    }
}

/// Accept and supervise sessions until `shutdown` completes.
///
/// On shutdown all session tasks are aborted, which releases the slot and
/// closes their connections.
pub async fn serve<F>(listener: TcpListener, ctx: ServerContext, shutdown: F)
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            () = &mut shutdown => {
                info!("Shutdown requested, stopping server");
                break;
            }

            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined
                    && e.is_panic()
                {
                    error!("Session task panicked: {}", e);
                }
            }

            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!("Accepted connection from {}", peer);
                    ctx.admit(stream, peer, &mut tasks);
                }
                Err(e) => {
                    warn!("Accept error: {}", e);
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            },
        }
    }

    drop(listener);
    tasks.shutdown().await;

    if let Some(active) = ctx.slot().active() {
        warn!("Session {} still marked active after shutdown", active);
    }
}

/// Open the robot named by `config`, or a logging device for dry runs.
///
/// # Errors
///
/// Returns `DaemonError::Device` if the serial device cannot be opened.
pub fn open_device(config: &ServerConfig) -> Result<Robot> {
    let interrupt = Interrupt::new();

    if config.dry_run {
        info!("Dry run: robot operations will only be logged");
        let device = Arc::new(Mutex::new(LoggingDevice::new()));
        return Ok(Robot::new(device, interrupt));
    }

    let robot = OpenInterface::open(&config.device)?.with_interrupt(interrupt.clone());
    Ok(Robot::new(Arc::new(Mutex::new(robot)), interrupt))
}

/// Wait for SIGINT or SIGTERM.
///
/// # Errors
///
/// Returns `DaemonError::Signal` if the handlers cannot be installed.
#[cfg(unix)]
pub fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt()).map_err(DaemonError::Signal)?;
    let mut terminate = signal(SignalKind::terminate()).map_err(DaemonError::Signal)?;

    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => info!("Received SIGINT"),
            _ = terminate.recv() => info!("Received SIGTERM"),
        }
    })
}

/// Wait for Ctrl-C.
///
/// # Errors
///
/// Never fails; the signature matches the unix version.
#[cfg(not(unix))]
pub fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to wait for Ctrl-C: {}", e);
        }
    })
}

/// Serve `listener` until `shutdown` completes, then release the robot.
pub async fn run<F>(listener: TcpListener, policy: ArgPolicy, robot: Robot, shutdown: F)
where
    F: Future<Output = ()>,
{
    let ctx = ServerContext::new(Arc::clone(&robot.device), Dispatcher::new(policy));
    serve(listener, ctx, shutdown).await;
    robot.disconnect().await;
    info!("Server stopped");
}
