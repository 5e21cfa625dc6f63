//! Session state machine for one client connection.
//!
//! ```text
//! AwaitingHandshake --HELO/REDY--> Active --END, close, error--> Terminated
//!         |                                                         ^
//!         +----------- anything else, close, error -----------------+
//! ```
//!
//! No command is dispatched before the handshake. On termination the slot
//! lease is released before the connection is dropped.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use asimov_core::{Device, Dispatcher};
use asimov_protocol::{LineCodec, Reply, is_end_of_session, is_greeting};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;
use tracing::{debug, error, info, trace, warn};

use crate::slot::SlotLease;

/// Robot shared by every session; one command runs at a time.
pub type SharedDevice = Arc<Mutex<dyn Device>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Client sent `END`.
    Normal,
    /// First line was not `HELO`, or the client left before sending one.
    HandshakeFailed,
    /// Client closed the connection mid-session.
    PeerClosed,
    /// Read, write or framing error.
    NetworkError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingHandshake,
    Active,
    Terminated(SessionEnd),
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub peer: SocketAddr,
    pub handshake_completed: bool,
    pub state: SessionState,
}

impl Session {
    #[must_use]
    pub fn new(id: SessionId, peer: SocketAddr) -> Self {
        Self {
            id,
            peer,
            handshake_completed: false,
            state: SessionState::AwaitingHandshake,
        }
    }
}

/// Runs one session over any byte stream.
pub struct SessionHandler<S> {
    session: Session,
    framed: Framed<S, LineCodec>,
    lease: Option<SlotLease>,
    device: SharedDevice,
    dispatcher: Dispatcher,
}

impl<S> SessionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        stream: S,
        peer: SocketAddr,
        lease: SlotLease,
        device: SharedDevice,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            session: Session::new(lease.id().clone(), peer),
            framed: Framed::new(stream, LineCodec::new()),
            lease: Some(lease),
            device,
            dispatcher,
        }
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Drive the session to completion and release the slot.
    pub async fn run(mut self) -> SessionEnd {
        let end = loop {
            match self.session.state {
                SessionState::AwaitingHandshake => self.await_handshake().await,
                SessionState::Active => self.serve_command().await,
                SessionState::Terminated(end) => break end,
            }
        };

        match end {
            SessionEnd::Normal => info!("Session {} ended by client", self.session.id),
            SessionEnd::HandshakeFailed => {
                info!("Session {} failed handshake", self.session.id);
            }
            SessionEnd::PeerClosed => warn!("Client {} disconnected", self.session.peer),
            SessionEnd::NetworkError => warn!("Session {} aborted", self.session.id),
        }

        if let Some(lease) = self.lease.take() {
            lease.release();
        }
        end
    }

    async fn await_handshake(&mut self) {
        let line = match self.read_line().await {
            Ok(line) => line,
            Err(_) => {
                self.session.state = SessionState::Terminated(SessionEnd::HandshakeFailed);
                return;
            }
        };

        if !is_greeting(&line) {
            debug!("Expected greeting, got {:?}", line);
            self.session.state = SessionState::Terminated(SessionEnd::HandshakeFailed);
            return;
        }

        if self.send(Reply::Redy).await.is_err() {
            self.session.state = SessionState::Terminated(SessionEnd::NetworkError);
            return;
        }

        self.session.handshake_completed = true;
        self.session.state = SessionState::Active;
        info!("Session {} ready", self.session.id);
    }

    async fn serve_command(&mut self) {
        let line = match self.read_line().await {
            Ok(line) => line,
            Err(end) => {
                self.session.state = SessionState::Terminated(end);
                return;
            }
        };

        if is_end_of_session(&line) {
            self.session.state = SessionState::Terminated(SessionEnd::Normal);
            return;
        }

        let reply = self.dispatch(line).await;
        if self.send(reply).await.is_err() {
            self.session.state = SessionState::Terminated(SessionEnd::NetworkError);
        }
    }

    async fn read_line(&mut self) -> Result<String, SessionEnd> {
        match self.framed.next().await {
            Some(Ok(line)) => {
                trace!("<- {:?}", line);
                Ok(line)
            }
            Some(Err(e)) => {
                warn!("Failed to read from {}: {}", self.session.peer, e);
                Err(SessionEnd::NetworkError)
            }
            None => Err(SessionEnd::PeerClosed),
        }
    }

    async fn send(&mut self, reply: Reply) -> Result<(), ()> {
        trace!("-> {}", reply);
        self.framed.send(reply).await.map_err(|e| {
            warn!("Failed to write to {}: {}", self.session.peer, e);
        })
    }

    /// Run one command line on the blocking pool.
    async fn dispatch(&self, line: String) -> Reply {
        let device = Arc::clone(&self.device);
        let dispatcher = self.dispatcher;

        let result = tokio::task::spawn_blocking(move || {
            let mut device = device.lock().unwrap_or_else(PoisonError::into_inner);
            dispatcher.dispatch(&mut *device, &line).reply()
        })
        .await;

        result.unwrap_or_else(|e| {
            error!("Command task failed: {}", e);
            Reply::Err
        })
    }
}
