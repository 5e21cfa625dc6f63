//! Client helper for talking to a running gateway.
//!
//! Wraps a TCP stream in the line codec and performs the `HELO`/`REDY`
//! handshake, then sends one command line at a time and waits for its reply.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::Framed;
use tracing::debug;

use crate::command::Command;
use crate::protocol::{END, HELO, Reply, UnknownReply};
use crate::transport::{CodecError, LineCodec};

/// How long to wait for a reply before giving up.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur with the gateway client
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Gateway is busy with another session")]
    Rejected,

    #[error("Handshake failed: got {0}")]
    HandshakeFailed(Reply),

    #[error("Reply timeout")]
    Timeout,

    #[error("Unexpected reply: {0:?}")]
    UnexpectedReply(String),
}

impl From<UnknownReply> for ClientError {
    fn from(e: UnknownReply) -> Self {
        ClientError::UnexpectedReply(e.0)
    }
}

/// One connection to the gateway.
pub struct GatewayClient {
    framed: Framed<TcpStream, LineCodec>,
    reply_timeout: Duration,
}

impl GatewayClient {
    /// Connect and complete the handshake.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Io` if the connection fails, `ClientError::Rejected`
    /// if another session is active, or another `ClientError` if the handshake
    /// does not complete.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let mut client = Self::connect_raw(addr).await?;
        client.handshake().await?;
        Ok(client)
    }

    /// Connect without sending anything.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Io` if the connection fails.
    pub async fn connect_raw(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            framed: Framed::new(stream, LineCodec::new()),
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        })
    }

    #[must_use]
    pub fn with_timeout(mut self, reply_timeout: Duration) -> Self {
        self.reply_timeout = reply_timeout;
        self
    }

    /// Send `HELO` and expect `REDY`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Rejected` when the gateway answers `ERR`, and
    /// `ClientError::HandshakeFailed` for any other reply token.
    pub async fn handshake(&mut self) -> Result<(), ClientError> {
        self.framed.send(HELO).await?;
        match self.recv_reply().await? {
            Reply::Redy => {
                debug!("Handshake complete");
                Ok(())
            }
            Reply::Err => Err(ClientError::Rejected),
            other @ Reply::Ack => Err(ClientError::HandshakeFailed(other)),
        }
    }

    /// Send one raw line and wait for its reply.
    ///
    /// # Errors
    ///
    /// Returns an error if sending fails, the connection closes, the reply
    /// times out or the reply is not a protocol token.
    pub async fn send_line(&mut self, line: &str) -> Result<Reply, ClientError> {
        self.framed.send(line).await?;
        self.recv_reply().await
    }

    /// Send a typed command and wait for its reply.
    ///
    /// # Errors
    ///
    /// Same as [`GatewayClient::send_line`].
    pub async fn execute(&mut self, command: &Command) -> Result<Reply, ClientError> {
        self.send_line(&command.to_string()).await
    }

    /// Read the next line from the gateway, or `None` once it closes.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Timeout` if nothing arrives in time, or a codec error.
    pub async fn next_line(&mut self) -> Result<Option<String>, ClientError> {
        let next = tokio::time::timeout(self.reply_timeout, self.framed.next())
            .await
            .map_err(|_| ClientError::Timeout)?;
        next.transpose().map_err(ClientError::from)
    }

    /// Send `END` and close the write half.
    ///
    /// # Errors
    ///
    /// Returns an error if the line cannot be written.
    pub async fn end(mut self) -> Result<(), ClientError> {
        self.framed.send(END).await?;
        SinkExt::<&str>::close(&mut self.framed).await?;
        Ok(())
    }

    async fn recv_reply(&mut self) -> Result<Reply, ClientError> {
        let line = self.next_line().await?.ok_or(ClientError::ConnectionClosed)?;
        Ok(line.parse::<Reply>()?)
    }
}
