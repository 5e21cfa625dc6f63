//! Line protocol shared by the Asimov gateway and its clients.
//!
//! This crate provides the wire tokens, the command grammar, the line codec
//! and a small client for talking to a running gateway over TCP.
//!
//! # Architecture
//!
//! - [`protocol`]: Handshake and reply tokens (`HELO`, `REDY`, `ACK`, `ERR`, `END`)
//! - [`command`]: Tokenizer and typed command grammar (`DRIVE`, `LED`, `SONG`, ...)
//! - [`transport`]: Newline-delimited codec for framing
//! - [`client`]: Gateway client helper
//!
//! # Example
//!
//! ```no_run
//! use asimov_protocol::{Command, GatewayClient, Reply};
//!
//! # async fn example() -> Result<(), asimov_protocol::ClientError> {
//! let mut client = GatewayClient::connect("127.0.0.1:4545").await?;
//!
//! let reply = client.execute(&Command::Beep).await?;
//! assert_eq!(reply, Reply::Ack);
//!
//! client.end().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod command;
pub mod protocol;
pub mod transport;

pub use client::{ClientError, DEFAULT_REPLY_TIMEOUT, GatewayClient};

pub use command::{
    ArgPolicy, Command, CommandError, Drive, LedCommand, LedTarget, Mode, Note, SongCommand,
    Tokens, WaitKind,
};

pub use protocol::{
    ACK, DEFAULT_PORT, END, ERR, HELO, MAX_LINE_LENGTH, REDY, Reply, UnknownReply,
    is_end_of_session, is_greeting,
};

pub use transport::{CodecError, LineCodec};
