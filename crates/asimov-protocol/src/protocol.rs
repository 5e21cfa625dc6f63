//! Wire tokens and replies for the gateway line protocol.
//!
//! Every message is a single ASCII line terminated by `\n`. Clients open with
//! [`HELO`], the server answers [`REDY`], and every later command line is
//! answered with [`ACK`] or [`ERR`]. [`END`] closes the session without a reply.

use std::fmt;
use std::str::FromStr;

pub const HELO: &str = "HELO";
pub const REDY: &str = "REDY";
pub const ACK: &str = "ACK";
pub const ERR: &str = "ERR";
pub const END: &str = "END";

/// Port the daemon listens on when none is given.
pub const DEFAULT_PORT: &str = "4545";

/// Longest accepted line, excluding the terminator.
pub const MAX_LINE_LENGTH: usize = 1024;

/// Server to client reply token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reply {
    /// Command executed.
    Ack,
    /// Command malformed or rejected by the device, or connection refused.
    Err,
    /// Handshake accepted.
    Redy,
}

impl Reply {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Reply::Ack => ACK,
            Reply::Err => ERR,
            Reply::Redy => REDY,
        }
    }

    /// Map a command outcome to its reply.
    #[must_use]
    pub fn from_success(success: bool) -> Self {
        if success { Reply::Ack } else { Reply::Err }
    }

    #[must_use]
    pub fn is_ack(self) -> bool {
        self == Reply::Ack
    }
}

impl AsRef<str> for Reply {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A line that is not one of the reply tokens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown reply: {0:?}")]
pub struct UnknownReply(pub String);

impl FromStr for Reply {
    type Err = UnknownReply;

    fn from_str(s: &str) -> Result<Self, UnknownReply> {
        match s {
            ACK => Ok(Reply::Ack),
            ERR => Ok(Reply::Err),
            REDY => Ok(Reply::Redy),
            other => Err(UnknownReply(other.to_string())),
        }
    }
}

/// Whether a received line is the handshake greeting.
#[must_use]
pub fn is_greeting(line: &str) -> bool {
    line == HELO
}

/// Whether a received line ends the session.
#[must_use]
pub fn is_end_of_session(line: &str) -> bool {
    line == END
}
