//! Socket Error Module
//!
//! Error taxonomy shared by every socket handle operation.

use std::io;
use thiserror::Error;

/// Socket error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SocketError {
    /// Resource exhaustion while allocating a descriptor
    #[error("allocation failed: {0}")]
    Allocation(String),
    /// Bad port, address or buffer supplied by the caller
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Address or host name could not be resolved
    #[error("could not resolve {0}")]
    Resolution(String),
    /// Binding the local address failed
    #[error("bind failed: {0}")]
    Bind(String),
    /// Marking the socket as listening failed
    #[error("listen failed: {0}")]
    Listen(String),
    /// Accepting a pending connection failed
    #[error("accept failed: {0}")]
    Accept(String),
    /// Connecting to the remote peer failed
    #[error("connect failed: {0}")]
    Connect(String),
    /// The secure channel handshake failed
    #[error("secure handshake failed: {0}")]
    SecureHandshake(String),
    /// Read, write or datagram transfer failed
    #[error("I/O error: {0}")]
    Io(String),
    /// A socket option could not be applied
    #[error("socket option failed: {0}")]
    SetOption(String),
    /// The operation needs a bound or connected socket
    #[error("socket is not bound")]
    NotBound,
}

impl From<io::Error> for SocketError {
    fn from(err: io::Error) -> Self {
        SocketError::Io(err.to_string())
    }
}

impl SocketError {
    pub(crate) fn bind(err: impl ToString) -> Self {
        SocketError::Bind(err.to_string())
    }

    pub(crate) fn option(err: impl ToString) -> Self {
        SocketError::SetOption(err.to_string())
    }
}
