//! Error types for the TFTP server.

use std::net::SocketAddr;
use thiserror::Error;

/// Error type for TFTP operations.
#[derive(Debug, Error)]
pub enum TftpError {
    /// Failed to bind the listening socket.
    #[error("failed to bind TFTP socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// A datagram did not parse as a TFTP packet.
    #[error("invalid TFTP packet: {0}")]
    InvalidPacket(String),

    /// The client stopped acknowledging within the retry budget.
    #[error("transfer of {filename:?} timed out")]
    Timeout { filename: String },

    /// Socket I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for TFTP operations.
pub type Result<T> = std::result::Result<T, TftpError>;
