//! Mayfly TFTP server
//!
//! A read-only TFTP server (RFC 1350) with option negotiation for block
//! size, transfer size and timeout (RFC 2347/2348/2349). PXE firmware speaks
//! TFTP before anything else exists on the machine, so this is the first
//! thing a bare-metal host ever talks to.
//!
//! Files come from a pluggable [`FileSource`]; the server itself knows
//! nothing about firmware blobs or boot scripts.
//!
//! # Example
//!
//! ```ignore
//! use mayfly_tftp::{FileSource, TftpServer};
//!
//! let server = TftpServer::new("0.0.0.0:69".parse()?, source);
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! server.run(shutdown_rx).await?;
//! ```

pub mod error;
pub mod packet;
pub mod server;

pub use error::{Result, TftpError};
pub use packet::{ErrorCode, Options, Packet};
pub use server::{FileSource, TftpServer, DEFAULT_BLOCK_SIZE, MAX_BLOCK_SIZE};
