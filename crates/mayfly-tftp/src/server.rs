//! Read-only TFTP server.
//!
//! Serves PXE boot files (iPXE firmware and per-host boot scripts) out of a
//! pluggable [`FileSource`]. Each read request is handled on its own task
//! with its own ephemeral socket, lockstep per RFC 1350: send a block, wait
//! for its ACK, retransmit on timeout. Write requests are rejected.

use crate::error::{Result, TftpError};
use crate::packet::{encode_data, encode_error, encode_oack, ErrorCode, Options, Packet};
use async_trait::async_trait;
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Default DATA payload size (RFC 1350).
pub const DEFAULT_BLOCK_SIZE: u16 = 512;

/// Largest negotiable payload size (RFC 2348).
pub const MAX_BLOCK_SIZE: u16 = 65464;

/// Per-block retransmission timeout when the client does not negotiate one.
pub const DEFAULT_TIMEOUT_SECS: u8 = 5;

/// Retransmissions before a transfer is abandoned.
pub const MAX_RETRIES: u32 = 5;

/// Source of the files the server hands out.
///
/// `None` means "this source does not have the file"; the server answers the
/// client with a TFTP file-not-found error, never a hard fault.
#[async_trait]
pub trait FileSource: Send + Sync {
    async fn fetch(&self, path: &str) -> Option<Bytes>;
}

/// The TFTP server.
pub struct TftpServer {
    bind_addr: SocketAddr,
    source: Arc<dyn FileSource>,
    default_timeout: Duration,
}

impl TftpServer {
    pub fn new(bind_addr: SocketAddr, source: Arc<dyn FileSource>) -> Self {
        Self {
            bind_addr,
            source,
            default_timeout: Duration::from_secs(u64::from(DEFAULT_TIMEOUT_SECS)),
        }
    }

    /// Override the retransmission timeout used when the client does not
    /// negotiate one.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Listen for requests until the shutdown channel flips to `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let socket = UdpSocket::bind(self.bind_addr)
            .await
            .map_err(|source| TftpError::Bind {
                addr: self.bind_addr,
                source,
            })?;
        info!(addr = %self.bind_addr, "TFTP server listening");

        let mut buf = [0u8; 2048];
        loop {
            tokio::select! {
                received = socket.recv_from(&mut buf) => {
                    match received {
                        Ok((len, client)) => {
                            let datagram = buf[..len].to_vec();
                            let source = Arc::clone(&self.source);
                            let default_timeout = self.default_timeout;
                            tokio::spawn(async move {
                                if let Err(err) =
                                    handle_request(&datagram, client, source, default_timeout).await
                                {
                                    error!(client = %client, error = %err, "TFTP request failed");
                                }
                            });
                        }
                        Err(err) => error!(error = %err, "error receiving TFTP datagram"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("TFTP server shutting down");
                        return Ok(());
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for TftpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TftpServer")
            .field("bind_addr", &self.bind_addr)
            .finish_non_exhaustive()
    }
}

async fn handle_request(
    datagram: &[u8],
    client: SocketAddr,
    source: Arc<dyn FileSource>,
    default_timeout: Duration,
) -> Result<()> {
    match Packet::parse(datagram)? {
        Packet::Read {
            filename,
            mode,
            options,
        } => {
            if mode != "octet" {
                return reply_error(client, ErrorCode::IllegalOperation, "only octet mode").await;
            }
            serve_read(client, &filename, options, source, default_timeout).await
        }
        Packet::Write { filename } => {
            debug!(client = %client, filename = %filename, "rejecting write request");
            reply_error(client, ErrorCode::AccessViolation, "writes not supported").await
        }
        other => {
            debug!(client = %client, packet = ?other, "ignoring stray packet");
            Ok(())
        }
    }
}

async fn serve_read(
    client: SocketAddr,
    filename: &str,
    options: Options,
    source: Arc<dyn FileSource>,
    default_timeout: Duration,
) -> Result<()> {
    let path = filename.trim_start_matches('/');
    debug!(client = %client, path = %path, "read request");

    let file = match source.fetch(path).await {
        Some(bytes) => bytes,
        None => {
            warn!(client = %client, path = %path, "file not found");
            return reply_error(client, ErrorCode::FileNotFound, "file not found").await;
        }
    };

    // Transfers run on their own socket so the listener stays free; the
    // ephemeral port doubles as the transfer id.
    let socket = UdpSocket::bind("0.0.0.0:0").await?;

    let block_size = options
        .block_size
        .map(|size| size.clamp(8, MAX_BLOCK_SIZE))
        .unwrap_or(DEFAULT_BLOCK_SIZE) as usize;
    let wait = options
        .timeout_secs
        .map(|secs| Duration::from_secs(u64::from(secs)))
        .unwrap_or(default_timeout);

    if !options.is_empty() {
        let acknowledged = Options {
            block_size: options.block_size.map(|_| block_size as u16),
            transfer_size: options.transfer_size.map(|_| file.len() as u64),
            timeout_secs: options.timeout_secs,
        };
        socket.send_to(&encode_oack(&acknowledged), client).await?;
        if !await_ack(&socket, client, 0, wait, filename).await? {
            return Ok(());
        }
    }

    // Lockstep: a short (or empty) final block terminates the transfer.
    let mut block: u16 = 1;
    let mut offset = 0usize;
    loop {
        let end = (offset + block_size).min(file.len());
        let payload = &file[offset..end];
        let last = payload.len() < block_size;

        let mut delivered = false;
        for _ in 0..MAX_RETRIES {
            socket.send_to(&encode_data(block, payload), client).await?;
            if await_ack(&socket, client, block, wait, filename).await? {
                delivered = true;
                break;
            }
        }
        if !delivered {
            return Err(TftpError::Timeout {
                filename: filename.to_string(),
            });
        }

        offset = end;
        block = block.wrapping_add(1);
        if last {
            break;
        }
    }

    info!(client = %client, path = %path, bytes = file.len(), "transfer completed");
    Ok(())
}

/// Wait for the ACK of `block`. Returns `Ok(false)` on timeout (caller
/// retransmits) and `Err` when the client aborted or the budget is spent.
async fn await_ack(
    socket: &UdpSocket,
    client: SocketAddr,
    block: u16,
    wait: Duration,
    filename: &str,
) -> Result<bool> {
    let mut buf = [0u8; 256];
    loop {
        match timeout(wait, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, _))) => match Packet::parse(&buf[..len]) {
                Ok(Packet::Ack { block: acked }) if acked == block => return Ok(true),
                Ok(Packet::Ack { .. }) => continue, // stale ACK from an earlier block
                Ok(Packet::Error { code, message }) => {
                    warn!(client = %client, code, message = %message, "client aborted transfer");
                    return Err(TftpError::Timeout {
                        filename: filename.to_string(),
                    });
                }
                _ => continue,
            },
            Ok(Err(err)) => return Err(TftpError::Io(err)),
            Err(_) => return Ok(false),
        }
    }
}

async fn reply_error(client: SocketAddr, code: ErrorCode, message: &str) -> Result<()> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.send_to(&encode_error(code, message), client).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapSource(HashMap<String, Bytes>);

    #[async_trait]
    impl FileSource for MapSource {
        async fn fetch(&self, path: &str) -> Option<Bytes> {
            self.0.get(path).cloned()
        }
    }

    fn source(files: &[(&str, &[u8])]) -> Arc<dyn FileSource> {
        Arc::new(MapSource(
            files
                .iter()
                .map(|(path, data)| (path.to_string(), Bytes::copy_from_slice(data)))
                .collect(),
        ))
    }

    async fn bound_client() -> UdpSocket {
        UdpSocket::bind("127.0.0.1:0").await.unwrap()
    }

    fn rrq(filename: &str, opts: &[(&str, &str)]) -> Vec<u8> {
        let mut pkt = vec![0x00, 0x01];
        pkt.extend_from_slice(filename.as_bytes());
        pkt.push(0);
        pkt.extend_from_slice(b"octet\0");
        for (key, value) in opts {
            pkt.extend_from_slice(key.as_bytes());
            pkt.push(0);
            pkt.extend_from_slice(value.as_bytes());
            pkt.push(0);
        }
        pkt
    }

    #[tokio::test]
    async fn short_file_arrives_in_one_block() {
        let client = bound_client().await;
        let addr = client.local_addr().unwrap();

        let pkt = rrq("boot.ipxe", &[]);
        let src = source(&[("boot.ipxe", b"#!ipxe\nboot")]);
        tokio::spawn(async move { handle_request(&pkt, addr, src, Duration::from_secs(5)).await });

        let mut buf = [0u8; 2048];
        let (len, from) = client.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..4], &[0x00, 0x03, 0x00, 0x01]);
        assert_eq!(&buf[4..len], b"#!ipxe\nboot");
        client
            .send_to(&[0x00, 0x04, 0x00, 0x01], from)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn multi_block_transfer_is_lockstep() {
        let client = bound_client().await;
        let addr = client.local_addr().unwrap();

        // 512 + 512 + 1 bytes: three DATA packets, the last one short.
        let payload = vec![0xa5u8; 1025];
        let pkt = rrq("big.bin", &[]);
        let src = source(&[("big.bin", &payload)]);
        tokio::spawn(async move { handle_request(&pkt, addr, src, Duration::from_secs(5)).await });

        let mut buf = [0u8; 2048];
        let mut received = Vec::new();
        for expected_block in 1u16..=3 {
            let (len, from) = client.recv_from(&mut buf).await.unwrap();
            assert_eq!(buf[..2], [0x00, 0x03]);
            assert_eq!(u16::from_be_bytes([buf[2], buf[3]]), expected_block);
            received.extend_from_slice(&buf[4..len]);
            let ack = [[0x00u8, 0x04], expected_block.to_be_bytes()].concat();
            client.send_to(&ack, from).await.unwrap();
        }
        assert_eq!(received, payload);
    }

    #[tokio::test]
    async fn options_are_acknowledged_with_oack() {
        let client = bound_client().await;
        let addr = client.local_addr().unwrap();

        let pkt = rrq("boot.ipxe", &[("blksize", "1024"), ("tsize", "0")]);
        let src = source(&[("boot.ipxe", b"#!ipxe")]);
        tokio::spawn(async move { handle_request(&pkt, addr, src, Duration::from_secs(5)).await });

        let mut buf = [0u8; 2048];
        let (len, from) = client.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..2], &[0x00, 0x06]);
        let oack = String::from_utf8_lossy(&buf[2..len]).to_string();
        assert!(oack.contains("blksize\01024"));
        // tsize echoes the real file size.
        assert!(oack.contains("tsize\06"));

        // ACK 0 releases the first data block.
        client.send_to(&[0x00, 0x04, 0x00, 0x00], from).await.unwrap();
        let (len, _) = client.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..4], &[0x00, 0x03, 0x00, 0x01]);
        assert_eq!(&buf[4..len], b"#!ipxe");
    }

    #[tokio::test]
    async fn missing_file_yields_tftp_error() {
        let client = bound_client().await;
        let addr = client.local_addr().unwrap();

        let pkt = rrq("nope", &[]);
        let src = source(&[]);
        tokio::spawn(async move { handle_request(&pkt, addr, src, Duration::from_secs(5)).await });

        let mut buf = [0u8; 256];
        let (_, _) = client.recv_from(&mut buf).await.unwrap();
        // ERROR, code 1 (file not found).
        assert_eq!(&buf[..4], &[0x00, 0x05, 0x00, 0x01]);
    }

    #[tokio::test]
    async fn write_requests_are_rejected() {
        let client = bound_client().await;
        let addr = client.local_addr().unwrap();

        let mut wrq = vec![0x00, 0x02];
        wrq.extend_from_slice(b"upload.bin\0octet\0");
        let src = source(&[]);
        tokio::spawn(async move { handle_request(&wrq, addr, src, Duration::from_secs(5)).await });

        let mut buf = [0u8; 256];
        let (_, _) = client.recv_from(&mut buf).await.unwrap();
        // ERROR, code 2 (access violation).
        assert_eq!(&buf[..4], &[0x00, 0x05, 0x00, 0x02]);
    }
}
