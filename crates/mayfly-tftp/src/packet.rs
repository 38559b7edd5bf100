//! TFTP wire codec (RFC 1350 with RFC 2347/2348/2349 options).
//!
//! The server only ever receives RRQ/WRQ/ACK/ERROR and only ever sends
//! DATA/OACK/ERROR, so parsing and encoding are split along that line
//! instead of round-tripping every packet type.

use crate::error::{Result, TftpError};
use bytes::{Buf, BufMut, Bytes, BytesMut};

mod opcode {
    pub const RRQ: u16 = 1;
    pub const WRQ: u16 = 2;
    pub const DATA: u16 = 3;
    pub const ACK: u16 = 4;
    pub const ERROR: u16 = 5;
    pub const OACK: u16 = 6;
}

/// TFTP error codes the server emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NotDefined,
    FileNotFound,
    AccessViolation,
    IllegalOperation,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        match self {
            ErrorCode::NotDefined => 0,
            ErrorCode::FileNotFound => 1,
            ErrorCode::AccessViolation => 2,
            ErrorCode::IllegalOperation => 4,
        }
    }
}

/// Options negotiated on a read request (RFC 2347/2348/2349).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    /// `blksize`: DATA payload size.
    pub block_size: Option<u16>,
    /// `tsize`: total transfer size; clients send 0 and expect the real size
    /// echoed back.
    pub transfer_size: Option<u64>,
    /// `timeout`: per-block retransmission timeout in seconds.
    pub timeout_secs: Option<u8>,
}

impl Options {
    pub fn is_empty(&self) -> bool {
        self.block_size.is_none() && self.transfer_size.is_none() && self.timeout_secs.is_none()
    }
}

/// An inbound packet, as clients send them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Read {
        filename: String,
        mode: String,
        options: Options,
    },
    Write {
        filename: String,
    },
    Ack {
        block: u16,
    },
    Error {
        code: u16,
        message: String,
    },
}

impl Packet {
    /// Parse a client datagram.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 2 {
            return Err(TftpError::InvalidPacket("datagram too short".to_string()));
        }
        let mut buf = data;
        let op = buf.get_u16();

        match op {
            opcode::RRQ => {
                let (filename, mode, options) = parse_request(buf)?;
                Ok(Packet::Read {
                    filename,
                    mode,
                    options,
                })
            }
            opcode::WRQ => {
                let (filename, _, _) = parse_request(buf)?;
                Ok(Packet::Write { filename })
            }
            opcode::ACK => {
                if buf.remaining() < 2 {
                    return Err(TftpError::InvalidPacket("truncated ACK".to_string()));
                }
                Ok(Packet::Ack {
                    block: buf.get_u16(),
                })
            }
            opcode::ERROR => {
                if buf.remaining() < 2 {
                    return Err(TftpError::InvalidPacket("truncated ERROR".to_string()));
                }
                let code = buf.get_u16();
                let message = next_cstr(&mut buf).unwrap_or_default();
                Ok(Packet::Error { code, message })
            }
            opcode::DATA | opcode::OACK => Err(TftpError::InvalidPacket(format!(
                "unexpected server-side opcode {op}"
            ))),
            other => Err(TftpError::InvalidPacket(format!("unknown opcode {other}"))),
        }
    }
}

fn parse_request(mut buf: &[u8]) -> Result<(String, String, Options)> {
    let filename = next_cstr(&mut buf)
        .ok_or_else(|| TftpError::InvalidPacket("request missing filename".to_string()))?;
    let mode = next_cstr(&mut buf)
        .ok_or_else(|| TftpError::InvalidPacket("request missing mode".to_string()))?
        .to_ascii_lowercase();

    let mut options = Options::default();
    while let (Some(key), Some(value)) = (next_cstr(&mut buf), next_cstr(&mut buf)) {
        match key.to_ascii_lowercase().as_str() {
            "blksize" => options.block_size = value.parse().ok(),
            "tsize" => options.transfer_size = value.parse().ok(),
            "timeout" => options.timeout_secs = value.parse().ok(),
            // Unknown options (windowsize and friends) are simply not
            // acknowledged, per RFC 2347.
            _ => {}
        }
    }
    Ok((filename, mode, options))
}

/// Pop the next NUL-terminated string off the buffer.
fn next_cstr(buf: &mut &[u8]) -> Option<String> {
    if buf.is_empty() {
        return None;
    }
    let end = buf.iter().position(|&b| b == 0)?;
    let s = String::from_utf8_lossy(&buf[..end]).into_owned();
    *buf = &buf[end + 1..];
    Some(s)
}

/// Encode a DATA packet.
pub fn encode_data(block: u16, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(4 + payload.len());
    buf.put_u16(opcode::DATA);
    buf.put_u16(block);
    buf.put_slice(payload);
    buf.freeze()
}

/// Encode an ERROR packet.
pub fn encode_error(code: ErrorCode, message: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(5 + message.len());
    buf.put_u16(opcode::ERROR);
    buf.put_u16(code.as_u16());
    buf.put_slice(message.as_bytes());
    buf.put_u8(0);
    buf.freeze()
}

/// Encode an OACK packet echoing the accepted options.
pub fn encode_oack(options: &Options) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u16(opcode::OACK);
    let mut put = |key: &str, value: String| {
        buf.put_slice(key.as_bytes());
        buf.put_u8(0);
        buf.put_slice(value.as_bytes());
        buf.put_u8(0);
    };
    if let Some(size) = options.block_size {
        put("blksize", size.to_string());
    }
    if let Some(size) = options.transfer_size {
        put("tsize", size.to_string());
    }
    if let Some(secs) = options.timeout_secs {
        put("timeout", secs.to_string());
    }
    buf.freeze()
}
