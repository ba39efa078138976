//! The wire protocol: fixed-layout binary headers, network byte order.
//!
//! Grounded on `examples/original_source/src/cream.c`'s
//! `request_header_t { request_code, key_size, value_size }` and
//! `response_header_t { code, value_size }`, each field a 32-bit word.
//! Rust's `u32::to_be_bytes`/`from_be_bytes` stand in for the source's
//! `htonl`/`ntohl` calls.

use std::io::{self, Read, Write};

/// `PUT` bit of the request opcode bitmask.
pub const OP_PUT: u32 = 0b0001;
/// `GET` bit of the request opcode bitmask.
pub const OP_GET: u32 = 0b0010;
/// `EVICT` bit of the request opcode bitmask.
pub const OP_EVICT: u32 = 0b0100;
/// `CLEAR` bit of the request opcode bitmask.
pub const OP_CLEAR: u32 = 0b1000;

/// `OK` response code.
pub const RESP_OK: u32 = 0;
/// `NOT_FOUND` response code.
pub const RESP_NOT_FOUND: u32 = 1;
/// `BAD_REQUEST` response code.
pub const RESP_BAD_REQUEST: u32 = 2;
/// `UNSUPPORTED` response code.
pub const RESP_UNSUPPORTED: u32 = 3;

const HEADER_WORD_SIZE: usize = 4;

/// The fixed three-word request header: opcode bitmask, key size, value
/// size, each a big-endian `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub opcode: u32,
    pub key_size: u32,
    pub value_size: u32,
}

impl RequestHeader {
    /// Read the 12-byte header off the wire. Propagates `UnexpectedEof`
    /// as-is so the caller can distinguish "peer closed before sending a
    /// full header" from other I/O failures.
    pub fn read_from(r: &mut impl Read) -> io::Result<Self> {
        let mut buf = [0u8; HEADER_WORD_SIZE * 3];
        r.read_exact(&mut buf)?;
        Ok(Self {
            opcode: u32::from_be_bytes(buf[0..4].try_into().unwrap()),
            key_size: u32::from_be_bytes(buf[4..8].try_into().unwrap()),
            value_size: u32::from_be_bytes(buf[8..12].try_into().unwrap()),
        })
    }

    /// `true` if exactly one of PUT/GET/EVICT/CLEAR is set, checked in
    /// that priority order (mirrors the source's sequence of
    /// independent `if` checks, each guarding against the others).
    pub fn dispatch_bit(&self) -> Option<u32> {
        for bit in [OP_PUT, OP_GET, OP_EVICT, OP_CLEAR] {
            if self.opcode & bit == bit {
                return Some(bit);
            }
        }
        None
    }
}

/// The fixed two-word response header: response code, value size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub code: u32,
    pub value_size: u32,
}

impl ResponseHeader {
    pub fn ok(value_size: u32) -> Self {
        Self { code: RESP_OK, value_size }
    }

    pub fn not_found() -> Self {
        Self { code: RESP_NOT_FOUND, value_size: 0 }
    }

    pub fn bad_request() -> Self {
        Self { code: RESP_BAD_REQUEST, value_size: 0 }
    }

    pub fn unsupported() -> Self {
        Self { code: RESP_UNSUPPORTED, value_size: 0 }
    }

    /// Write the 8-byte header to the wire.
    pub fn write_to(&self, w: &mut impl Write) -> io::Result<()> {
        let mut buf = [0u8; HEADER_WORD_SIZE * 2];
        buf[0..4].copy_from_slice(&self.code.to_be_bytes());
        buf[4..8].copy_from_slice(&self.value_size.to_be_bytes());
        w.write_all(&buf)
    }
}

/// Read exactly `size` bytes of payload following a header.
pub fn read_payload(r: &mut impl Read, size: u32) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; size as usize];
    r.read_exact(&mut buf)?;
    Ok(buf)
}
