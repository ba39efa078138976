//! Error types shared by the table, queue, codec, and request handler.
//!
//! Plain hand-written enum, no `thiserror` — matching the style used
//! elsewhere in this workspace's ancestry for small, closed error sets.

use std::fmt;
use std::io;

/// Everything that can go wrong inside `cream_core`.
#[derive(Debug)]
pub enum CreamError {
    /// Null/empty key or value, zero capacity, unknown opcode reaching a
    /// component that doesn't expect it, or an operation on an
    /// invalidated table/queue.
    InvalidArgument(String),

    /// Table is full and the caller asked for `force = false`.
    OutOfMemory,

    /// GET/EVICT found no live entry for the key. Raised by the request
    /// handler, which maps it onto the `NOT_FOUND` wire response rather
    /// than propagating it to the connection's caller.
    NotFound,

    /// Unknown request opcode, raised by the request handler's dispatch
    /// and mapped onto the `UNSUPPORTED` wire response.
    Unsupported(u32),

    /// Well-formed header but out-of-bounds sizes or other payload
    /// violations.
    BadRequest(String),

    /// I/O failure while reading or writing a connection. A broken pipe
    /// here is expected and handled by closing the connection, not by
    /// propagating the error further.
    Transport(io::Error),
}

impl fmt::Display for CreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreamError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            CreamError::OutOfMemory => write!(f, "table is full"),
            CreamError::NotFound => write!(f, "key not found"),
            CreamError::Unsupported(code) => write!(f, "unsupported opcode: 0x{code:08x}"),
            CreamError::BadRequest(msg) => write!(f, "bad request: {msg}"),
            CreamError::Transport(err) => write!(f, "transport error: {err}"),
        }
    }
}

impl std::error::Error for CreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CreamError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for CreamError {
    fn from(err: io::Error) -> Self {
        CreamError::Transport(err)
    }
}

/// Is this I/O error a broken pipe? Per the wire protocol, the handler
/// swallows these silently rather than logging them as failures.
pub fn is_broken_pipe(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::BrokenPipe
}
