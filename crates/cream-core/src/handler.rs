//! Per-connection request dispatch: one request in, one response out.
//!
//! Grounded on `examples/original_source/src/cream.c`'s
//! `handle_request()` — same bitmask dispatch priority (PUT, then GET,
//! then EVICT, then CLEAR, then UNSUPPORTED), same per-opcode validation
//! shape. Two corrections from `SPEC_FULL.md`'s Open Questions are
//! applied here rather than the source's original behavior: PUT validates
//! key size *and* value size (a conjunction, not the source's buggy
//! independent checks), and PUT always forces past a full table — the
//! wire protocol exposes no separate "reject on overflow" opcode, so the
//! library-level `force = false` path is only reachable through
//! `cream_core::table` directly, not over the network.

use std::io::{Read, Write};

use log::{debug, warn};

use crate::codec::{self, RequestHeader, ResponseHeader};
use crate::config::{MAX_KEY_SIZE, MAX_VALUE_SIZE, MIN_KEY_SIZE, MIN_VALUE_SIZE};
use crate::error::{is_broken_pipe, CreamError};
use crate::table::Table;

fn key_size_in_bounds(size: u32) -> bool {
    (MIN_KEY_SIZE..=MAX_KEY_SIZE).contains(&size)
}

fn value_size_in_bounds(size: u32) -> bool {
    (MIN_VALUE_SIZE..=MAX_VALUE_SIZE).contains(&size)
}

/// Service exactly one request read from `stream`, writing exactly one
/// response back. Connection lifecycle (accept/close) is the caller's
/// responsibility; this only speaks the protocol.
///
/// The per-opcode handlers surface `NotFound`/`BadRequest`/`Unsupported`
/// as `Err` values rather than pre-built responses; this function is the
/// single place that maps each onto its wire response code. Any other
/// error (a hard I/O failure, an invalidated table) propagates to the
/// caller instead of producing a response, matching the handler's error
/// design: only the four soft conditions above are request-local
/// failures, everything else aborts the request with no response.
///
/// Broken-pipe errors while writing the response are swallowed — the
/// peer is gone, there is nothing further to do — everything else
/// propagates as [`CreamError::Transport`].
pub fn handle_connection(stream: &mut (impl Read + Write), table: &Table) -> Result<(), CreamError> {
    let header = match RequestHeader::read_from(stream) {
        Ok(h) => h,
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
            debug!("peer closed before sending a full request header");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    let outcome = match header.dispatch_bit() {
        Some(codec::OP_PUT) => handle_put(stream, table, &header),
        Some(codec::OP_GET) => handle_get(stream, table, &header),
        Some(codec::OP_EVICT) => handle_evict(stream, table, &header),
        Some(codec::OP_CLEAR) => handle_clear(table, &header),
        _ => Err(CreamError::Unsupported(header.opcode)),
    };

    let response = match outcome {
        Ok(response) => response,
        Err(CreamError::NotFound) => (ResponseHeader::not_found(), Vec::new()),
        Err(CreamError::BadRequest(msg)) => {
            warn!("rejecting request: {msg}");
            (ResponseHeader::bad_request(), Vec::new())
        }
        Err(CreamError::Unsupported(opcode)) => {
            warn!("unsupported opcode bitmask: {opcode:#x}");
            (ResponseHeader::unsupported(), Vec::new())
        }
        Err(other) => return Err(other),
    };

    write_response(stream, response)
}

type Response = (ResponseHeader, Vec<u8>);

fn write_response(stream: &mut impl Write, (header, payload): Response) -> Result<(), CreamError> {
    if let Err(err) = header.write_to(stream).and_then(|_| stream.write_all(&payload)) {
        if is_broken_pipe(&err) {
            debug!("peer closed before the response could be written");
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

fn handle_put(
    stream: &mut impl Read,
    table: &Table,
    header: &RequestHeader,
) -> Result<Response, CreamError> {
    if !key_size_in_bounds(header.key_size) || !value_size_in_bounds(header.value_size) {
        return Err(CreamError::BadRequest(format!(
            "PUT: key_size={} value_size={} out of bounds",
            header.key_size, header.value_size
        )));
    }

    let key = codec::read_payload(stream, header.key_size)?;
    let val = codec::read_payload(stream, header.value_size)?;

    match table.put(&key, val, true) {
        Ok(_) => Ok((ResponseHeader::ok(0), Vec::new())),
        Err(CreamError::InvalidArgument(msg)) => Err(CreamError::BadRequest(msg)),
        Err(CreamError::OutOfMemory) => unreachable!("PUT always forces, table never reports full"),
        Err(other) => Err(other),
    }
}

fn handle_get(
    stream: &mut impl Read,
    table: &Table,
    header: &RequestHeader,
) -> Result<Response, CreamError> {
    if !key_size_in_bounds(header.key_size) || header.value_size != 0 {
        return Err(CreamError::BadRequest(format!(
            "GET: key_size={} value_size={} out of bounds",
            header.key_size, header.value_size
        )));
    }
    let key = codec::read_payload(stream, header.key_size)?;

    match table.get(&key) {
        Ok(Some(val)) => Ok((ResponseHeader::ok(val.len() as u32), val)),
        Ok(None) => Err(CreamError::NotFound),
        Err(CreamError::InvalidArgument(msg)) => Err(CreamError::BadRequest(msg)),
        Err(other) => Err(other),
    }
}

fn handle_evict(
    stream: &mut impl Read,
    table: &Table,
    header: &RequestHeader,
) -> Result<Response, CreamError> {
    if !key_size_in_bounds(header.key_size) || header.value_size != 0 {
        return Err(CreamError::BadRequest(format!(
            "EVICT: key_size={} value_size={} out of bounds",
            header.key_size, header.value_size
        )));
    }
    let key = codec::read_payload(stream, header.key_size)?;

    match table.evict(&key) {
        Ok(true) => Ok((ResponseHeader::ok(0), Vec::new())),
        Ok(false) => Err(CreamError::NotFound),
        Err(CreamError::InvalidArgument(msg)) => Err(CreamError::BadRequest(msg)),
        Err(other) => Err(other),
    }
}

fn handle_clear(table: &Table, header: &RequestHeader) -> Result<Response, CreamError> {
    if header.key_size != 0 || header.value_size != 0 {
        return Err(CreamError::BadRequest(format!(
            "CLEAR: key_size={} value_size={} must both be zero",
            header.key_size, header.value_size
        )));
    }
    table.clear()?;
    Ok((ResponseHeader::ok(0), Vec::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{OP_CLEAR, OP_EVICT, OP_GET, OP_PUT};
    use std::io::Cursor;
    use std::time::Duration;

    fn table(capacity: usize) -> Table {
        Table::with_default_hash(capacity, Duration::from_secs(3600)).unwrap()
    }

    fn request(opcode: u32, key: &[u8], value: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&opcode.to_be_bytes());
        buf.extend_from_slice(&(key.len() as u32).to_be_bytes());
        buf.extend_from_slice(&(value.len() as u32).to_be_bytes());
        buf.extend_from_slice(key);
        buf.extend_from_slice(value);
        buf
    }

    fn run(req: Vec<u8>, table: &Table) -> (ResponseHeader, Vec<u8>) {
        let req_len = req.len();
        let mut conn = Cursor::new(req);
        handle_connection(&mut conn, table).unwrap();
        let bytes = conn.into_inner();
        let response_bytes = &bytes[req_len..];
        let code = u32::from_be_bytes(response_bytes[0..4].try_into().unwrap());
        let value_size = u32::from_be_bytes(response_bytes[4..8].try_into().unwrap());
        let value = response_bytes[8..8 + value_size as usize].to_vec();
        (ResponseHeader { code, value_size }, value)
    }

    #[test]
    fn put_then_get_round_trips_over_the_wire() {
        let t = table(4);
        let (resp, _) = run(request(OP_PUT, b"k", b"v"), &t);
        assert_eq!(resp.code, codec::RESP_OK);

        let (resp, val) = run(request(OP_GET, b"k", b""), &t);
        assert_eq!(resp.code, codec::RESP_OK);
        assert_eq!(val, b"v");
    }

    #[test]
    fn get_of_missing_key_is_not_found() {
        let t = table(4);
        let (resp, _) = run(request(OP_GET, b"missing", b""), &t);
        assert_eq!(resp.code, codec::RESP_NOT_FOUND);
    }

    #[test]
    fn oversized_key_is_bad_request_and_not_stored() {
        let t = table(4);
        let oversized_key = vec![b'x'; (MAX_KEY_SIZE + 1) as usize];
        let (resp, _) = run(request(OP_PUT, &oversized_key, b"v"), &t);
        assert_eq!(resp.code, codec::RESP_BAD_REQUEST);
        assert_eq!(t.len(), 0);
    }

    // Open Question 1's fix: a valid key size alongside an oversized value
    // size must be rejected (conjunction of bounds), not accepted the way
    // the source's buggy independent checks would have let it through.
    #[test]
    fn oversized_value_with_valid_key_is_bad_request_and_not_stored() {
        let t = table(4);
        let oversized_value = vec![b'v'; (MAX_VALUE_SIZE + 1) as usize];
        let (resp, _) = run(request(OP_PUT, b"k", &oversized_value), &t);
        assert_eq!(resp.code, codec::RESP_BAD_REQUEST);
        assert_eq!(t.len(), 0);
        assert_eq!(t.get(b"k").unwrap(), None);
    }

    #[test]
    fn evict_then_get_reports_not_found() {
        let t = table(4);
        run(request(OP_PUT, b"k", b"v"), &t);
        let (resp, _) = run(request(OP_EVICT, b"k", b""), &t);
        assert_eq!(resp.code, codec::RESP_OK);
        let (resp, _) = run(request(OP_GET, b"k", b""), &t);
        assert_eq!(resp.code, codec::RESP_NOT_FOUND);
    }

    #[test]
    fn clear_empties_the_table() {
        let t = table(4);
        run(request(OP_PUT, b"a", b"1"), &t);
        run(request(OP_PUT, b"b", b"2"), &t);
        let (resp, _) = run(request(OP_CLEAR, b"", b""), &t);
        assert_eq!(resp.code, codec::RESP_OK);
        assert_eq!(t.len(), 0);
    }

    #[test]
    fn unknown_opcode_is_unsupported() {
        let t = table(4);
        let (resp, _) = run(request(0, b"", b""), &t);
        assert_eq!(resp.code, codec::RESP_UNSUPPORTED);
    }

    #[test]
    fn put_overflow_always_succeeds_via_force() {
        let t = table(1);
        run(request(OP_PUT, b"first", b"1"), &t);
        let (resp, _) = run(request(OP_PUT, b"second", b"2"), &t);
        assert_eq!(resp.code, codec::RESP_OK);
        assert_eq!(t.len(), 1);
    }
}
