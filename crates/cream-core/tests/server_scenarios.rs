// crates/cream-core/tests/server_scenarios.rs
//
// End-to-end scenarios driven over a real TCP socket against a live
// `Server`, exercising the wire protocol rather than the table directly.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cream_core::config::ServerConfig;
use cream_core::Server;

fn start_server(num_workers: usize, max_entries: usize) -> (Arc<Server>, std::net::SocketAddr) {
    let config = ServerConfig::new(num_workers, 0, max_entries).with_ttl(Duration::from_secs(60));
    let server = Arc::new(Server::new(config).unwrap());
    let listener = server.bind().unwrap();
    let addr = listener.local_addr().unwrap();
    let server_for_thread = Arc::clone(&server);
    thread::spawn(move || {
        let _ = server_for_thread.serve(listener);
    });
    (server, addr)
}

fn connect(addr: std::net::SocketAddr) -> TcpStream {
    for _ in 0..200 {
        if let Ok(conn) = TcpStream::connect(addr) {
            return conn;
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("could not connect to test server at {addr}");
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

/// Sends one request on a fresh connection and returns (code, value).
fn roundtrip(addr: std::net::SocketAddr, opcode: u32, key: &[u8], value: &[u8]) -> (u32, Vec<u8>) {
    let mut conn = connect(addr);
    conn.write_all(&request(opcode, key, value)).unwrap();
    let mut header = [0u8; 8];
    conn.read_exact(&mut header).unwrap();
    let code = u32::from_be_bytes(header[0..4].try_into().unwrap());
    let value_size = u32::from_be_bytes(header[4..8].try_into().unwrap());
    let mut val = vec![0u8; value_size as usize];
    conn.read_exact(&mut val).unwrap();
    (code, val)
}

const OP_PUT: u32 = 0b0001;
const OP_GET: u32 = 0b0010;
const OP_EVICT: u32 = 0b0100;
const OP_CLEAR: u32 = 0b1000;

const OK: u32 = 0;
const NOT_FOUND: u32 = 1;
const BAD_REQUEST: u32 = 2;
const UNSUPPORTED: u32 = 3;

/// Scenario 1: four distinct keys fit a capacity-four table without loss.
#[test]
fn scenario_four_keys_capacity_four() {
    let (_server, addr) = start_server(2, 4);
    for (k, v) in [("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")] {
        let (code, _) = roundtrip(addr, OP_PUT, k.as_bytes(), v.as_bytes());
        assert_eq!(code, OK);
    }
    let (code, val) = roundtrip(addr, OP_GET, b"c", b"");
    assert_eq!(code, OK);
    assert_eq!(val, b"3");
}

/// Scenario 2: a capacity-two table forced past full always succeeds,
/// and the newest key is always retrievable afterward.
#[test]
fn scenario_overflow_force_insert_capacity_two() {
    let (_server, addr) = start_server(2, 2);
    assert_eq!(roundtrip(addr, OP_PUT, b"k1", b"v1").0, OK);
    assert_eq!(roundtrip(addr, OP_PUT, b"k2", b"v2").0, OK);
    assert_eq!(roundtrip(addr, OP_PUT, b"k3", b"v3").0, OK);

    let (code, val) = roundtrip(addr, OP_GET, b"k3", b"");
    assert_eq!(code, OK);
    assert_eq!(val, b"v3");
}

/// Scenario 3: evict a live entry, then PUT it back under a new value.
#[test]
fn scenario_evict_then_reput() {
    let (_server, addr) = start_server(2, 4);
    assert_eq!(roundtrip(addr, OP_PUT, b"k", b"v1").0, OK);
    assert_eq!(roundtrip(addr, OP_EVICT, b"k", b"").0, OK);
    assert_eq!(roundtrip(addr, OP_GET, b"k", b"").0, NOT_FOUND);
    assert_eq!(roundtrip(addr, OP_PUT, b"k", b"v2").0, OK);
    let (code, val) = roundtrip(addr, OP_GET, b"k", b"");
    assert_eq!(code, OK);
    assert_eq!(val, b"v2");
}

/// Scenario 4: an oversized key is rejected with BAD_REQUEST and never
/// reaches the table.
#[test]
fn scenario_oversized_key_is_bad_request() {
    let (server, addr) = start_server(2, 4);
    let oversized = vec![b'x'; cream_core::config::MAX_KEY_SIZE as usize + 1];
    let (code, _) = roundtrip(addr, OP_PUT, &oversized, b"v");
    assert_eq!(code, BAD_REQUEST);
    assert_eq!(server.table().len(), 0);
}

/// Scenario 5: CLEAR empties a table that had several live entries.
#[test]
fn scenario_clear_removes_everything() {
    let (server, addr) = start_server(2, 4);
    roundtrip(addr, OP_PUT, b"a", b"1");
    roundtrip(addr, OP_PUT, b"b", b"2");
    roundtrip(addr, OP_PUT, b"c", b"3");
    assert_eq!(roundtrip(addr, OP_CLEAR, b"", b"").0, OK);
    assert_eq!(server.table().len(), 0);
    assert_eq!(roundtrip(addr, OP_GET, b"a", b"").0, NOT_FOUND);
}

/// Scenario 6: a request whose opcode matches none of the four known
/// bits is answered UNSUPPORTED rather than closing the connection
/// without a response.
#[test]
fn scenario_unknown_opcode_is_unsupported() {
    let (_server, addr) = start_server(2, 4);
    let (code, _) = roundtrip(addr, 0, b"", b"");
    assert_eq!(code, UNSUPPORTED);
}

/// P8/P9-flavored property: many concurrent clients, distinct keys, no
/// lost writes and no cross-talk between connections.
#[test]
fn concurrent_clients_see_no_lost_writes() {
    let (_server, addr) = start_server(4, 128);
    let handles: Vec<_> = (0..32)
        .map(|i| {
            thread::spawn(move || {
                let key = format!("client-{i}");
                let val = format!("value-{i}");
                let (code, _) = roundtrip(addr, OP_PUT, key.as_bytes(), val.as_bytes());
                assert_eq!(code, OK);
                (key, val)
            })
        })
        .collect();

    let written: Vec<(String, String)> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for (key, val) in written {
        let (code, got) = roundtrip(addr, OP_GET, key.as_bytes(), b"");
        assert_eq!(code, OK);
        assert_eq!(got, val.into_bytes());
    }
}
