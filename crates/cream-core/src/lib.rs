//! `cream_core`: a concurrent, bounded, in-memory key/value cache.
//!
//! The table (open addressing, tombstones, TTL expiration, force
//! eviction) lives in [`table`]; the wire protocol in [`codec`]; the
//! per-connection dispatch in [`handler`]; the bounded FIFO work queue in
//! [`queue`]; and the acceptor/worker-pool server tying them together in
//! [`server`].

pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod queue;
pub mod server;
pub mod table;

pub use config::ServerConfig;
pub use error::CreamError;
pub use queue::Queue;
pub use server::Server;
pub use table::Table;
