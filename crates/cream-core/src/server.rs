//! The acceptor/worker-pool server: one thread accepting connections and
//! handing them to a fixed pool of persistent worker threads.
//!
//! Grounded on `examples/original_source/src/cream.c`'s `main()`/`thread()`
//! functions (accept loop feeding a queue, `num_workers` long-lived
//! worker threads each looping `dequeue` → `handle_request` → close) and
//! on the example pack's interpreter pool for the named-thread spawn
//! idiom (`thread::Builder::new().name(..).spawn(..)`). Unlike the
//! source's process-wide globals, state is threaded explicitly through a
//! `Server` value — there is no hidden singleton to reset between tests.

use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};
use nix::sys::signal::{self, SigHandler, Signal};

use crate::config::ServerConfig;
use crate::handler;
use crate::queue::Queue;
use crate::table::Table;

/// One running (or not-yet-started) cache server: a table, a request
/// queue, and the configuration used to size the worker pool.
pub struct Server {
    config: ServerConfig,
    table: Arc<Table>,
    queue: Arc<Queue<TcpStream>>,
}

impl Server {
    /// Build a server with a freshly allocated table sized per `config`.
    pub fn new(config: ServerConfig) -> Result<Self, crate::error::CreamError> {
        let table = Arc::new(Table::with_default_hash(config.max_entries, config.ttl)?);
        Ok(Self {
            config,
            table,
            queue: Arc::new(Queue::new()),
        })
    }

    /// The underlying table, for introspection in tests and the CLI.
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Bind the listening socket. Ignores `SIGPIPE` process-wide first,
    /// matching the source's startup sequence, so a client disconnecting
    /// mid-write becomes an `EPIPE`-flavored `io::Error` instead of
    /// terminating the process.
    pub fn bind(&self) -> std::io::Result<TcpListener> {
        ignore_sigpipe();
        TcpListener::bind(("0.0.0.0", self.config.port))
    }

    /// Bind and serve forever. The long-running entry point used by the
    /// `cream` binary.
    pub fn run(&self) -> std::io::Result<()> {
        let listener = self.bind()?;
        self.serve(listener)
    }

    /// Spawn the worker pool and accept connections on an
    /// already-bound `listener` until the listener itself errors out.
    /// Split from [`Server::run`] so tests can bind an ephemeral port
    /// (`port = 0`) and discover the real address before serving.
    pub fn serve(&self, listener: TcpListener) -> std::io::Result<()> {
        let workers: Vec<JoinHandle<()>> = (0..self.config.num_workers)
            .map(|id| {
                let queue = Arc::clone(&self.queue);
                let table = Arc::clone(&self.table);
                thread::Builder::new()
                    .name(format!("cream-worker-{id}"))
                    .spawn(move || worker_loop(id, &queue, &table))
                    .expect("failed to spawn cream worker thread")
            })
            .collect();

        info!(
            "cream listening on {:?} with {} workers",
            listener.local_addr(),
            self.config.num_workers
        );

        for incoming in listener.incoming() {
            match incoming {
                Ok(conn) => {
                    if let Err(err) = self.queue.enqueue(conn) {
                        warn!("dropping accepted connection: {err}");
                    }
                }
                Err(err) => warn!("accept failed: {err}"),
            }
        }

        self.shutdown();
        for worker in workers {
            let _ = worker.join();
        }
        Ok(())
    }

    /// Cooperative shutdown: invalidate the request queue, which drains
    /// queued connections and wakes every worker blocked in `dequeue` so
    /// it returns `None` and exits its loop. Does not itself stop an
    /// in-progress `listener.incoming()` accept loop — callers that need
    /// that drop the listener instead.
    pub fn shutdown(&self) {
        self.queue.invalidate();
    }
}

fn worker_loop(id: usize, queue: &Queue<TcpStream>, table: &Table) {
    debug!("worker {id} starting");
    while let Some(mut conn) = queue.dequeue() {
        if let Err(err) = handler::handle_connection(&mut conn, table) {
            warn!("worker {id}: {err}");
        }
        let _ = conn.shutdown(std::net::Shutdown::Both);
    }
    debug!("worker {id} exiting");
}

fn ignore_sigpipe() {
    // Safety: installing a signal handler is inherently unsafe FFI, but
    // SIG_IGN is the simplest possible disposition and is installed once,
    // process-wide, before any socket I/O begins.
    unsafe {
        if let Err(err) = signal::signal(Signal::SIGPIPE, SigHandler::SigIgn) {
            warn!("failed to ignore SIGPIPE: {err}");
        }
    }
}
