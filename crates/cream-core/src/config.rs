//! Server configuration and the hand-rolled CLI argument contract.
//!
//! The argument contract (usage text, `"Invalid arguments"` message, exit
//! codes) is load-bearing for external callers of the `cream` binary, so
//! it is parsed by hand rather than through a declarative argument-parsing
//! crate — see `SPEC_FULL.md` §4.F for the rationale.

use std::fmt;
use std::time::Duration;

/// Minimum key length accepted by `PUT`/`GET`/`EVICT`.
pub const MIN_KEY_SIZE: u32 = 1;
/// Maximum key length accepted by `PUT`/`GET`/`EVICT`.
pub const MAX_KEY_SIZE: u32 = 256;
/// Minimum value length accepted by `PUT`. `0` is permitted (empty value).
pub const MIN_VALUE_SIZE: u32 = 0;
/// Maximum value length accepted by `PUT`.
pub const MAX_VALUE_SIZE: u32 = 4096;

/// Default time-to-live for a live slot before it is reclaimed on next
/// probe. Exposed as a constructor parameter (see [`ServerConfig::ttl`])
/// rather than hard-coded, so tests can use short TTLs.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Configuration for one `cream` server instance.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Number of long-lived worker threads servicing the request queue.
    pub num_workers: usize,
    /// TCP port to listen on.
    pub port: u16,
    /// Fixed capacity of the underlying table.
    pub max_entries: usize,
    /// Time-to-live for a live slot.
    pub ttl: Duration,
}

impl ServerConfig {
    /// Construct a config with the default TTL.
    pub fn new(num_workers: usize, port: u16, max_entries: usize) -> Self {
        Self {
            num_workers,
            port,
            max_entries,
            ttl: DEFAULT_TTL,
        }
    }

    /// Override the default TTL (builder-style).
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Outcome of parsing command-line arguments.
pub enum CliOutcome {
    /// Arguments parsed into a usable configuration.
    Run(ServerConfig),
    /// `-h` was present: usage text has already been decided, caller
    /// should print it and exit `0`.
    Help,
    /// Arguments were invalid: caller should print the message to
    /// stderr and exit non-zero.
    Error(String),
}

/// Parse `args` (as in `std::env::args().collect::<Vec<_>>()`, including
/// `args[0]` as the program name) per the contract in `SPEC_FULL.md` §4.F:
///
/// - any argument equal to `-h` prints usage and exits `0`, regardless of
///   position or other arguments present;
/// - otherwise exactly 3 positional arguments (`argc == 4` counting the
///   program name) are required: `NUM_WORKERS PORT_NUMBER MAX_ENTRIES`;
/// - `NUM_WORKERS` and `MAX_ENTRIES` must parse as positive integers;
/// - `PORT_NUMBER` must parse as a `u16`.
pub fn parse_args(args: &[String]) -> CliOutcome {
    if args.iter().skip(1).any(|a| a == "-h") {
        return CliOutcome::Help;
    }

    if args.len() != 4 {
        return CliOutcome::Error("Invalid arguments".to_string());
    }

    let num_workers: usize = match args[1].parse::<i64>() {
        Ok(n) if n > 0 => n as usize,
        _ => return CliOutcome::Error("Invalid arguments".to_string()),
    };

    let port: u16 = match args[2].parse() {
        Ok(p) => p,
        Err(_) => return CliOutcome::Error("Invalid arguments".to_string()),
    };

    let max_entries: usize = match args[3].parse::<i64>() {
        Ok(n) if n > 0 => n as usize,
        _ => return CliOutcome::Error("Invalid arguments".to_string()),
    };

    CliOutcome::Run(ServerConfig::new(num_workers, port, max_entries))
}

/// The usage text printed for `-h`.
pub fn usage(prog_name: &str) -> String {
    format!(
        "Usage:\n{prog_name} [-h] NUM_WORKERS PORT_NUMBER MAX_ENTRIES\n\
         -h                 Displays this help menu and returns EXIT_SUCCESS.\n\
         NUM_WORKERS        The number of worker threads used to service requests.\n\
         PORT_NUMBER        Port number to listen on for incoming connections.\n\
         MAX_ENTRIES        The maximum number of entries that can be stored in cream's underlying data store.\n"
    )
}

impl fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ServerConfig {{ num_workers: {}, port: {}, max_entries: {}, ttl: {:?} }}",
            self.num_workers, self.port, self.max_entries, self.ttl
        )
    }
}
