//! Error types for WHOIS resolution.

use std::time::Duration;

use thiserror::Error;

/// Failure of a single transport call
#[derive(Error, Debug)]
pub enum TransportError {
    /// Could not open a connection to the server
    #[error("cannot connect to WHOIS server {server}: {source}")]
    Connect {
        server: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading or writing the connection failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The call did not finish within its timeout
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The whois client process could not be started
    #[error("failed to spawn whois client: {0}")]
    Spawn(#[source] std::io::Error),

    /// The whois client process exited unsuccessfully
    #[error("whois client exited with {}: {stderr}", code.map_or("signal".to_string(), |c| format!("status {c}")))]
    Exit { code: Option<i32>, stderr: String },
}

/// Main error type for lookups
#[derive(Error, Debug)]
pub enum WhoisError {
    /// A transport call failed and no fan-out or fallback recovered it
    #[error("query to {server} failed: {source}")]
    Transport {
        server: String,
        #[source]
        source: TransportError,
    },

    /// The query is not an IP address, CIDR prefix or address range
    #[error("invalid prefix: {0}")]
    InvalidPrefix(String),

    /// Widening the query down to the floor never satisfied the predicate
    #[error("no covering allocation found for {query} within /{floor}")]
    NoCoveringAllocation { query: String, floor: u8 },
}

/// Result type alias for lookups
pub type Result<T> = std::result::Result<T, WhoisError>;
