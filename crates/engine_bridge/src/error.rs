use std::io;

use thiserror::Error;

/// Errors reported by the bridge to its immediate caller.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("read request must ask for at least one byte")]
    EmptyRead,
    #[error("engine has stopped; submissions are no longer accepted")]
    EngineStopped,
    #[error("input stream is closed")]
    InputClosed,
    #[error("engine loop was already taken by a previous start")]
    EngineMissing,
    #[error("failed to spawn engine thread `{thread_name}`: {source}")]
    Spawn {
        thread_name: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse bridge config: {source}")]
    ConfigParse {
        #[source]
        source: toml::de::Error,
    },
    #[error("bridge config is invalid: {0}")]
    InvalidConfig(String),
}

impl From<BridgeError> for io::Error {
    fn from(err: BridgeError) -> Self {
        let kind = match &err {
            BridgeError::EmptyRead | BridgeError::InvalidConfig(_) => io::ErrorKind::InvalidInput,
            BridgeError::EngineStopped | BridgeError::InputClosed => io::ErrorKind::BrokenPipe,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

/// Returned by [`crate::LineQueue::enqueue`] once the queue has been closed.
///
/// Carries the rejected line back to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("line queue is closed")]
pub struct QueueClosed(pub String);

/// Details about an output line discarded for exceeding the configured limit.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct OversizedLine {
    pub line_number: usize,
    pub observed_bytes: usize,
    pub max_line_bytes: usize,
}
