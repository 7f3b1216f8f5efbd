use std::io::{self, Read, Write};
use std::sync::Arc;

use crate::bridge::Shared;
use crate::error::BridgeError;

/// Blocking input side handed to the engine loop.
///
/// Implements [`Read`], so an engine written against a plain reader (for
/// example `BufReader::new(input).lines()`) runs unchanged. A read returns
/// `0` only after the bridge input was closed and fully drained.
pub struct EngineInput {
    shared: Arc<Shared>,
}

impl EngineInput {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Blocks until input is available and returns `1..=max_bytes` bytes, or
    /// an empty vector at end of input.
    pub fn read_up_to(&mut self, max_bytes: usize) -> Result<Vec<u8>, BridgeError> {
        self.shared.blocking_read(max_bytes)
    }
}

impl Read for EngineInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.shared.blocking_read_into(buf).map_err(io::Error::from)
    }
}

/// Output side handed to the engine loop. Every write is accepted in full.
///
/// Cloning yields another handle onto the same line assembler, for engines
/// that print from more than one thread.
#[derive(Clone)]
pub struct EngineOutput {
    shared: Arc<Shared>,
}

impl EngineOutput {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }
}

impl Write for EngineOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.shared.blocking_write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
