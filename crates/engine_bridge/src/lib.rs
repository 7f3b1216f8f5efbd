#![forbid(unsafe_code)]
//! Bridges a blocking, line-oriented engine loop to callers that submit
//! commands from arbitrary threads and receive output through a callback.
//!
//! The engine runs on a dedicated thread started by the first submission. It
//! sees an ordinary blocking byte stream on both sides:
//! - [`EngineInput`] (`std::io::Read`) pops submitted lines, partially if the
//!   engine asks for fewer bytes than a line holds.
//! - [`EngineOutput`] (`std::io::Write`) reassembles arbitrarily chunked
//!   writes into lines and hands each one to the caller's [`LineSink`].
//!
//! ```no_run
//! use std::io::{BufRead, BufReader, Write};
//!
//! use engine_bridge::{CallerHandle, EngineBridge, EngineInput, EngineOutput};
//!
//! fn engine(input: EngineInput, mut output: EngineOutput) -> std::io::Result<()> {
//!     for line in BufReader::new(input).lines() {
//!         if line?.trim() == "uci" {
//!             writeln!(output, "id name Echo")?;
//!             writeln!(output, "uciok")?;
//!         }
//!     }
//!     Ok(())
//! }
//!
//! let bridge = EngineBridge::new(engine);
//!
//! let caller = CallerHandle::new(|line: &str| println!("engine: {line}"));
//! bridge.submit_line(&caller, "uci\n")?;
//! # Ok::<(), engine_bridge::BridgeError>(())
//! ```

mod assembler;
mod bridge;
mod config;
mod error;
mod gate;
mod queue;
mod sink;
mod stream;

pub use assembler::OutputAssembler;
pub use bridge::{EngineBridge, EngineLoop};
pub use config::{BridgeConfig, OutputLimits, DEFAULT_DELIMITER, DEFAULT_THREAD_NAME};
pub use error::{BridgeError, OversizedLine, QueueClosed};
pub use gate::{EngineState, StartupGate};
pub use queue::LineQueue;
pub use sink::{CallerHandle, LineSink};
pub use stream::{EngineInput, EngineOutput};
