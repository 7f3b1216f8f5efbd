use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, warn};

use crate::assembler::OutputAssembler;
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::gate::{EngineState, StartupGate};
use crate::queue::LineQueue;
use crate::sink::CallerHandle;
use crate::stream::{EngineInput, EngineOutput};

/// The blocking engine loop driven by a bridge.
///
/// `run` executes on the bridge's dedicated engine thread. It should read
/// commands from `input` until it decides to quit or the input reports end of
/// stream, writing protocol output to `output`.
pub trait EngineLoop: Send + 'static {
    fn run(self: Box<Self>, input: EngineInput, output: EngineOutput) -> io::Result<()>;
}

impl<F> EngineLoop for F
where
    F: FnOnce(EngineInput, EngineOutput) -> io::Result<()> + Send + 'static,
{
    fn run(self: Box<Self>, input: EngineInput, output: EngineOutput) -> io::Result<()> {
        (*self)(input, output)
    }
}

/// State shared between the bridge and its engine thread.
pub(crate) struct Shared {
    queue: LineQueue,
    assembler: OutputAssembler,
    gate: StartupGate,
    caller: OnceLock<CallerHandle>,
    reading: AtomicBool,
    engine_exited: AtomicBool,
}

impl Shared {
    pub(crate) fn blocking_read(&self, max_bytes: usize) -> Result<Vec<u8>, BridgeError> {
        if max_bytes == 0 {
            return Err(BridgeError::EmptyRead);
        }
        self.mark_reading();
        self.queue.read_up_to(max_bytes)
    }

    pub(crate) fn blocking_read_into(&self, buf: &mut [u8]) -> Result<usize, BridgeError> {
        if buf.is_empty() {
            return Err(BridgeError::EmptyRead);
        }
        self.mark_reading();
        self.queue.read_into(buf)
    }

    pub(crate) fn blocking_write(&self, bytes: &[u8]) -> usize {
        let Some(caller) = self.caller.get() else {
            error!(bytes = bytes.len(), "engine output arrived before any caller");
            panic!("engine produced output before any caller submitted a line");
        };
        self.assembler.write(bytes, caller.sink())
    }

    /// The engine counts as running from its first read attempt. Reads made
    /// before the engine was started do not count.
    fn mark_reading(&self) {
        if !self.reading.load(Ordering::SeqCst) && self.gate.signal_running() {
            self.reading.store(true, Ordering::SeqCst);
        }
    }

    /// Called once the engine loop is done with its input. Submissions
    /// rejected from here on report the engine as stopped.
    fn close_for_exit(&self) {
        self.engine_exited.store(true, Ordering::SeqCst);
        self.queue.close();
    }
}

/// Closes input and stops the gate when the engine thread unwinds or returns.
struct StopOnExit<'a>(&'a Shared);

impl Drop for StopOnExit<'_> {
    fn drop(&mut self) {
        self.0.close_for_exit();
        self.0.gate.signal_stopped();
    }
}

fn run_engine(shared: Arc<Shared>, engine: Box<dyn EngineLoop>) -> io::Result<()> {
    let _stop = StopOnExit(&shared);
    let input = EngineInput::new(Arc::clone(&shared));
    let output = EngineOutput::new(Arc::clone(&shared));

    let result = engine.run(input, output);
    match &result {
        Ok(()) => debug!("engine loop returned"),
        Err(err) => error!(%err, "engine loop failed"),
    }
    result
}

/// Connects one blocking engine loop to any number of submitting callers.
///
/// The engine thread is spawned lazily by the first [`EngineBridge::submit_line`]
/// call, which blocks until the engine asks for input. Output lines are
/// delivered to the [`CallerHandle`] captured from that first call, on the
/// engine thread. Dropping the bridge closes the input and joins the engine
/// thread.
pub struct EngineBridge {
    shared: Arc<Shared>,
    engine: Mutex<Option<Box<dyn EngineLoop>>>,
    thread: Mutex<Option<JoinHandle<io::Result<()>>>>,
    thread_name: String,
}

impl EngineBridge {
    pub fn new(engine: impl EngineLoop) -> Self {
        Self::build(Box::new(engine), BridgeConfig::default())
    }

    pub fn with_config(
        engine: impl EngineLoop,
        config: BridgeConfig,
    ) -> Result<Self, BridgeError> {
        config.validate()?;
        Ok(Self::build(Box::new(engine), config))
    }

    fn build(engine: Box<dyn EngineLoop>, config: BridgeConfig) -> Self {
        let shared = Shared {
            assembler: OutputAssembler::from_config(&config),
            queue: LineQueue::preloaded(config.startup_lines),
            gate: StartupGate::new(),
            caller: OnceLock::new(),
            reading: AtomicBool::new(false),
            engine_exited: AtomicBool::new(false),
        };
        Self {
            shared: Arc::new(shared),
            engine: Mutex::new(Some(engine)),
            thread: Mutex::new(None),
            thread_name: config.thread_name,
        }
    }

    /// Queues one line of input for the engine.
    ///
    /// The first call captures `caller` as the delivery target for all engine
    /// output, starts the engine thread and blocks until the engine is ready
    /// for input; later calls ignore `caller` and only enqueue.
    pub fn submit_line(
        &self,
        caller: &CallerHandle,
        line: impl Into<String>,
    ) -> Result<(), BridgeError> {
        self.shared.caller.get_or_init(|| {
            debug!("caller handle captured");
            caller.clone()
        });
        self.shared.gate.ensure_started(|| self.spawn_engine())?;

        self.shared.queue.enqueue(line).map_err(|_| {
            if self.shared.engine_exited.load(Ordering::SeqCst)
                || self.state() == EngineState::Stopped
            {
                BridgeError::EngineStopped
            } else {
                BridgeError::InputClosed
            }
        })
    }

    fn spawn_engine(&self) -> Result<(), BridgeError> {
        let mut thread_slot = self.thread.lock().expect("engine thread lock poisoned");
        let engine = self
            .engine
            .lock()
            .expect("engine slot lock poisoned")
            .take()
            .ok_or(BridgeError::EngineMissing)?;

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || run_engine(shared, engine))
            .map_err(|source| BridgeError::Spawn {
                thread_name: self.thread_name.clone(),
                source,
            })?;
        debug!(thread = %self.thread_name, "engine thread spawned");
        *thread_slot = Some(handle);
        Ok(())
    }

    /// Reads from the input queue as the engine would. The first call marks
    /// the engine as running.
    pub fn blocking_read(&self, max_bytes: usize) -> Result<Vec<u8>, BridgeError> {
        self.shared.blocking_read(max_bytes)
    }

    /// Feeds engine output into the line assembler, delivering completed
    /// lines to the captured caller before returning.
    ///
    /// # Panics
    ///
    /// Panics if no caller has submitted a line yet, since there is nobody to
    /// deliver output to.
    pub fn blocking_write(&self, bytes: &[u8]) -> usize {
        self.shared.blocking_write(bytes)
    }

    pub fn state(&self) -> EngineState {
        self.shared.gate.state()
    }

    /// Unread input bytes still waiting for the engine.
    pub fn pending_bytes(&self) -> usize {
        self.shared.queue.pending_bytes()
    }

    /// Stops accepting input. The engine drains what is queued and then
    /// reads end of stream. Returns `false` if input was already closed.
    pub fn close_input(&self) -> bool {
        let closed = self.shared.queue.close();
        if closed {
            debug!("engine input closed");
        }
        closed
    }

    /// Closes input and waits for the engine thread to finish, returning the
    /// engine loop's result. Later calls return `Ok(())`.
    ///
    /// Must not be called from the engine thread, e.g. from inside a
    /// [`crate::LineSink`] callback.
    pub fn shutdown(&self) -> io::Result<()> {
        self.close_input();

        let mut thread_slot = self.thread.lock().expect("engine thread lock poisoned");
        let Some(handle) = thread_slot.take() else {
            if self.state() == EngineState::NotStarted {
                self.shared.gate.signal_stopped();
            }
            return Ok(());
        };

        if handle.thread().id() == thread::current().id() {
            *thread_slot = Some(handle);
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "engine bridge cannot be shut down from the engine thread",
            ));
        }
        drop(thread_slot);

        debug!(thread = %self.thread_name, "joining engine thread");
        match handle.join() {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::Other,
                "engine thread panicked",
            )),
        }
    }
}

impl Drop for EngineBridge {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!(%err, "engine did not shut down cleanly");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;

    fn collecting_caller() -> (CallerHandle, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let caller = CallerHandle::new(move |line: &str| {
            let _ = tx.lock().unwrap().send(line.to_string());
        });
        (caller, rx)
    }

    fn echo_engine(input: EngineInput, mut output: EngineOutput) -> io::Result<()> {
        for line in BufReader::new(input).lines() {
            let line = line?;
            if line == "quit" {
                break;
            }
            writeln!(output, "echo {line}")?;
        }
        Ok(())
    }

    #[test]
    fn engine_is_not_started_until_first_submission() {
        let bridge = EngineBridge::new(echo_engine);
        assert_eq!(bridge.state(), EngineState::NotStarted);

        let (caller, rx) = collecting_caller();
        bridge.submit_line(&caller, "hello\n").unwrap();
        assert_eq!(bridge.state(), EngineState::Running);
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "echo hello");
    }

    #[test]
    fn startup_lines_reach_the_engine_first() {
        let config = BridgeConfig {
            startup_lines: vec!["uci\n".to_string()],
            ..BridgeConfig::default()
        };
        let bridge = EngineBridge::with_config(echo_engine, config).unwrap();
        let (caller, rx) = collecting_caller();
        bridge.submit_line(&caller, "isready\n").unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "echo uci");
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "echo isready");
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = BridgeConfig {
            thread_name: String::new(),
            ..BridgeConfig::default()
        };
        assert!(matches!(
            EngineBridge::with_config(echo_engine, config),
            Err(BridgeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn submissions_after_engine_exit_are_rejected() {
        let bridge = EngineBridge::new(echo_engine);
        let (caller, _rx) = collecting_caller();
        bridge.submit_line(&caller, "quit\n").unwrap();
        bridge.shutdown().unwrap();

        assert_eq!(bridge.state(), EngineState::Stopped);
        assert!(matches!(
            bridge.submit_line(&caller, "uci\n"),
            Err(BridgeError::EngineStopped)
        ));
    }

    #[test]
    fn shutdown_before_start_stops_the_bridge() {
        let bridge = EngineBridge::new(echo_engine);
        bridge.shutdown().unwrap();
        assert_eq!(bridge.state(), EngineState::Stopped);

        let (caller, _rx) = collecting_caller();
        assert!(matches!(
            bridge.submit_line(&caller, "uci\n"),
            Err(BridgeError::EngineStopped)
        ));
    }

    #[test]
    fn engine_error_is_returned_from_shutdown() {
        let bridge = EngineBridge::new(|mut input: EngineInput, _output: EngineOutput| -> io::Result<()> {
            input.read_up_to(64).map_err(io::Error::from)?;
            Err(io::Error::new(io::ErrorKind::InvalidData, "bad command"))
        });
        let (caller, _rx) = collecting_caller();
        bridge.submit_line(&caller, "garbage").unwrap();

        let err = bridge.shutdown().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(bridge.state(), EngineState::Stopped);
    }

    #[test]
    fn engine_exiting_before_reading_releases_first_caller() {
        let bridge = EngineBridge::new(
            |_input: EngineInput, _output: EngineOutput| -> io::Result<()> { Ok(()) },
        );
        let (caller, _rx) = collecting_caller();
        assert!(matches!(
            bridge.submit_line(&caller, "uci"),
            Err(BridgeError::EngineStopped)
        ));
    }

    #[test]
    fn read_before_first_submission_does_not_block_startup() {
        let config = BridgeConfig {
            startup_lines: vec!["uci\n".to_string()],
            ..BridgeConfig::default()
        };
        let bridge = Arc::new(EngineBridge::with_config(echo_engine, config).unwrap());
        assert_eq!(bridge.blocking_read(64).unwrap(), b"uci\n");
        assert_eq!(bridge.state(), EngineState::NotStarted);

        let (caller, rx) = collecting_caller();
        let (done_tx, done_rx) = mpsc::channel();
        {
            let bridge = Arc::clone(&bridge);
            thread::spawn(move || {
                let _ = done_tx.send(bridge.submit_line(&caller, "isready\n"));
            });
        }

        assert!(matches!(
            done_rx.recv_timeout(Duration::from_secs(5)),
            Ok(Ok(()))
        ));
        assert_eq!(bridge.state(), EngineState::Running);
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "echo isready");
    }

    #[test]
    fn submit_after_engine_closed_input_reports_stopped() {
        let bridge = EngineBridge::new(echo_engine);
        let (caller, rx) = collecting_caller();
        bridge.submit_line(&caller, "one\n").unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "echo one");

        // Same order as the exit guard: input closed, gate not yet stopped.
        bridge.shared.close_for_exit();
        assert_eq!(bridge.state(), EngineState::Running);
        assert!(matches!(
            bridge.submit_line(&caller, "two\n"),
            Err(BridgeError::EngineStopped)
        ));
        bridge.shutdown().unwrap();
    }

    #[test]
    fn closed_input_is_reported_to_submitters() {
        let bridge = EngineBridge::new(echo_engine);
        let (caller, rx) = collecting_caller();
        bridge.submit_line(&caller, "one\n").unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "echo one");

        // The engine may observe end of input and stop before the next submit.
        assert!(bridge.close_input());
        assert!(matches!(
            bridge.submit_line(&caller, "two\n"),
            Err(BridgeError::InputClosed | BridgeError::EngineStopped)
        ));
        bridge.shutdown().unwrap();
    }

    #[test]
    fn zero_length_read_is_a_usage_error() {
        let bridge = EngineBridge::new(echo_engine);
        assert!(matches!(bridge.blocking_read(0), Err(BridgeError::EmptyRead)));
        assert_eq!(bridge.state(), EngineState::NotStarted);
    }

    #[test]
    #[should_panic(expected = "before any caller")]
    fn output_without_a_caller_is_fatal() {
        let bridge = EngineBridge::new(echo_engine);
        bridge.blocking_write(b"id name X\n");
    }
}
