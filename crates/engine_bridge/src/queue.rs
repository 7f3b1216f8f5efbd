use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

use tokio::sync::mpsc;
use tracing::trace;

use crate::error::{BridgeError, QueueClosed};

/// FIFO of pending input lines feeding the engine's blocking reader.
///
/// Enqueueing is a channel send, so concurrent producers are serialized by
/// the channel and each send wakes at most one waiting reader. The consumer
/// side keeps the unread suffix of a partially consumed line locally, ahead
/// of anything still in the channel, which preserves FIFO order across
/// partial reads.
///
/// Reads block the calling OS thread and must not be issued from inside an
/// async runtime.
pub struct LineQueue {
    sender: Mutex<Option<mpsc::UnboundedSender<String>>>,
    reader: Mutex<QueueReader>,
    pending_bytes: AtomicUsize,
}

struct QueueReader {
    receiver: mpsc::UnboundedReceiver<String>,
    front: Vec<u8>,
    consumed: usize,
}

impl QueueReader {
    fn remaining(&self) -> &[u8] {
        &self.front[self.consumed..]
    }

    /// Blocks until a non-empty line is at the front; `false` once the queue
    /// is closed and drained.
    fn fill_front(&mut self) -> bool {
        while self.remaining().is_empty() {
            match self.receiver.blocking_recv() {
                // Empty lines carry no bytes and are skipped.
                Some(line) => {
                    self.front = line.into_bytes();
                    self.consumed = 0;
                }
                None => return false,
            }
        }
        true
    }
}

impl Default for LineQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl LineQueue {
    pub fn new() -> Self {
        Self::preloaded(Vec::new())
    }

    /// Creates an open queue that already holds `lines`, in order.
    pub fn preloaded(lines: impl IntoIterator<Item = String>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut pending_bytes = 0;
        for line in lines {
            let len = line.len();
            if sender.send(line).is_ok() {
                pending_bytes += len;
            }
        }
        Self {
            sender: Mutex::new(Some(sender)),
            reader: Mutex::new(QueueReader {
                receiver,
                front: Vec::new(),
                consumed: 0,
            }),
            pending_bytes: AtomicUsize::new(pending_bytes),
        }
    }

    /// Appends `line` to the tail of the queue.
    pub fn enqueue(&self, line: impl Into<String>) -> Result<(), QueueClosed> {
        let line = line.into();
        let guard = self.sender.lock().expect("line queue sender lock poisoned");
        let Some(sender) = guard.as_ref() else {
            return Err(QueueClosed(line));
        };

        let len = line.len();
        self.pending_bytes.fetch_add(len, Ordering::SeqCst);
        if let Err(err) = sender.send(line) {
            self.pending_bytes.fetch_sub(len, Ordering::SeqCst);
            return Err(QueueClosed(err.0));
        }
        trace!(bytes = len, "line enqueued");
        Ok(())
    }

    /// Blocks until input is available, then returns between 1 and
    /// `max_bytes` bytes from the front line.
    ///
    /// An empty vector means the queue was closed and every line has been
    /// consumed.
    pub fn read_up_to(&self, max_bytes: usize) -> Result<Vec<u8>, BridgeError> {
        self.take_front(max_bytes, <[u8]>::to_vec)
            .map(Option::unwrap_or_default)
    }

    /// Same as [`LineQueue::read_up_to`] but copies into `buf`, reading at
    /// most `buf.len()` bytes. Returns `0` only at end of input.
    pub fn read_into(&self, buf: &mut [u8]) -> Result<usize, BridgeError> {
        self.take_front(buf.len(), |bytes| {
            buf[..bytes.len()].copy_from_slice(bytes);
            bytes.len()
        })
        .map(Option::unwrap_or_default)
    }

    fn take_front<T>(
        &self,
        max_bytes: usize,
        consume: impl FnOnce(&[u8]) -> T,
    ) -> Result<Option<T>, BridgeError> {
        if max_bytes == 0 {
            return Err(BridgeError::EmptyRead);
        }

        let mut reader = self.reader.lock().expect("line queue reader lock poisoned");
        if !reader.fill_front() {
            return Ok(None);
        }

        let take = reader.remaining().len().min(max_bytes);
        let start = reader.consumed;
        let out = consume(&reader.front[start..start + take]);
        reader.consumed += take;
        if reader.remaining().is_empty() {
            reader.front.clear();
            reader.consumed = 0;
        }
        self.pending_bytes.fetch_sub(take, Ordering::SeqCst);
        Ok(Some(out))
    }

    /// Unread bytes across every queued line, including the unread suffix of
    /// a partially consumed one.
    pub fn pending_bytes(&self) -> usize {
        self.pending_bytes.load(Ordering::SeqCst)
    }

    /// Stops accepting new lines. Lines already queued can still be read;
    /// after they drain, reads report end of input. Returns `false` if the
    /// queue was already closed.
    pub fn close(&self) -> bool {
        let sender = self
            .sender
            .lock()
            .expect("line queue sender lock poisoned")
            .take();
        sender.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .expect("line queue sender lock poisoned")
            .is_none()
    }
}
