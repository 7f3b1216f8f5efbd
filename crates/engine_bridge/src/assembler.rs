use std::borrow::Cow;
use std::sync::Mutex;

use crate::config::{BridgeConfig, OutputLimits};
use crate::error::OversizedLine;
use crate::sink::LineSink;

enum FinishedLine {
    Line(Vec<u8>),
    TooLong(OversizedLine),
}

#[derive(Default)]
struct AssemblerState {
    current_line: Vec<u8>,
    observed_bytes: usize,
    discard_mode: bool,
    line_number: usize,
}

impl AssemblerState {
    fn append(&mut self, segment: &[u8], max_line_bytes: Option<usize>) {
        self.observed_bytes = self.observed_bytes.saturating_add(segment.len());
        if let Some(max) = max_line_bytes {
            if self.observed_bytes > max && !self.discard_mode {
                self.discard_mode = true;
                self.current_line = Vec::new();
            }
        }
        if !self.discard_mode {
            self.current_line.extend_from_slice(segment);
        }
    }

    fn finish_line(&mut self, max_line_bytes: Option<usize>) -> FinishedLine {
        self.line_number += 1;
        let finished = match (self.discard_mode, max_line_bytes) {
            (true, Some(max_line_bytes)) => FinishedLine::TooLong(OversizedLine {
                line_number: self.line_number,
                observed_bytes: self.observed_bytes,
                max_line_bytes,
            }),
            _ => FinishedLine::Line(std::mem::take(&mut self.current_line)),
        };
        self.current_line.clear();
        self.observed_bytes = 0;
        self.discard_mode = false;
        finished
    }
}

/// Reassembles arbitrarily chunked engine output into delimited lines.
///
/// Bytes are buffered until a delimiter arrives; each complete line is handed
/// to the sink inside the `write` call that completed it. The unterminated
/// tail is kept for the next write.
pub struct OutputAssembler {
    delimiter: u8,
    strip_carriage_return: bool,
    limits: OutputLimits,
    state: Mutex<AssemblerState>,
}

impl OutputAssembler {
    pub fn new(delimiter: u8) -> Self {
        Self {
            delimiter,
            strip_carriage_return: false,
            limits: OutputLimits::default(),
            state: Mutex::new(AssemblerState::default()),
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            delimiter: config.delimiter,
            strip_carriage_return: config.strip_carriage_return,
            limits: config.limits,
            state: Mutex::new(AssemblerState::default()),
        }
    }

    /// Buffers `bytes` and delivers every line they complete. Always accepts
    /// the whole input.
    pub fn write(&self, bytes: &[u8], sink: &dyn LineSink) -> usize {
        let max_line_bytes = self.limits.max_line_bytes;
        let mut state = self.state.lock().expect("output assembler lock poisoned");

        let mut rest = bytes;
        while let Some(idx) = rest.iter().position(|b| *b == self.delimiter) {
            state.append(&rest[..idx], max_line_bytes);
            match state.finish_line(max_line_bytes) {
                FinishedLine::Line(line) => sink.deliver_line(&self.decode(&line)),
                FinishedLine::TooLong(oversized) => sink.line_too_long(oversized),
            }
            rest = &rest[idx + 1..];
        }
        state.append(rest, max_line_bytes);

        bytes.len()
    }

    /// Bytes seen since the last delimiter, including any being discarded.
    pub fn buffered_len(&self) -> usize {
        self.state
            .lock()
            .expect("output assembler lock poisoned")
            .observed_bytes
    }

    fn decode<'a>(&self, line: &'a [u8]) -> Cow<'a, str> {
        let line = if self.strip_carriage_return {
            line.strip_suffix(b"\r").unwrap_or(line)
        } else {
            line
        };
        String::from_utf8_lossy(line)
    }
}
