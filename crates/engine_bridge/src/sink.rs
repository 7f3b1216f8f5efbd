use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::error::OversizedLine;

/// Receives assembled output lines from the engine.
///
/// Both methods run synchronously on the engine thread while the output
/// assembler is locked. An implementation must not block on the bridge's
/// input queue or startup gate, and must not write to the bridge output.
pub trait LineSink: Send + Sync + 'static {
    fn deliver_line(&self, line: &str);

    fn line_too_long(&self, oversized: OversizedLine) {
        warn!(
            line_number = oversized.line_number,
            observed_bytes = oversized.observed_bytes,
            max_line_bytes = oversized.max_line_bytes,
            "dropping oversized engine output line"
        );
    }
}

impl<F> LineSink for F
where
    F: Fn(&str) + Send + Sync + 'static,
{
    fn deliver_line(&self, line: &str) {
        self(line)
    }
}

/// Shared reference to the caller-side delivery target.
#[derive(Clone)]
pub struct CallerHandle(Arc<dyn LineSink>);

impl CallerHandle {
    pub fn new(sink: impl LineSink) -> Self {
        Self(Arc::new(sink))
    }

    pub fn from_arc(sink: Arc<dyn LineSink>) -> Self {
        Self(sink)
    }

    pub(crate) fn sink(&self) -> &dyn LineSink {
        self.0.as_ref()
    }
}

impl fmt::Debug for CallerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CallerHandle").finish_non_exhaustive()
    }
}
