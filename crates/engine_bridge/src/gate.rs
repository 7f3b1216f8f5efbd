use std::sync::{Condvar, Mutex, MutexGuard};

use tracing::debug;

use crate::error::BridgeError;

/// Lifecycle of the engine thread behind a bridge.
#[derive(Debug, Clone, Copy, Eq, PartialEq, PartialOrd, Ord)]
pub enum EngineState {
    NotStarted,
    Starting,
    Running,
    Stopped,
}

/// One-shot startup synchronization between submitters and the engine
/// thread.
///
/// State only moves forward. The first `ensure_started` call wins the
/// `NotStarted -> Starting` transition and runs the spawn closure; every
/// caller then waits until the engine reports `Running`.
pub struct StartupGate {
    state: Mutex<EngineState>,
    changed: Condvar,
}

impl Default for StartupGate {
    fn default() -> Self {
        Self::new()
    }
}

impl StartupGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EngineState::NotStarted),
            changed: Condvar::new(),
        }
    }

    pub fn state(&self) -> EngineState {
        *self.lock()
    }

    /// Starts the engine exactly once and blocks until it is running.
    ///
    /// `spawn` runs outside the gate lock, only for the caller that moved the
    /// gate out of `NotStarted`. If it fails the gate is stopped and the error
    /// returned. Callers arriving after the engine stopped get
    /// [`BridgeError::EngineStopped`].
    pub fn ensure_started<F>(&self, spawn: F) -> Result<(), BridgeError>
    where
        F: FnOnce() -> Result<(), BridgeError>,
    {
        {
            let mut state = self.lock();
            let current = *state;
            match current {
                EngineState::Running => return Ok(()),
                EngineState::Stopped => return Err(BridgeError::EngineStopped),
                EngineState::Starting => {}
                EngineState::NotStarted => {
                    *state = EngineState::Starting;
                    drop(state);
                    debug!("starting engine");
                    if let Err(err) = spawn() {
                        self.transition(EngineState::Stopped);
                        return Err(err);
                    }
                }
            }
        }
        self.wait_until_running()
    }

    fn wait_until_running(&self) -> Result<(), BridgeError> {
        let state = self
            .changed
            .wait_while(self.lock(), |state| *state < EngineState::Running)
            .expect("startup gate lock poisoned");
        match *state {
            EngineState::Running => Ok(()),
            _ => Err(BridgeError::EngineStopped),
        }
    }

    /// Called by the engine thread once it is ready for input. Returns `true`
    /// for the call that performed the `Starting -> Running` transition.
    pub fn signal_running(&self) -> bool {
        let mut state = self.lock();
        if *state != EngineState::Starting {
            return false;
        }
        *state = EngineState::Running;
        drop(state);
        debug!("engine is running");
        self.changed.notify_all();
        true
    }

    /// Called once the engine loop has returned. An engine that exits before
    /// signalling readiness goes straight to `Stopped`, and anyone waiting in
    /// `ensure_started` gets [`BridgeError::EngineStopped`].
    pub fn signal_stopped(&self) {
        let previous = std::mem::replace(&mut *self.lock(), EngineState::Stopped);
        self.changed.notify_all();
        match previous {
            EngineState::Running => debug!("engine is stopped"),
            EngineState::Stopped => {}
            _ => debug!(?previous, "engine stopped before it was ready"),
        }
    }

    fn transition(&self, next: EngineState) {
        let mut state = self.lock();
        if *state < next {
            *state = next;
        }
        drop(state);
        self.changed.notify_all();
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().expect("startup gate lock poisoned")
    }
}
