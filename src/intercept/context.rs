//! Interception context: the explicit mode state machine

use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::recording::RecorderCore;
use crate::replay::{MockSet, MockState};

/// Interception mode
#[derive(Clone)]
enum State {
    /// Networking untouched
    Inactive,
    /// Requests reach the real network and are observed
    RecordingPassthrough,
    /// Requests are answered from definitions, no network access
    MockServing(Arc<MockSet>),
}

/// Owns the process's interception state
///
/// Inject one context (behind an `Arc`) into every [`InterceptedClient`]
/// whose traffic should be observable. Transitions are explicit — `activate`,
/// `restore`, [`Recorder::rec`], [`define`] — never implicit; recording
/// passthrough and mock serving are mutually exclusive.
///
/// [`InterceptedClient`]: crate::intercept::InterceptedClient
/// [`Recorder::rec`]: crate::recording::Recorder::rec
/// [`define`]: crate::replay::define
pub struct InterceptContext {
    state: Mutex<State>,
    recorder: Arc<RecorderCore>,
}

impl InterceptContext {
    /// Create an inactive context
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::Inactive),
            recorder: Arc::new(RecorderCore::new()),
        }
    }

    /// Whether any interception mode is engaged
    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(
            *self.state.lock().expect("state lock poisoned"),
            State::Inactive
        )
    }

    /// Switch to recording passthrough
    ///
    /// Drops any active mock set: recording observes the real network, so
    /// mock serving is forced off.
    pub fn activate(&self) {
        let mut state = self.state.lock().expect("state lock poisoned");
        if matches!(*state, State::MockServing(_)) {
            debug!("mock serving deactivated by recording");
        }
        *state = State::RecordingPassthrough;
    }

    /// Return to unmodified networking
    ///
    /// Ends any open recording session; the capture buffer is kept until
    /// [`Recorder::clear`](crate::recording::Recorder::clear).
    pub fn restore(&self) {
        *self.state.lock().expect("state lock poisoned") = State::Inactive;
        self.recorder.end_session();
        info!("interception restored");
    }

    pub(crate) fn recorder(&self) -> &Arc<RecorderCore> {
        &self.recorder
    }

    /// Install mocks, appending when a set is already being served
    pub(crate) fn serve_mocks(&self, mocks: Vec<Arc<MockState>>) {
        let mut state = self.state.lock().expect("state lock poisoned");
        match &*state {
            State::MockServing(set) => set.extend(mocks),
            _ => *state = State::MockServing(Arc::new(MockSet::new(mocks))),
        }
    }

    /// Snapshot the tap behavior for one request
    pub(crate) fn tap(&self) -> Tap {
        match &*self.state.lock().expect("state lock poisoned") {
            State::Inactive => Tap::Passthrough,
            State::RecordingPassthrough => {
                // Activation without an open recording session observes
                // without capturing.
                if self.recorder.is_recording() {
                    Tap::Record(Arc::clone(&self.recorder))
                } else {
                    Tap::Passthrough
                }
            }
            State::MockServing(set) => Tap::Serve(Arc::clone(set)),
        }
    }
}

impl Default for InterceptContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-request view of the context
pub(crate) enum Tap {
    Passthrough,
    Record(Arc<RecorderCore>),
    Serve(Arc<MockSet>),
}
