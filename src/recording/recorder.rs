//! Capture recorder: buffers one exchange definition per completed request

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::config::RecordOptions;
use crate::exchange::{ExchangeResponse, OutboundRequest};
use crate::intercept::InterceptContext;
use crate::{ReelError, Result};

use super::definition::ExchangeDefinition;
use super::format::{self, RenderedExchange};
use super::SEPARATOR;

/// Recorder front-end over a context's shared capture buffer
///
/// The buffer lifecycle is `rec -> accumulate -> play`, with `clear()` as the
/// only way to empty it.
pub struct Recorder {
    ctx: Arc<InterceptContext>,
}

impl Recorder {
    /// Create a recorder bound to an interception context
    #[must_use]
    pub fn new(ctx: Arc<InterceptContext>) -> Self {
        Self { ctx }
    }

    /// Begin recording
    ///
    /// Accepts [`RecordOptions`] or the boolean shorthand. Recording runs
    /// against the real network, so any active mock-serving mode is switched
    /// off.
    ///
    /// # Errors
    ///
    /// Returns [`ReelError::AlreadyRecording`] if a session is already open
    /// or the buffer still holds exchanges from a previous one.
    pub fn rec(&self, options: impl Into<RecordOptions>) -> Result<()> {
        self.ctx.recorder().begin(options.into())?;
        self.ctx.activate();
        info!("recording started");
        Ok(())
    }

    /// Empty the buffer and end the session, leaving activation state alone
    pub fn clear(&self) {
        self.ctx.recorder().clear();
    }

    /// Render the buffer contents per the active options, without clearing
    #[must_use]
    pub fn play(&self) -> Vec<RenderedExchange> {
        self.ctx.recorder().play()
    }
}

/// Shared capture state: options, buffer, and the open-session flag
pub(crate) struct RecorderCore {
    options: Mutex<RecordOptions>,
    buffer: Mutex<Vec<ExchangeDefinition>>,
    recording: AtomicBool,
}

impl RecorderCore {
    pub(crate) fn new() -> Self {
        Self {
            options: Mutex::new(RecordOptions::default()),
            buffer: Mutex::new(Vec::new()),
            recording: AtomicBool::new(false),
        }
    }

    /// Open a recording session, rejecting re-entry
    pub(crate) fn begin(&self, options: RecordOptions) -> Result<()> {
        let buffer = self.buffer.lock().expect("buffer lock poisoned");
        if self.recording.load(Ordering::SeqCst) || !buffer.is_empty() {
            return Err(ReelError::AlreadyRecording);
        }
        drop(buffer);

        *self.options.lock().expect("options lock poisoned") = options;
        self.recording.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub(crate) fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    /// Close the session without touching the buffer
    pub(crate) fn end_session(&self) {
        self.recording.store(false, Ordering::SeqCst);
    }

    pub(crate) fn clear(&self) {
        self.buffer.lock().expect("buffer lock poisoned").clear();
        self.recording.store(false, Ordering::SeqCst);
        info!("recording buffer cleared");
    }

    /// Append one definition for a completed request/response cycle
    ///
    /// Called by the interception tap once the response body is fully read;
    /// aborted requests never reach this point.
    pub(crate) fn record_exchange(
        &self,
        request: &OutboundRequest,
        response: &ExchangeResponse,
    ) -> Result<()> {
        let options = self.options.lock().expect("options lock poisoned").clone();
        let def = ExchangeDefinition::from_exchange(request, response, &options)?;

        debug!(
            "recorded exchange: {} {}{} -> {}",
            def.method, def.scope, def.path, def.status
        );

        self.emit(&options, &def);
        self.buffer.lock().expect("buffer lock poisoned").push(def);
        Ok(())
    }

    pub(crate) fn play(&self) -> Vec<RenderedExchange> {
        let options = self.options.lock().expect("options lock poisoned").clone();
        let buffer = self.buffer.lock().expect("buffer lock poisoned");

        buffer
            .iter()
            .map(|def| {
                if options.output_objects {
                    RenderedExchange::Object(def.clone())
                } else {
                    RenderedExchange::Text(format::render_definition(def))
                }
            })
            .collect()
    }

    /// Deliver one rendered exchange to the sink, or to stdout
    fn emit(&self, options: &RecordOptions, def: &ExchangeDefinition) {
        let rendered = if options.output_objects {
            RenderedExchange::Object(def.clone())
        } else {
            RenderedExchange::Text(format::render_definition(def))
        };

        let wrapped = match (&rendered, options.use_separator, options.logging.is_some()) {
            (RenderedExchange::Text(text), true, _) => {
                Some(format!("{SEPARATOR}{text}{SEPARATOR}"))
            }
            // A sink asking for separators gets the definition as a
            // delimited JSON payload.
            (RenderedExchange::Object(def), true, true) => {
                let json = serde_json::to_string_pretty(def).unwrap_or_default();
                Some(format!("{SEPARATOR}{json}{SEPARATOR}"))
            }
            _ => None,
        };
        let payload = match wrapped {
            Some(text) => RenderedExchange::Text(text),
            None => rendered,
        };

        if let Some(sink) = &options.logging {
            sink(payload);
        } else if !options.dont_print {
            match payload {
                RenderedExchange::Text(text) => println!("{text}"),
                RenderedExchange::Object(def) => {
                    println!("{}", serde_json::to_string_pretty(&def).unwrap_or_default());
                }
            }
        }
    }
}
