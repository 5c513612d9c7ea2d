//! Recording configuration

use std::fmt;
use std::sync::Arc;

use crate::recording::RenderedExchange;

/// Sink invoked once per captured exchange with its rendered form.
///
/// Receives a string in text mode, or the structured definition when
/// `output_objects` is set (serialized and wrapped with cut markers when
/// `use_separator` forces a delimited payload).
pub type LoggingSink = Arc<dyn Fn(RenderedExchange) + Send + Sync>;

/// Options accepted by [`Recorder::rec`](crate::recording::Recorder::rec)
#[derive(Clone)]
pub struct RecordOptions {
    /// Suppress the default console output
    pub dont_print: bool,
    /// Emit structured exchange definitions instead of source text
    pub output_objects: bool,
    /// Capture request headers (`user-agent` is always excluded)
    pub enable_reqheaders_recording: bool,
    /// Wrap each text emission with cut markers
    pub use_separator: bool,
    /// Omit response headers from recorded definitions
    pub dont_rec_res_headers: bool,
    /// Custom sink invoked once per captured exchange
    pub logging: Option<LoggingSink>,
}

impl Default for RecordOptions {
    fn default() -> Self {
        Self {
            dont_print: false,
            output_objects: false,
            enable_reqheaders_recording: false,
            use_separator: true,
            dont_rec_res_headers: false,
            logging: None,
        }
    }
}

impl fmt::Debug for RecordOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordOptions")
            .field("dont_print", &self.dont_print)
            .field("output_objects", &self.output_objects)
            .field(
                "enable_reqheaders_recording",
                &self.enable_reqheaders_recording,
            )
            .field("use_separator", &self.use_separator)
            .field("dont_rec_res_headers", &self.dont_rec_res_headers)
            .field("logging", &self.logging.is_some())
            .finish()
    }
}

// Legacy boolean shorthand: `rec(true)` records with default text output,
// `rec(false)` records silently.
impl From<bool> for RecordOptions {
    fn from(print: bool) -> Self {
        Self {
            dont_print: !print,
            ..Self::default()
        }
    }
}
