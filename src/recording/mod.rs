//! Capture recording: one exchange definition per completed request

mod decode;
mod definition;
mod format;
mod recorder;

pub use definition::{ExchangeDefinition, QueryValue, RecordedBody, DEFAULT_STATUS};
pub use format::RenderedExchange;
pub use recorder::Recorder;

pub(crate) use definition::{normalize_scope, parse_query, scope_of};
pub(crate) use recorder::RecorderCore;

/// Cut marker wrapped around emissions when `use_separator` is set
pub const SEPARATOR: &str = "\n<<<<<<-- cut here -->>>>>>\n";
