//! Reel - HTTP traffic capture and replay for deterministic tests
//!
//! Records outbound HTTP exchanges through an injected transport seam, renders
//! them as replayable definitions, and later serves those definitions back as
//! mocks without any network access.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_panics_doc,
    clippy::multiple_crate_versions
)]

pub mod config;
pub mod error;
pub mod exchange;
pub mod intercept;
pub mod network;
pub mod recording;
pub mod replay;

pub use config::RecordOptions;
pub use error::{ReelError, Result};
pub use exchange::{ExchangeResponse, OutboundRequest};
pub use intercept::{InterceptContext, InterceptedClient};
pub use recording::{ExchangeDefinition, Recorder, RenderedExchange};
pub use replay::{define, mock, MockHandle};
