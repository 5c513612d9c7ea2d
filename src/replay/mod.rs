//! Replay: serve recorded exchanges as mocks, without network access

mod engine;
mod mock;

pub use engine::{all_done, define, pending};
pub use mock::{mock, BodyFilter, MockBuilder, MockHandle};

pub(crate) use mock::{MockSet, MockState};
