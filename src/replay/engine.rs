//! Replay engine: install recorded definitions as live mocks

use std::sync::Arc;

use tracing::info;

use crate::intercept::InterceptContext;
use crate::recording::ExchangeDefinition;
use crate::Result;

use super::mock::{MockHandle, MockState};

/// Install definitions as mocks and switch the context to mock serving
///
/// Returns one handle per definition, in order. Defining while already
/// serving appends to the live set.
///
/// # Errors
///
/// Returns error if any definition carries a scope that is not an absolute
/// origin
pub fn define(
    ctx: &Arc<InterceptContext>,
    definitions: impl IntoIterator<Item = ExchangeDefinition>,
) -> Result<Vec<MockHandle>> {
    let mut states = Vec::new();
    let mut handles = Vec::new();

    for definition in definitions {
        let state = MockState::install(definition)?;
        handles.push(MockHandle::new(Arc::clone(&state)));
        states.push(state);
    }

    info!("{} mock(s) defined", handles.len());
    ctx.serve_mocks(states);
    Ok(handles)
}

/// Descriptions of the mocks in `handles` that have not been matched yet
#[must_use]
pub fn pending(handles: &[MockHandle]) -> Vec<String> {
    handles
        .iter()
        .filter(|handle| !handle.is_done())
        .map(MockHandle::description)
        .collect()
}

/// Assert that every mock in `handles` was matched
///
/// # Errors
///
/// Returns the first [`ReelError::MockNotMatched`](crate::ReelError::MockNotMatched)
pub fn all_done(handles: &[MockHandle]) -> Result<()> {
    for handle in handles {
        handle.done()?;
    }
    Ok(())
}
