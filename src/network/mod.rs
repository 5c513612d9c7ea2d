//! Outbound network layer

mod transport;

pub use transport::{HyperTransport, Transport};
