//! Transport to the Lighthouse server.

pub mod connector;
pub mod tls;

pub use connector::{Connector, ConnectorConfig, MessageHandler, RequestIds};
