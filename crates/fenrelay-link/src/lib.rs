//! The single connection to the analysis engine.
//!
//! [`ConnectionManager`] owns zero or one live socket, buffers requests
//! while disconnected, flushes them in order once connected and reconnects
//! on a fixed delay forever. Transports plug in through [`Connector`].

pub mod errors;
pub mod manager;
pub mod mock;
pub mod transport;
pub mod ws;

pub use errors::LinkError;
pub use manager::{ConnectionManager, LinkConfig, LinkEvent, LinkHandle};
pub use transport::{Connector, EngineConnection, FrameSink, FrameStream};
pub use ws::WsConnector;
