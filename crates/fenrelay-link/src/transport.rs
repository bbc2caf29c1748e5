use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::errors::LinkError;

/// Inbound text frames. Ends when the peer goes away.
pub type FrameStream = BoxStream<'static, Result<String, LinkError>>;

/// Write half of an engine connection.
#[async_trait]
pub trait FrameSink: Send {
    async fn send_text(&mut self, text: String) -> Result<(), LinkError>;

    /// Best-effort close. Errors are swallowed.
    async fn close(&mut self);
}

/// An open connection, split into its write and read halves.
pub struct EngineConnection {
    pub sink: Box<dyn FrameSink>,
    pub frames: FrameStream,
}

/// Opens connections to the engine.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<EngineConnection, LinkError>;
}
