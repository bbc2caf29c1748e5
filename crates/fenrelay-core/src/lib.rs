pub mod errors;
pub mod events;
pub mod ids;
pub mod position;
pub mod wire;

pub use errors::RelayError;
pub use events::{ConnectionState, DisplayEvent, LinkStatus};
pub use ids::{RequestId, SessionId};
pub use position::{normalize, NormalizeError, Position, PositionKey};
pub use wire::{EngineReply, EngineRequest, OutboundRequest, Score};
