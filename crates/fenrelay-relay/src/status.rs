use fenrelay_core::{ConnectionState, EngineReply, Position, SessionId};
use serde::Serialize;

/// Point-in-time view of one session, for status displays.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub session_id: SessionId,
    /// Detector phase: `idle`, `sampling` or `confirming`.
    pub phase: &'static str,
    pub last_raw: Option<String>,
    pub last_confirmed: Option<Position>,
    pub connection: ConnectionState,
    /// Sticky once the session has sent anything to the engine.
    pub show_status: bool,
    pub in_flight: bool,
    /// Most recent reply from the engine, for any session.
    pub last_engine_reply: Option<EngineReply>,
}
