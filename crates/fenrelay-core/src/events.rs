use serde::{Deserialize, Serialize};

use crate::ids::SessionId;
use crate::position::Position;
use crate::wire::EngineReply;

/// Lifecycle of the single engine connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection state plus whether a reconnect timer is armed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkStatus {
    pub state: ConnectionState,
    pub reconnect_pending: bool,
}

impl LinkStatus {
    /// What a status display should show. A disconnected link with a
    /// reconnect armed reads as `connecting`.
    pub fn reported(&self) -> ConnectionState {
        match (self.state, self.reconnect_pending) {
            (ConnectionState::Disconnected, true) => ConnectionState::Connecting,
            (state, _) => state,
        }
    }
}

/// Notifications delivered to the display / actuator side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DisplayEvent {
    PositionConfirmed {
        session_id: SessionId,
        position: Position,
        is_duplicate: bool,
    },

    /// `session_id` is `None` for process-wide connection changes.
    ConnectionChanged {
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<SessionId>,
        state: ConnectionState,
    },

    RequestSent {
        session_id: SessionId,
    },

    EngineReply {
        session_id: SessionId,
        reply: EngineReply,
    },
}

impl DisplayEvent {
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::PositionConfirmed { session_id, .. }
            | Self::RequestSent { session_id }
            | Self::EngineReply { session_id, .. } => Some(session_id),
            Self::ConnectionChanged { session_id, .. } => session_id.as_ref(),
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::PositionConfirmed { .. } => "position_confirmed",
            Self::ConnectionChanged { .. } => "connection_changed",
            Self::RequestSent { .. } => "request_sent",
            Self::EngineReply { .. } => "engine_reply",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::normalize;

    #[test]
    fn pending_reconnect_reads_as_connecting() {
        let status = LinkStatus {
            state: ConnectionState::Disconnected,
            reconnect_pending: true,
        };
        assert_eq!(status.reported(), ConnectionState::Connecting);

        let idle = LinkStatus::default();
        assert_eq!(idle.reported(), ConnectionState::Disconnected);

        let up = LinkStatus {
            state: ConnectionState::Connected,
            reconnect_pending: true,
        };
        assert_eq!(up.reported(), ConnectionState::Connected);
    }

    #[test]
    fn connection_state_serializes_lowercase() {
        let json = serde_json::to_string(&ConnectionState::Connecting).unwrap();
        assert_eq!(json, "\"connecting\"");
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
    }

    #[test]
    fn display_event_wire_shape() {
        let event = DisplayEvent::PositionConfirmed {
            session_id: SessionId::from_raw("tab-1"),
            position: normalize("8/8/8/8/8/8/8/8 w").unwrap(),
            is_duplicate: false,
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "position_confirmed");
        assert_eq!(json["session_id"], "tab-1");
        assert_eq!(json["position"], "8/8/8/8/8/8/8/8 w KQkq - 0 1");
        assert_eq!(event.event_type(), "position_confirmed");
    }

    #[test]
    fn global_connection_change_has_no_session() {
        let event = DisplayEvent::ConnectionChanged {
            session_id: None,
            state: ConnectionState::Connected,
        };
        assert!(event.session_id().is_none());
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"connection_changed","state":"connected"}"#);
    }
}
