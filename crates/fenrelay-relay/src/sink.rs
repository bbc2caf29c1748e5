use fenrelay_core::{ConnectionState, DisplayEvent, EngineReply, Position, SessionId};
use tokio::sync::mpsc;

/// Receives everything the relay has to show or act on.
pub trait DisplaySink: Send + Sync + 'static {
    fn position_confirmed(&self, session_id: &SessionId, position: &Position, is_duplicate: bool);

    /// `session_id` is `None` for process-wide changes.
    fn connection_state(&self, session_id: Option<&SessionId>, state: ConnectionState);

    fn request_sent(&self, session_id: &SessionId);

    fn engine_reply(&self, session_id: &SessionId, reply: &EngineReply);
}

/// Sink that forwards every notification as a [`DisplayEvent`].
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<DisplayEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DisplayEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn emit(&self, event: DisplayEvent) {
        let _ = self.tx.send(event);
    }
}

impl DisplaySink for ChannelSink {
    fn position_confirmed(&self, session_id: &SessionId, position: &Position, is_duplicate: bool) {
        self.emit(DisplayEvent::PositionConfirmed {
            session_id: session_id.clone(),
            position: position.clone(),
            is_duplicate,
        });
    }

    fn connection_state(&self, session_id: Option<&SessionId>, state: ConnectionState) {
        self.emit(DisplayEvent::ConnectionChanged {
            session_id: session_id.cloned(),
            state,
        });
    }

    fn request_sent(&self, session_id: &SessionId) {
        self.emit(DisplayEvent::RequestSent {
            session_id: session_id.clone(),
        });
    }

    fn engine_reply(&self, session_id: &SessionId, reply: &EngineReply) {
        self.emit(DisplayEvent::EngineReply {
            session_id: session_id.clone(),
            reply: reply.clone(),
        });
    }
}
