use dashmap::DashMap;
use fenrelay_core::SessionId;

/// Live read access to whatever position a session's host is showing.
///
/// Reads must be cheap and non-blocking; the detector calls this from
/// inside its timers.
pub trait Observer: Send + Sync + 'static {
    /// Raw position text as currently displayed, or `None` if the host
    /// has nothing to show (page gone, board not mounted).
    fn read_current_position(&self, session_id: &SessionId) -> Option<String>;
}

/// Observer backed by the most recent value pushed for each session.
#[derive(Debug, Default)]
pub struct LatestValueObserver {
    latest: DashMap<SessionId, String>,
}

impl LatestValueObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record what the session is showing now.
    pub fn set(&self, session_id: &SessionId, raw: impl Into<String>) {
        let _ = self.latest.insert(session_id.clone(), raw.into());
    }

    /// The session no longer shows a position.
    pub fn clear(&self, session_id: &SessionId) {
        let _ = self.latest.remove(session_id);
    }
}

impl Observer for LatestValueObserver {
    fn read_current_position(&self, session_id: &SessionId) -> Option<String> {
        self.latest.get(session_id).map(|v| v.value().clone())
    }
}
