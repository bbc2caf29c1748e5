//! Scripted observer for tests.

use std::collections::{HashMap, VecDeque};

use fenrelay_core::SessionId;
use parking_lot::Mutex;

use crate::observer::Observer;

#[derive(Default)]
struct Script {
    reads: VecDeque<Option<String>>,
    /// Returned once `reads` runs dry.
    current: Option<String>,
    read_count: usize,
}

/// Observer that plays back a fixed sequence of reads per session.
///
/// Each read pops the next scripted value; after the script is exhausted
/// the last value popped (or the one given to [`ScriptedObserver::show`])
/// is returned indefinitely.
#[derive(Default)]
pub struct ScriptedObserver {
    sessions: Mutex<HashMap<SessionId, Script>>,
}

impl ScriptedObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue reads for a session.
    pub fn script<I, S>(&self, session_id: &SessionId, reads: I)
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        let mut sessions = self.sessions.lock();
        let script = sessions.entry(session_id.clone()).or_default();
        script
            .reads
            .extend(reads.into_iter().map(|r| r.map(Into::into)));
    }

    /// Show a fixed value from now on, dropping any queued reads.
    pub fn show(&self, session_id: &SessionId, raw: Option<&str>) {
        let mut sessions = self.sessions.lock();
        let script = sessions.entry(session_id.clone()).or_default();
        script.reads.clear();
        script.current = raw.map(str::to_owned);
    }

    /// How many times the session has been read.
    pub fn read_count(&self, session_id: &SessionId) -> usize {
        self.sessions
            .lock()
            .get(session_id)
            .map_or(0, |s| s.read_count)
    }
}

impl Observer for ScriptedObserver {
    fn read_current_position(&self, session_id: &SessionId) -> Option<String> {
        let mut sessions = self.sessions.lock();
        let script = sessions.entry(session_id.clone()).or_default();
        script.read_count += 1;
        if let Some(next) = script.reads.pop_front() {
            script.current = next;
        }
        script.current.clone()
    }
}
