//! Relay router actor.
//!
//! Owns the session table. Raw reports, finished stability rounds and
//! engine link events are handled one at a time in a single task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use fenrelay_core::wire::DEFAULT_SEARCH_DEPTH;
use fenrelay_core::{ConnectionState, EngineReply, OutboundRequest, Position, SessionId};
use fenrelay_detector::{
    Observer, ReportDisposition, RoundOutcome, RoundReport, StabilityConfig, StabilityDetector,
};
use fenrelay_link::{LinkEvent, LinkHandle};
use fenrelay_settings::RelaySettings;
use fenrelay_telemetry::{names, MetricsRecorder};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use crate::dedup::DedupTable;
use crate::sink::DisplaySink;
use crate::status::SessionStatus;

/// Router settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RelayConfig {
    pub stability: StabilityConfig,
    pub search_depth: u32,
    /// Confirm whatever the observer shows as soon as a session starts.
    pub prime_on_start: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            stability: StabilityConfig::default(),
            search_depth: DEFAULT_SEARCH_DEPTH,
            prime_on_start: false,
        }
    }
}

impl From<&RelaySettings> for RelayConfig {
    fn from(settings: &RelaySettings) -> Self {
        Self {
            stability: StabilityConfig::from(&settings.stability),
            search_depth: settings.engine.search_depth,
            prime_on_start: settings.stability.prime_on_start,
        }
    }
}

enum RelayCommand {
    Report { session_id: SessionId, raw: String },
    Started(SessionId),
    Ended(SessionId),
    RestartDetector(SessionId),
    Status {
        session_id: SessionId,
        reply: oneshot::Sender<Option<SessionStatus>>,
    },
    Sessions(oneshot::Sender<Vec<SessionId>>),
    Shutdown,
}

/// Cloneable handle to the router task.
#[derive(Clone)]
pub struct RelayHandle {
    cmd_tx: mpsc::UnboundedSender<RelayCommand>,
}

impl RelayHandle {
    /// Push a raw position from the observer. Creates the session on first
    /// use.
    pub fn report_raw_position(&self, session_id: SessionId, raw: impl Into<String>) {
        let _ = self.cmd_tx.send(RelayCommand::Report {
            session_id,
            raw: raw.into(),
        });
    }

    pub fn session_started(&self, session_id: SessionId) {
        let _ = self.cmd_tx.send(RelayCommand::Started(session_id));
    }

    /// Drop the session and cancel its pending timers.
    pub fn session_ended(&self, session_id: SessionId) {
        let _ = self.cmd_tx.send(RelayCommand::Ended(session_id));
    }

    /// Reset the session's detector as after a page reload. The last
    /// transmitted key is kept, so re-confirming the same position is
    /// reported as a duplicate.
    pub fn restart_detector(&self, session_id: SessionId) {
        let _ = self.cmd_tx.send(RelayCommand::RestartDetector(session_id));
    }

    /// `None` for unknown sessions or once the router has stopped.
    pub async fn status(&self, session_id: SessionId) -> Option<SessionStatus> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(RelayCommand::Status {
                session_id,
                reply: tx,
            })
            .ok()?;
        rx.await.ok().flatten()
    }

    /// Live sessions, sorted.
    pub async fn sessions(&self) -> Vec<SessionId> {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(RelayCommand::Sessions(tx)).is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(RelayCommand::Shutdown);
    }
}

struct Session {
    detector: StabilityDetector,
    last_raw: Option<String>,
    ever_transmitted: bool,
}

/// The relay's session owner.
pub struct Router {
    config: RelayConfig,
    observer: Arc<dyn Observer>,
    link: LinkHandle,
    sink: Arc<dyn DisplaySink>,
    metrics: Arc<MetricsRecorder>,

    sessions: HashMap<SessionId, Session>,
    dedup: DedupTable,
    connection: ConnectionState,
    last_reply: Option<EngineReply>,
    rounds_tx: mpsc::UnboundedSender<RoundReport>,
}

impl Router {
    pub fn spawn(
        config: RelayConfig,
        observer: Arc<dyn Observer>,
        link: LinkHandle,
        sink: Arc<dyn DisplaySink>,
        metrics: Arc<MetricsRecorder>,
    ) -> RelayHandle {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (rounds_tx, rounds_rx) = mpsc::unbounded_channel();
        let link_events = link.subscribe();

        let router = Self {
            config,
            observer,
            connection: link.status().reported(),
            link,
            sink,
            metrics,
            sessions: HashMap::new(),
            dedup: DedupTable::new(),
            last_reply: None,
            rounds_tx,
        };
        let _task = tokio::spawn(router.run(cmd_rx, rounds_rx, link_events));
        RelayHandle { cmd_tx }
    }

    async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<RelayCommand>,
        mut rounds_rx: mpsc::UnboundedReceiver<RoundReport>,
        mut link_events: broadcast::Receiver<LinkEvent>,
    ) {
        let mut link_open = true;
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(RelayCommand::Shutdown) | None => break,
                    Some(cmd) => self.on_command(cmd),
                },
                Some(report) = rounds_rx.recv() => self.on_round(report),
                event = link_events.recv(), if link_open => match event {
                    Ok(event) => self.on_link_event(event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "router fell behind on link events");
                    }
                    Err(RecvError::Closed) => {
                        warn!("engine link stopped");
                        link_open = false;
                    }
                },
            }
        }

        for session in self.sessions.values_mut() {
            session.detector.clear_timers();
        }
        debug!(sessions = self.sessions.len(), "router stopped");
    }

    fn on_command(&mut self, cmd: RelayCommand) {
        match cmd {
            RelayCommand::Report { session_id, raw } => self.report(session_id, raw),
            RelayCommand::Started(session_id) => self.session_started(session_id),
            RelayCommand::Ended(session_id) => self.session_ended(&session_id),
            RelayCommand::RestartDetector(session_id) => {
                if let Some(session) = self.sessions.get_mut(&session_id) {
                    session.detector.restart();
                    debug!(session_id = %session_id, "detector restarted");
                }
            }
            RelayCommand::Status { session_id, reply } => {
                let _ = reply.send(self.status(&session_id));
            }
            RelayCommand::Sessions(reply) => {
                let mut ids: Vec<SessionId> = self.sessions.keys().cloned().collect();
                ids.sort();
                let _ = reply.send(ids);
            }
            RelayCommand::Shutdown => {}
        }
    }

    fn session_entry(&mut self, session_id: &SessionId) -> &mut Session {
        let config = self.config.stability;
        self.sessions.entry(session_id.clone()).or_insert_with(|| {
            info!(session_id = %session_id, "session created");
            Session {
                detector: StabilityDetector::new(session_id.clone(), config),
                last_raw: None,
                ever_transmitted: false,
            }
        })
    }

    fn report(&mut self, session_id: SessionId, raw: String) {
        let observer = Arc::clone(&self.observer);
        let rounds_tx = self.rounds_tx.clone();
        let session = self.session_entry(&session_id);
        let disposition = session.detector.report(&raw, observer, rounds_tx);
        session.last_raw = Some(raw);

        match disposition {
            Ok(ReportDisposition::Started) => {
                trace!(session_id = %session_id, "report started a sampling round");
            }
            Ok(ReportDisposition::Coalesced) => {
                self.metrics.counter_inc(names::REPORTS_COALESCED, &[], 1);
                trace!(session_id = %session_id, "report coalesced");
            }
            Err(e) => {
                self.metrics.counter_inc(names::REPORTS_MALFORMED, &[], 1);
                debug!(session_id = %session_id, error = %e, "dropping raw report");
            }
        }
    }

    fn session_started(&mut self, session_id: SessionId) {
        let _ = self.session_entry(&session_id);
        self.sink
            .connection_state(Some(&session_id), self.connection);
        self.link.connect();

        if !self.config.prime_on_start {
            return;
        }
        let observer = Arc::clone(&self.observer);
        let primed = self
            .sessions
            .get_mut(&session_id)
            .and_then(|session| session.detector.prime(observer.as_ref()));
        if let Some(position) = primed {
            debug!(session_id = %session_id, position = %position, "primed from observer");
            self.confirmed(&session_id, position, None);
        }
    }

    fn session_ended(&mut self, session_id: &SessionId) {
        let Some(mut session) = self.sessions.remove(session_id) else {
            return;
        };
        session.detector.clear_timers();
        self.dedup.forget(session_id);
        self.link.forget(session_id);
        info!(session_id = %session_id, "session ended");
    }

    fn on_round(&mut self, report: RoundReport) {
        let Some(session) = self.sessions.get_mut(&report.session_id) else {
            trace!(session_id = %report.session_id, "round report for ended session");
            return;
        };
        let confirmed = session.detector.complete(&report);

        match (&report.outcome, confirmed) {
            (RoundOutcome::Confirmed { elapsed, .. }, Some(position)) => {
                self.confirmed(&report.session_id, position, Some(*elapsed));
            }
            (RoundOutcome::Abandoned(reason), _) => {
                self.metrics
                    .counter_inc(names::ROUNDS_ABANDONED, &[("reason", reason.as_str())], 1);
                debug!(
                    session_id = %report.session_id,
                    reason = reason.as_str(),
                    "sampling round abandoned"
                );
            }
            _ => {}
        }
    }

    fn confirmed(&mut self, session_id: &SessionId, position: Position, latency: Option<Duration>) {
        self.metrics.counter_inc(names::POSITIONS_CONFIRMED, &[], 1);
        if let Some(latency) = latency {
            self.metrics.histogram_observe(
                names::CONFIRM_LATENCY_MS,
                &[],
                latency.as_millis() as f64,
            );
        }

        let outcome = self.dedup.note_and_check(session_id, &position);
        info!(
            session_id = %session_id,
            position = %position,
            is_duplicate = outcome.is_duplicate,
            "position confirmed"
        );
        self.sink
            .position_confirmed(session_id, &position, outcome.is_duplicate);

        if outcome.is_duplicate {
            self.metrics.counter_inc(names::POSITIONS_DUPLICATE, &[], 1);
            return;
        }
        if let Some(session) = self.sessions.get_mut(session_id) {
            session.ever_transmitted = true;
        }
        self.link.submit(OutboundRequest::new(
            session_id.clone(),
            position,
            self.config.search_depth,
        ));
    }

    fn on_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::StatusChanged(status) => {
                let reported = status.reported();
                if reported != self.connection {
                    self.connection = reported;
                    self.sink.connection_state(None, reported);
                }
            }
            LinkEvent::RequestSent { session_id, .. } => {
                if self.sessions.contains_key(&session_id) {
                    self.sink.request_sent(&session_id);
                }
            }
            LinkEvent::Reply { session_id, reply } => {
                match session_id {
                    Some(session_id) if self.sessions.contains_key(&session_id) => {
                        self.sink.engine_reply(&session_id, &reply);
                    }
                    Some(session_id) => {
                        debug!(session_id = %session_id, "reply for ended session dropped");
                    }
                    None => {
                        for session_id in self.sessions.keys() {
                            self.sink.engine_reply(session_id, &reply);
                        }
                    }
                }
                self.last_reply = Some(reply);
            }
        }
    }

    fn status(&self, session_id: &SessionId) -> Option<SessionStatus> {
        let session = self.sessions.get(session_id)?;
        Some(SessionStatus {
            session_id: session_id.clone(),
            phase: session.detector.phase().as_str(),
            last_raw: session.last_raw.clone(),
            last_confirmed: session.detector.last_confirmed().cloned(),
            connection: self.link.status().reported(),
            show_status: session.ever_transmitted,
            in_flight: self.link.is_in_flight(session_id),
            last_engine_reply: self.last_reply.clone(),
        })
    }
}
