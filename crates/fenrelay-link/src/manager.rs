//! Connection & queue manager actor.
//!
//! All connection state lives in one task. Callers talk to it through a
//! cloneable [`LinkHandle`]; connect attempts and socket reads run in
//! helper tasks that report back tagged with the connection epoch, so
//! anything from a torn-down connection is ignored.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use fenrelay_core::{
    ConnectionState, EngineReply, LinkStatus, OutboundRequest, RequestId, SessionId,
};
use fenrelay_settings::EngineSettings;
use fenrelay_telemetry::{names, MetricsRecorder};
use futures::StreamExt;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, trace, warn};

use crate::errors::LinkError;
use crate::transport::{Connector, EngineConnection, FrameSink, FrameStream};

const EVENT_CAPACITY: usize = 256;

/// Connection manager settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkConfig {
    pub url: String,
    pub reconnect_delay: Duration,
    /// How long after a submit a session counts as awaiting an answer.
    pub in_flight_window: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self::from(&EngineSettings::default())
    }
}

impl From<&EngineSettings> for LinkConfig {
    fn from(settings: &EngineSettings) -> Self {
        Self {
            url: settings.url.clone(),
            reconnect_delay: settings.reconnect_delay(),
            in_flight_window: settings.in_flight_window(),
        }
    }
}

/// Notifications published by the manager.
#[derive(Clone, Debug)]
pub enum LinkEvent {
    /// Connection state or reconnect flag changed.
    StatusChanged(LinkStatus),
    /// A request went out on the wire.
    RequestSent {
        session_id: SessionId,
        request_id: RequestId,
    },
    /// A well-formed reply arrived. `session_id` is the session of the
    /// oldest unanswered request, or `None` when nothing was outstanding.
    Reply {
        session_id: Option<SessionId>,
        reply: EngineReply,
    },
}

enum LinkCommand {
    Submit(OutboundRequest),
    Connect,
    QueueLen(oneshot::Sender<usize>),
    Shutdown,
}

enum Inbound {
    Opened {
        epoch: u64,
        connection: EngineConnection,
    },
    ConnectFailed {
        epoch: u64,
        error: LinkError,
    },
    Frame {
        epoch: u64,
        text: String,
    },
    Lost {
        epoch: u64,
        error: LinkError,
    },
}

/// Cloneable handle to the connection manager task.
#[derive(Clone)]
pub struct LinkHandle {
    cmd_tx: mpsc::UnboundedSender<LinkCommand>,
    status_rx: watch::Receiver<LinkStatus>,
    events: broadcast::Sender<LinkEvent>,
    in_flight: Arc<DashMap<SessionId, Instant>>,
    in_flight_window: Duration,
}

impl LinkHandle {
    /// Hand a request to the manager. Sent now if connected, otherwise
    /// queued and a connection is started.
    pub fn submit(&self, request: OutboundRequest) {
        let _ = self
            .in_flight
            .insert(request.session_id().clone(), Instant::now());
        let _ = self.cmd_tx.send(LinkCommand::Submit(request));
    }

    /// Start connecting unless already connecting or connected.
    pub fn connect(&self) {
        let _ = self.cmd_tx.send(LinkCommand::Connect);
    }

    pub fn status(&self) -> LinkStatus {
        *self.status_rx.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<LinkStatus> {
        self.status_rx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.events.subscribe()
    }

    /// Whether the session submitted something within the in-flight window.
    pub fn is_in_flight(&self, session_id: &SessionId) -> bool {
        self.in_flight
            .get(session_id)
            .is_some_and(|at| at.elapsed() < self.in_flight_window)
    }

    /// Drop the session's in-flight marker.
    pub fn forget(&self, session_id: &SessionId) {
        let _ = self.in_flight.remove(session_id);
    }

    /// Requests waiting for a connection. `0` once the manager has stopped.
    pub async fn queue_len(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(LinkCommand::QueueLen(tx)).is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Close the socket and stop the manager task.
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(LinkCommand::Shutdown);
    }
}

/// Owner of the engine connection.
pub struct ConnectionManager {
    config: LinkConfig,
    connector: Arc<dyn Connector>,
    metrics: Arc<MetricsRecorder>,

    state: ConnectionState,
    epoch: u64,
    sink: Option<Box<dyn FrameSink>>,
    reader: Option<JoinHandle<()>>,
    reconnect_at: Option<Instant>,
    queue: VecDeque<OutboundRequest>,
    /// Sessions of sent, unanswered requests, oldest first.
    awaiting: VecDeque<SessionId>,

    inbound_tx: mpsc::UnboundedSender<Inbound>,
    status_tx: watch::Sender<LinkStatus>,
    events: broadcast::Sender<LinkEvent>,
}

impl ConnectionManager {
    /// Spawn the manager task. No connection is made until the first
    /// submit or [`LinkHandle::connect`].
    pub fn spawn(
        config: LinkConfig,
        connector: Arc<dyn Connector>,
        metrics: Arc<MetricsRecorder>,
    ) -> LinkHandle {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(LinkStatus::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let handle = LinkHandle {
            cmd_tx,
            status_rx,
            events: events.clone(),
            in_flight: Arc::new(DashMap::new()),
            in_flight_window: config.in_flight_window,
        };

        let manager = Self {
            config,
            connector,
            metrics,
            state: ConnectionState::Disconnected,
            epoch: 0,
            sink: None,
            reader: None,
            reconnect_at: None,
            queue: VecDeque::new(),
            awaiting: VecDeque::new(),
            inbound_tx,
            status_tx,
            events,
        };
        let _task = tokio::spawn(manager.run(cmd_rx, inbound_rx));
        handle
    }

    async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<LinkCommand>,
        mut inbound_rx: mpsc::UnboundedReceiver<Inbound>,
    ) {
        loop {
            let reconnect_at = self.reconnect_at;
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(LinkCommand::Submit(request)) => self.submit(request).await,
                    Some(LinkCommand::Connect) => self.connect(),
                    Some(LinkCommand::QueueLen(reply)) => {
                        let _ = reply.send(self.queue.len());
                    }
                    Some(LinkCommand::Shutdown) | None => break,
                },
                Some(inbound) = inbound_rx.recv() => self.on_inbound(inbound).await,
                () = wait_until(reconnect_at) => {
                    self.reconnect_at = None;
                    self.publish_status();
                    debug!(state = %self.state, "reconnect timer fired");
                    self.connect();
                }
            }
        }

        self.close_connection().await;
        debug!(queue_len = self.queue.len(), "connection manager stopped");
    }

    async fn submit(&mut self, request: OutboundRequest) {
        if self.state == ConnectionState::Connected {
            match self.send_request(&request).await {
                Ok(()) => return,
                Err(e) => {
                    warn!(
                        session_id = %request.session_id(),
                        error = %e,
                        "send failed, requeueing"
                    );
                    self.connection_lost(e).await;
                }
            }
        }
        self.enqueue(request);
        self.connect();
    }

    fn enqueue(&mut self, request: OutboundRequest) {
        debug!(
            session_id = %request.session_id(),
            request_id = %request.id(),
            queue_len = self.queue.len() + 1,
            "request queued"
        );
        self.queue.push_back(request);
        self.metrics.counter_inc(names::REQUESTS_QUEUED, &[], 1);
        self.record_queue_depth();
    }

    fn connect(&mut self) {
        if self.state != ConnectionState::Disconnected {
            trace!(state = %self.state, "connect ignored");
            return;
        }

        self.epoch += 1;
        let epoch = self.epoch;
        self.state = ConnectionState::Connecting;
        self.publish_status();
        self.metrics.counter_inc(names::CONNECT_ATTEMPTS, &[], 1);
        debug!(url = %self.config.url, epoch, "connecting to engine");

        let connector = Arc::clone(&self.connector);
        let url = self.config.url.clone();
        let inbound = self.inbound_tx.clone();
        let _attempt = tokio::spawn(async move {
            let msg = match connector.connect(&url).await {
                Ok(connection) => Inbound::Opened { epoch, connection },
                Err(error) => Inbound::ConnectFailed { epoch, error },
            };
            let _ = inbound.send(msg);
        });
    }

    async fn on_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Opened { epoch, connection } => {
                if epoch != self.epoch || self.state != ConnectionState::Connecting {
                    let mut sink = connection.sink;
                    sink.close().await;
                    return;
                }
                self.opened(connection).await;
            }
            Inbound::ConnectFailed { epoch, error } => {
                if epoch != self.epoch {
                    return;
                }
                warn!(error = %error, kind = error.error_kind(), "engine connect failed");
                self.state = ConnectionState::Disconnected;
                self.schedule_reconnect();
                self.publish_status();
            }
            Inbound::Frame { epoch, text } => {
                if epoch == self.epoch {
                    self.on_frame(&text);
                }
            }
            Inbound::Lost { epoch, error } => {
                if epoch == self.epoch && self.state == ConnectionState::Connected {
                    warn!(error = %error, kind = error.error_kind(), "engine connection lost");
                    self.connection_lost(error).await;
                }
            }
        }
    }

    async fn opened(&mut self, connection: EngineConnection) {
        let EngineConnection { sink, frames } = connection;
        self.sink = Some(sink);
        self.reader = Some(tokio::spawn(read_frames(
            self.epoch,
            frames,
            self.inbound_tx.clone(),
        )));
        self.state = ConnectionState::Connected;
        self.reconnect_at = None;
        self.publish_status();
        info!(url = %self.config.url, queued = self.queue.len(), "engine connected");
        self.flush().await;
    }

    /// Send queued requests oldest first. A failed send leaves it and
    /// everything behind it queued.
    async fn flush(&mut self) {
        while let Some(request) = self.queue.pop_front() {
            if let Err(e) = self.send_request(&request).await {
                warn!(
                    session_id = %request.session_id(),
                    error = %e,
                    remaining = self.queue.len() + 1,
                    "flush interrupted"
                );
                self.queue.push_front(request);
                self.connection_lost(e).await;
                break;
            }
        }
        self.record_queue_depth();
    }

    async fn send_request(&mut self, request: &OutboundRequest) -> Result<(), LinkError> {
        let text = match request.encode() {
            Ok(text) => text,
            Err(e) => {
                warn!(request_id = %request.id(), error = %e, "dropping unencodable request");
                return Ok(());
            }
        };
        let Some(sink) = self.sink.as_mut() else {
            return Err(LinkError::Closed);
        };
        sink.send_text(text).await?;

        self.awaiting.push_back(request.session_id().clone());
        self.metrics.counter_inc(names::REQUESTS_SENT, &[], 1);
        debug!(
            session_id = %request.session_id(),
            request_id = %request.id(),
            depth = request.search_depth(),
            "request sent"
        );
        let _ = self.events.send(LinkEvent::RequestSent {
            session_id: request.session_id().clone(),
            request_id: request.id().clone(),
        });
        Ok(())
    }

    fn on_frame(&mut self, text: &str) {
        let reply = match EngineReply::parse(text) {
            Ok(reply) => reply,
            Err(e) => {
                debug!(error = %e, "dropping malformed engine frame");
                self.metrics.counter_inc(names::REPLIES_MALFORMED, &[], 1);
                return;
            }
        };
        let session_id = self.awaiting.pop_front();
        self.metrics.counter_inc(names::REPLIES_RECEIVED, &[], 1);
        debug!(
            session_id = session_id.as_ref().map(SessionId::as_str),
            success = reply.success,
            best_move = reply.best_move.as_deref(),
            "engine reply"
        );
        let _ = self.events.send(LinkEvent::Reply { session_id, reply });
    }

    async fn connection_lost(&mut self, error: LinkError) {
        debug!(kind = error.error_kind(), "tearing down engine connection");
        self.close_connection().await;
        self.state = ConnectionState::Disconnected;
        self.schedule_reconnect();
        self.publish_status();
    }

    async fn close_connection(&mut self) {
        // Frames still in flight from the old reader carry a stale epoch.
        self.epoch += 1;
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(mut sink) = self.sink.take() {
            sink.close().await;
        }
        self.awaiting.clear();
    }

    fn schedule_reconnect(&mut self) {
        if self.reconnect_at.is_some() {
            trace!("reconnect already pending");
            return;
        }
        self.reconnect_at = Some(Instant::now() + self.config.reconnect_delay);
        self.metrics.counter_inc(names::RECONNECTS_SCHEDULED, &[], 1);
        debug!(
            delay_ms = self.config.reconnect_delay.as_millis() as u64,
            "reconnect scheduled"
        );
    }

    fn publish_status(&self) {
        let status = LinkStatus {
            state: self.state,
            reconnect_pending: self.reconnect_at.is_some(),
        };
        let changed = self.status_tx.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
        if changed {
            let _ = self.events.send(LinkEvent::StatusChanged(status));
        }
    }

    fn record_queue_depth(&self) {
        self.metrics
            .gauge_set(names::QUEUE_DEPTH, &[], self.queue.len() as f64);
    }
}

async fn wait_until(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn read_frames(
    epoch: u64,
    mut frames: FrameStream,
    inbound: mpsc::UnboundedSender<Inbound>,
) {
    let error = loop {
        match frames.next().await {
            Some(Ok(text)) => {
                if inbound.send(Inbound::Frame { epoch, text }).is_err() {
                    return;
                }
            }
            Some(Err(e)) => break e,
            None => break LinkError::Closed,
        }
    };
    let _ = inbound.send(Inbound::Lost { epoch, error });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{mock_engine, MockEngine};
    use fenrelay_core::normalize;
    use serde_json::Value;

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w";
    const E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b";
    const E5: &str = "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w";

    fn setup() -> (LinkHandle, MockEngine, Arc<MetricsRecorder>) {
        let (connector, engine) = mock_engine();
        let metrics = Arc::new(MetricsRecorder::new());
        let config = LinkConfig {
            url: "mock://engine".into(),
            ..LinkConfig::default()
        };
        let link = ConnectionManager::spawn(config, Arc::new(connector), Arc::clone(&metrics));
        (link, engine, metrics)
    }

    fn request(session: &str, fen: &str) -> OutboundRequest {
        OutboundRequest::new(SessionId::from_raw(session), normalize(fen).unwrap(), 16)
    }

    fn sent_position(frame: &str) -> String {
        let value: Value = serde_json::from_str(frame).unwrap();
        assert_eq!(value["kind"], "analyze");
        value["position"].as_str().unwrap().to_owned()
    }

    async fn wait_status(link: &LinkHandle, f: impl FnMut(&LinkStatus) -> bool) {
        let mut rx = link.watch_status();
        let _ = rx.wait_for(f).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn queued_requests_flush_in_order_after_reconnect() {
        let (link, mut engine, _metrics) = setup();
        engine.refuse_connections(true);

        link.submit(request("a", START));
        link.submit(request("b", E4));
        link.submit(request("a", E5));
        wait_status(&link, |s| s.reconnect_pending).await;
        assert_eq!(link.queue_len().await, 3);

        engine.refuse_connections(false);
        let mut conn = engine.accept().await.unwrap();

        let sent: Vec<String> = vec![
            sent_position(&conn.next_sent().await.unwrap()),
            sent_position(&conn.next_sent().await.unwrap()),
            sent_position(&conn.next_sent().await.unwrap()),
        ];
        assert_eq!(
            sent,
            vec![
                normalize(START).unwrap().as_fen().to_owned(),
                normalize(E4).unwrap().as_fen().to_owned(),
                normalize(E5).unwrap().as_fen().to_owned(),
            ]
        );
        assert_eq!(link.queue_len().await, 0);
        assert!(conn.try_next_sent().is_none());
        assert_eq!(link.status().state, ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn submits_before_first_connect_are_not_deduplicated() {
        let (link, mut engine, metrics) = setup();
        link.submit(request("a", START));
        link.submit(request("a", START));

        let mut conn = engine.accept().await.unwrap();
        assert!(conn.next_sent().await.is_some());
        assert!(conn.next_sent().await.is_some());
        assert_eq!(link.queue_len().await, 0);
        assert_eq!(metrics.counter_get(names::REQUESTS_SENT, &[]), 2);
        assert_eq!(engine.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_connect_keeps_one_reconnect_timer() {
        let (link, mut engine, metrics) = setup();
        engine.refuse_connections(true);

        for _ in 0..5 {
            link.connect();
        }
        wait_status(&link, |s| s.reconnect_pending).await;
        for _ in 0..5 {
            link.connect();
        }
        let _ = link.queue_len().await;

        assert_eq!(metrics.counter_get(names::RECONNECTS_SCHEDULED, &[]), 1);
        assert!(link.status().reconnect_pending);

        engine.refuse_connections(false);
        let started = Instant::now();
        let _conn = engine.accept().await.unwrap();
        assert!(started.elapsed() <= Duration::from_millis(1000));
        wait_status(&link, |s| s.state == ConnectionState::Connected).await;
        assert!(!link.status().reconnect_pending);
    }

    #[tokio::test(start_paused = true)]
    async fn engine_hangup_reconnects_after_fixed_delay() {
        let (link, mut engine, _metrics) = setup();
        link.connect();
        let conn = engine.accept().await.unwrap();
        wait_status(&link, |s| s.state == ConnectionState::Connected).await;

        let dropped_at = Instant::now();
        drop(conn);
        wait_status(&link, |s| s.reconnect_pending).await;
        assert_eq!(link.status().reported(), ConnectionState::Connecting);

        let _conn = engine.accept().await.unwrap();
        assert_eq!(dropped_at.elapsed(), Duration::from_millis(1000));
        assert_eq!(engine.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_send_requeues_and_reconnects() {
        let (link, mut engine, _metrics) = setup();
        link.connect();
        let first = engine.accept().await.unwrap();
        wait_status(&link, |s| s.state == ConnectionState::Connected).await;

        first.fail_sends(true);
        link.submit(request("a", E4));

        let mut second = engine.accept().await.unwrap();
        let frame = second.next_sent().await.unwrap();
        assert_eq!(sent_position(&frame), normalize(E4).unwrap().as_fen());
        assert_eq!(link.queue_len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn interrupted_flush_keeps_the_rest_queued() {
        let (link, mut engine, _metrics) = setup();
        engine.refuse_connections(true);

        link.submit(request("a", START));
        link.submit(request("b", E4));
        link.submit(request("a", E5));
        wait_status(&link, |s| s.reconnect_pending).await;

        engine.fail_nth_send_on_next_connection(2);
        engine.refuse_connections(false);
        let mut first = engine.accept().await.unwrap();

        // The failed send tears the connection down; nothing after it goes out.
        let frame = first.next_sent().await.unwrap();
        assert_eq!(sent_position(&frame), normalize(START).unwrap().as_fen());
        assert!(first.next_sent().await.is_none());
        assert_eq!(link.queue_len().await, 2);
        assert_eq!(link.status().state, ConnectionState::Disconnected);
        assert!(link.status().reconnect_pending);

        let lost_at = Instant::now();
        let mut second = engine.accept().await.unwrap();
        assert_eq!(lost_at.elapsed(), Duration::from_millis(1000));
        let sent = vec![
            sent_position(&second.next_sent().await.unwrap()),
            sent_position(&second.next_sent().await.unwrap()),
        ];
        assert_eq!(
            sent,
            vec![
                normalize(E4).unwrap().as_fen().to_owned(),
                normalize(E5).unwrap().as_fen().to_owned(),
            ]
        );
        assert_eq!(link.queue_len().await, 0);
        assert!(second.try_next_sent().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_replies_are_dropped() {
        let (link, mut engine, metrics) = setup();
        let mut events = link.subscribe();
        link.submit(request("a", START));
        let mut conn = engine.accept().await.unwrap();
        let _ = conn.next_sent().await.unwrap();

        conn.reply("not json");
        conn.reply("{}");
        conn.reply(r#"{"success":true,"bestMove":"e2e4","score":{"cp":31}}"#);

        let reply = loop {
            match events.recv().await.unwrap() {
                LinkEvent::Reply { session_id, reply } => break (session_id, reply),
                _ => continue,
            }
        };
        assert_eq!(reply.0, Some(SessionId::from_raw("a")));
        assert_eq!(reply.1.best_move.as_deref(), Some("e2e4"));
        assert_eq!(metrics.counter_get(names::REPLIES_MALFORMED, &[]), 2);
        assert_eq!(metrics.counter_get(names::REPLIES_RECEIVED, &[]), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn replies_are_attributed_oldest_first() {
        let (link, mut engine, _metrics) = setup();
        let mut events = link.subscribe();
        link.submit(request("a", START));
        link.submit(request("b", E4));
        let mut conn = engine.accept().await.unwrap();
        let _ = conn.next_sent().await.unwrap();
        let _ = conn.next_sent().await.unwrap();

        for _ in 0..3 {
            conn.reply(r#"{"bestmove":"e2e4"}"#);
        }

        let mut owners = Vec::new();
        while owners.len() < 3 {
            if let LinkEvent::Reply { session_id, .. } = events.recv().await.unwrap() {
                owners.push(session_id);
            }
        }
        assert_eq!(
            owners,
            vec![
                Some(SessionId::from_raw("a")),
                Some(SessionId::from_raw("b")),
                None
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_marker_expires() {
        let (link, _engine, _metrics) = setup();
        let session = SessionId::from_raw("a");
        assert!(!link.is_in_flight(&session));

        link.submit(request("a", START));
        assert!(link.is_in_flight(&session));

        tokio::time::advance(Duration::from_millis(1199)).await;
        assert!(link.is_in_flight(&session));
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(!link.is_in_flight(&session));

        link.submit(request("a", E4));
        link.forget(&session);
        assert!(!link.is_in_flight(&session));
    }

    #[tokio::test(start_paused = true)]
    async fn status_events_follow_the_connection() {
        let (link, mut engine, _metrics) = setup();
        let mut events = link.subscribe();
        link.connect();
        let _conn = engine.accept().await.unwrap();

        let mut states = Vec::new();
        while states.last() != Some(&ConnectionState::Connected) {
            if let LinkEvent::StatusChanged(status) = events.recv().await.unwrap() {
                states.push(status.state);
            }
        }
        assert_eq!(
            states,
            vec![ConnectionState::Connecting, ConnectionState::Connected]
        );
    }

    #[tokio::test]
    async fn shutdown_stops_the_manager() {
        let (link, _engine, _metrics) = setup();
        link.shutdown();
        assert_eq!(link.queue_len().await, 0);
    }
}
