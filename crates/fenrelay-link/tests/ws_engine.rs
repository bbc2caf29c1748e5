//! Connection manager against a real WebSocket engine stub.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use fenrelay_core::{normalize, ConnectionState, OutboundRequest, SessionId};
use fenrelay_link::{ConnectionManager, LinkConfig, LinkEvent, LinkHandle, WsConnector};
use fenrelay_telemetry::MetricsRecorder;
use serde_json::{json, Value};
use tokio::sync::broadcast;

#[derive(Clone)]
struct StubState {
    connections: Arc<AtomicUsize>,
    /// Hang up after answering this many requests on the first connection.
    first_connection_budget: usize,
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<StubState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_engine(socket, state))
}

/// Answers every analyze request with a fixed best move, echoing the
/// position back under the older `fen` field name.
async fn serve_engine(mut socket: WebSocket, state: StubState) {
    let nth = state.connections.fetch_add(1, Ordering::SeqCst);
    let mut answered = 0;
    while let Some(Ok(msg)) = socket.recv().await {
        let Message::Text(text) = msg else { continue };
        let Ok(request): Result<Value, _> = serde_json::from_str(text.as_str()) else {
            continue;
        };
        let reply = json!({
            "bestmove": "e7e5",
            "score": {"cp": -12},
            "pv": ["e7e5", "g1f3"],
            "fen": request["position"],
        });
        if socket
            .send(Message::Text(reply.to_string().into()))
            .await
            .is_err()
        {
            return;
        }
        answered += 1;
        if nth == 0 && answered >= state.first_connection_budget {
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    }
}

async fn start_stub(first_connection_budget: usize) -> (String, Arc<AtomicUsize>) {
    let connections = Arc::new(AtomicUsize::new(0));
    let state = StubState {
        connections: Arc::clone(&connections),
        first_connection_budget,
    };
    let router = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let _server = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    (format!("ws://127.0.0.1:{port}/ws"), connections)
}

fn spawn_link(url: String) -> LinkHandle {
    let config = LinkConfig {
        url,
        reconnect_delay: Duration::from_millis(50),
        in_flight_window: Duration::from_millis(1200),
    };
    ConnectionManager::spawn(
        config,
        Arc::new(WsConnector::default()),
        Arc::new(MetricsRecorder::new()),
    )
}

fn request(session: &str, fen: &str) -> OutboundRequest {
    OutboundRequest::new(SessionId::from_raw(session), normalize(fen).unwrap(), 12)
}

async fn next_reply(
    events: &mut broadcast::Receiver<LinkEvent>,
) -> (Option<SessionId>, fenrelay_core::EngineReply) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let LinkEvent::Reply { session_id, reply } = events.recv().await.unwrap() {
                return (session_id, reply);
            }
        }
    })
    .await
    .expect("no reply within 5s")
}

#[tokio::test]
async fn request_round_trip_over_websocket() {
    let (url, _) = start_stub(usize::MAX).await;
    let link = spawn_link(url);
    let mut events = link.subscribe();

    let fen = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b";
    link.submit(request("tab-1", fen));

    let (session_id, reply) = next_reply(&mut events).await;
    assert_eq!(session_id, Some(SessionId::from_raw("tab-1")));
    assert!(reply.success);
    assert_eq!(reply.best_move.as_deref(), Some("e7e5"));
    assert_eq!(reply.pv, vec!["e7e5", "g1f3"]);
    assert_eq!(
        reply.position.as_deref(),
        Some(normalize(fen).unwrap().as_fen())
    );
    assert_eq!(link.status().state, ConnectionState::Connected);
}

#[tokio::test]
async fn engine_hangup_reconnects_and_keeps_serving() {
    let (url, connections) = start_stub(1).await;
    let link = spawn_link(url);
    let mut events = link.subscribe();

    link.submit(request("tab-1", "8/8/8/4k3/8/8/8/4K3 w"));
    let (first, _) = next_reply(&mut events).await;
    assert_eq!(first, Some(SessionId::from_raw("tab-1")));

    // Wait for the stub's hang-up to be noticed and repaired.
    let mut status = link.watch_status();
    tokio::time::timeout(Duration::from_secs(5), async {
        while connections.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let _ = status
            .wait_for(|s| s.state == ConnectionState::Connected)
            .await;
    })
    .await
    .expect("link did not reconnect");

    link.submit(request("tab-2", "8/8/8/4k3/8/8/8/4K3 b"));
    let (second, _) = next_reply(&mut events).await;
    assert_eq!(second, Some(SessionId::from_raw("tab-2")));
    assert_eq!(connections.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unreachable_engine_keeps_requests_queued() {
    // Bind then drop to get a port nobody listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let link = spawn_link(format!("ws://127.0.0.1:{port}/ws"));
    link.submit(request("tab-1", "8/8/8/4k3/8/8/8/4K3 w"));
    link.submit(request("tab-1", "8/8/8/4k3/8/8/8/4K3 b"));

    let mut status = link.watch_status();
    tokio::time::timeout(Duration::from_secs(5), status.wait_for(|s| s.reconnect_pending))
        .await
        .expect("no reconnect scheduled")
        .unwrap();
    assert_eq!(link.queue_len().await, 2);
    assert_eq!(link.status().reported(), ConnectionState::Connecting);
}
