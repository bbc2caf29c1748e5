//! In-memory engine transport for tests and harnesses.
//!
//! [`mock_engine`] returns a [`MockConnector`] to hand to the
//! [`ConnectionManager`](crate::ConnectionManager) and a [`MockEngine`]
//! that plays the server side: it accepts connections, sees every frame
//! sent and can reply, fail sends or hang up.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;

use crate::errors::LinkError;
use crate::transport::{Connector, EngineConnection, FrameSink};

struct Shared {
    refuse: AtomicBool,
    attempts: AtomicUsize,
    /// 1-based send to fail on the next accepted connection; 0 for none.
    fail_nth_send: AtomicUsize,
    accepted: mpsc::UnboundedSender<MockLink>,
}

/// Client side of the mock transport.
#[derive(Clone)]
pub struct MockConnector {
    shared: Arc<Shared>,
}

/// Server side of the mock transport.
pub struct MockEngine {
    shared: Arc<Shared>,
    accepted: mpsc::UnboundedReceiver<MockLink>,
}

/// One accepted connection, seen from the engine.
///
/// Dropping it hangs up: the client's frame stream ends and its next send
/// fails.
pub struct MockLink {
    sent: mpsc::UnboundedReceiver<String>,
    replies: mpsc::UnboundedSender<String>,
    fail_sends: Arc<AtomicBool>,
}

pub fn mock_engine() -> (MockConnector, MockEngine) {
    let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
    let shared = Arc::new(Shared {
        refuse: AtomicBool::new(false),
        attempts: AtomicUsize::new(0),
        fail_nth_send: AtomicUsize::new(0),
        accepted: accepted_tx,
    });
    (
        MockConnector {
            shared: Arc::clone(&shared),
        },
        MockEngine {
            shared,
            accepted: accepted_rx,
        },
    )
}

impl MockEngine {
    /// Refuse (or accept again) new connection attempts.
    pub fn refuse_connections(&self, refuse: bool) {
        self.shared.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Connection attempts seen so far, refused ones included.
    pub fn attempts(&self) -> usize {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// Make the `n`th send on the next accepted connection fail. The
    /// sends before it go through.
    pub fn fail_nth_send_on_next_connection(&self, n: usize) {
        self.shared.fail_nth_send.store(n, Ordering::SeqCst);
    }

    /// Wait for the next successful connection.
    pub async fn accept(&mut self) -> Option<MockLink> {
        self.accepted.recv().await
    }
}

impl MockLink {
    /// Next frame the client sent.
    pub async fn next_sent(&mut self) -> Option<String> {
        self.sent.recv().await
    }

    /// A frame already sent, without waiting.
    pub fn try_next_sent(&mut self) -> Option<String> {
        self.sent.try_recv().ok()
    }

    /// Push a text frame to the client.
    pub fn reply(&self, text: impl Into<String>) {
        let _ = self.replies.send(text.into());
    }

    /// Make every following client send fail.
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> Result<EngineConnection, LinkError> {
        let _ = self.shared.attempts.fetch_add(1, Ordering::SeqCst);
        if self.shared.refuse.load(Ordering::SeqCst) {
            return Err(LinkError::Connect {
                url: url.to_string(),
                reason: "refused by mock engine".into(),
            });
        }

        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel::<String>();
        let fail_sends = Arc::new(AtomicBool::new(false));
        let fail_at = self.shared.fail_nth_send.swap(0, Ordering::SeqCst);

        let link = MockLink {
            sent: sent_rx,
            replies: reply_tx,
            fail_sends: Arc::clone(&fail_sends),
        };
        self.shared
            .accepted
            .send(link)
            .map_err(|_| LinkError::Connect {
                url: url.to_string(),
                reason: "mock engine dropped".into(),
            })?;

        let frames = futures::stream::unfold(reply_rx, |mut rx| async move {
            rx.recv().await.map(|text| (Ok(text), rx))
        })
        .boxed();

        Ok(EngineConnection {
            sink: Box::new(MockSink {
                sent: sent_tx,
                fail_sends,
                fail_at,
                sends: 0,
            }),
            frames,
        })
    }
}

struct MockSink {
    sent: mpsc::UnboundedSender<String>,
    fail_sends: Arc<AtomicBool>,
    fail_at: usize,
    sends: usize,
}

#[async_trait]
impl FrameSink for MockSink {
    async fn send_text(&mut self, text: String) -> Result<(), LinkError> {
        self.sends += 1;
        if self.sends == self.fail_at || self.fail_sends.load(Ordering::SeqCst) {
            return Err(LinkError::Send("mock send failure".into()));
        }
        self.sent.send(text).map_err(|_| LinkError::Closed)
    }

    async fn close(&mut self) {}
}
