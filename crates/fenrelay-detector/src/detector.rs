//! Per-session stability detection.
//!
//! A report never confirms anything on its own. It starts a sampling round:
//! wait the settle delay, read the observer, wait the confirm delay, read
//! again. The round confirms when both reads normalize to the same
//! placement and side to move and that pair differs from the last confirmed
//! one. Otherwise it re-arms until the deadline passes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fenrelay_core::{normalize, Position, PositionKey, RelayError, SessionId};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, trace};

use crate::config::StabilityConfig;
use crate::observer::Observer;

/// Where a session's detector is in its round.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DetectorPhase {
    #[default]
    Idle,
    Sampling,
    Confirming,
}

impl DetectorPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Sampling => "sampling",
            Self::Confirming => "confirming",
        }
    }
}

/// Why a round ended without confirming.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbandonReason {
    /// Reads never agreed on a new position before the deadline.
    Deadline,
    /// The observer had nothing to show.
    Unavailable,
}

impl AbandonReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deadline => "deadline",
            Self::Unavailable => "unavailable",
        }
    }
}

/// Result of one sampling round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoundOutcome {
    Confirmed { position: Position, elapsed: Duration },
    Abandoned(AbandonReason),
}

/// A finished round, as delivered to the owner of the detector.
#[derive(Clone, Debug)]
pub struct RoundReport {
    pub session_id: SessionId,
    pub generation: u64,
    pub outcome: RoundOutcome,
}

/// What happened to a raw report handed to [`StabilityDetector::report`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportDisposition {
    /// A new round was armed.
    Started,
    /// A round is already running; it will read the newer value itself.
    Coalesced,
}

type PhaseCell = Arc<Mutex<DetectorPhase>>;

/// Round generations are unique across every detector in the process, so a
/// report from a dropped detector never matches a successor for the same
/// session.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// Run one sampling round to completion.
///
/// Each pass sleeps the settle delay, reads, sleeps the confirm delay and
/// reads again. The triggering report only arms the round; acceptance looks
/// at the two live reads alone. A pass confirms when both reads share a
/// [`PositionKey`] that differs from `last_confirmed`. A pass that does not
/// confirm re-arms only while less than `max_wait` has passed since the
/// round began. A read that returns nothing, or nothing parseable, ends the
/// round.
pub async fn run_round(
    observer: &dyn Observer,
    session_id: &SessionId,
    config: &StabilityConfig,
    last_confirmed: Option<&PositionKey>,
    phase: &Mutex<DetectorPhase>,
) -> RoundOutcome {
    let started = Instant::now();

    loop {
        *phase.lock() = DetectorPhase::Sampling;
        sleep(config.settle_delay).await;
        let Some(settled) = read_sample(observer, session_id) else {
            return RoundOutcome::Abandoned(AbandonReason::Unavailable);
        };

        *phase.lock() = DetectorPhase::Confirming;
        sleep(config.confirm_delay).await;
        let Some(confirmed) = read_sample(observer, session_id) else {
            return RoundOutcome::Abandoned(AbandonReason::Unavailable);
        };

        let key = confirmed.key();
        let steady = settled.key() == key;
        let novel = last_confirmed != Some(&key);
        if steady && novel {
            return RoundOutcome::Confirmed {
                position: confirmed,
                elapsed: started.elapsed(),
            };
        }

        trace!(
            session_id = %session_id,
            steady,
            novel,
            "sampling pass did not confirm"
        );

        if started.elapsed() >= config.max_wait {
            return RoundOutcome::Abandoned(AbandonReason::Deadline);
        }
    }
}

fn read_sample(observer: &dyn Observer, session_id: &SessionId) -> Option<Position> {
    let raw = observer.read_current_position(session_id)?;
    match normalize(&raw) {
        Ok(position) => Some(position),
        Err(e) => {
            trace!(session_id = %session_id, error = %e, "unreadable sample");
            None
        }
    }
}

struct ActiveRound {
    generation: u64,
    task: JoinHandle<()>,
}

/// Stability detector for one session.
///
/// Rounds run as spawned tasks and report back over the channel given to
/// [`report`](Self::report). The owner feeds each [`RoundReport`] to
/// [`complete`](Self::complete), which ignores reports from rounds that
/// were cleared in the meantime.
pub struct StabilityDetector {
    session_id: SessionId,
    config: StabilityConfig,
    phase: PhaseCell,
    last_confirmed: Option<Position>,
    active: Option<ActiveRound>,
}

impl StabilityDetector {
    pub fn new(session_id: SessionId, config: StabilityConfig) -> Self {
        Self {
            session_id,
            config,
            phase: Arc::new(Mutex::new(DetectorPhase::Idle)),
            last_confirmed: None,
            active: None,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn phase(&self) -> DetectorPhase {
        if self.active.is_none() {
            return DetectorPhase::Idle;
        }
        *self.phase.lock()
    }

    pub fn last_confirmed(&self) -> Option<&Position> {
        self.last_confirmed.as_ref()
    }

    /// Handle a raw report from the host.
    ///
    /// Only an idle detector starts a round; while one is running the
    /// report is coalesced into it. Unparseable input is rejected and
    /// leaves the detector idle.
    pub fn report(
        &mut self,
        raw: &str,
        observer: Arc<dyn Observer>,
        outcomes: mpsc::UnboundedSender<RoundReport>,
    ) -> Result<ReportDisposition, RelayError> {
        if self.active.is_some() {
            return Ok(ReportDisposition::Coalesced);
        }
        // Malformed input never arms a round.
        normalize(raw)?;

        let generation = next_generation();
        let session_id = self.session_id.clone();
        let config = self.config;
        let last_key = self.last_confirmed.as_ref().map(Position::key);
        let phase = Arc::clone(&self.phase);
        *phase.lock() = DetectorPhase::Sampling;

        debug!(session_id = %session_id, generation, "sampling round armed");
        let task = tokio::spawn(async move {
            let outcome = run_round(
                observer.as_ref(),
                &session_id,
                &config,
                last_key.as_ref(),
                &phase,
            )
            .await;
            let _ = outcomes.send(RoundReport {
                session_id,
                generation,
                outcome,
            });
        });
        self.active = Some(ActiveRound { generation, task });
        Ok(ReportDisposition::Started)
    }

    /// Apply a finished round. Returns the newly confirmed position, if any.
    ///
    /// Reports from a round other than the current one are ignored.
    pub fn complete(&mut self, report: &RoundReport) -> Option<Position> {
        match &self.active {
            Some(active) if active.generation == report.generation => {}
            _ => {
                trace!(
                    session_id = %self.session_id,
                    generation = report.generation,
                    "stale round report ignored"
                );
                return None;
            }
        }
        self.active = None;
        *self.phase.lock() = DetectorPhase::Idle;

        match &report.outcome {
            RoundOutcome::Confirmed { position, .. } => {
                self.last_confirmed = Some(position.clone());
                Some(position.clone())
            }
            RoundOutcome::Abandoned(_) => None,
        }
    }

    /// Read the observer once and adopt its position as confirmed.
    ///
    /// Used when a session starts with a position already on screen.
    /// Returns `None` if a round is running, the observer has nothing, or
    /// the position is the one already confirmed.
    pub fn prime(&mut self, observer: &dyn Observer) -> Option<Position> {
        if self.active.is_some() {
            return None;
        }
        let position = read_sample(observer, &self.session_id)?;
        if self.last_confirmed.as_ref().map(Position::key) == Some(position.key()) {
            return None;
        }
        self.last_confirmed = Some(position.clone());
        Some(position)
    }

    /// Cancel any pending round. The last confirmed position is kept.
    pub fn clear_timers(&mut self) {
        if let Some(active) = self.active.take() {
            active.task.abort();
            debug!(
                session_id = %self.session_id,
                generation = active.generation,
                "sampling round cancelled"
            );
        }
        *self.phase.lock() = DetectorPhase::Idle;
    }

    /// Start over as if the host had just loaded: no pending round and no
    /// confirmed position.
    pub fn restart(&mut self) {
        self.clear_timers();
        self.last_confirmed = None;
    }
}

impl Drop for StabilityDetector {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.task.abort();
        }
    }
}
