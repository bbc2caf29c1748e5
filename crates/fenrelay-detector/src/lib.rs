//! Position stability detection.
//!
//! Raw reports from an [`Observer`] are only trusted once two live reads,
//! separated by a short confirm window, agree on placement and side to
//! move. See [`StabilityDetector`].

pub mod config;
pub mod detector;
pub mod mock;
pub mod observer;

pub use config::StabilityConfig;
pub use detector::{
    run_round, AbandonReason, DetectorPhase, ReportDisposition, RoundOutcome, RoundReport,
    StabilityDetector,
};
pub use observer::{LatestValueObserver, Observer};
