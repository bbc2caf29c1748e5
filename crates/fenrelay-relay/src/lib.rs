//! Session routing between the observer, the engine link and the display.
//!
//! [`Router`] owns every session: it feeds raw reports to the session's
//! stability detector, checks confirmed positions against the
//! [`DedupTable`], submits novel ones to the engine link and delivers
//! replies to the [`DisplaySink`].

pub mod dedup;
pub mod router;
pub mod sink;
pub mod status;

pub use dedup::{DedupOutcome, DedupTable};
pub use router::{RelayConfig, RelayHandle, Router};
pub use sink::{ChannelSink, DisplaySink};
pub use status::SessionStatus;
