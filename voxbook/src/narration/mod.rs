//! Narration pipeline: session state machine and async scheduler.

pub mod scheduler;
pub mod session;

pub use scheduler::{Command, NarrationScheduler};
pub use session::{Advance, NarrationSession, SessionState};

/// Default elapsed-playback fraction that triggers prefetch of the
/// next segment.
pub const DEFAULT_PREFETCH_THRESHOLD: f32 = 0.70;

/// Observations emitted by a narration session for the presentation
/// layer. The session never touches the display itself; whoever
/// renders the book consumes these to mark narrating blocks and react
/// to termination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarrationEvent {
    /// A segment began playing; all blocks in `start_block..=end_block`
    /// are now narrating. Replaces any previous marking in one step.
    SegmentStarted {
        start_block: usize,
        end_block: usize,
    },
    /// The session ended (stop, natural completion, or failure) and
    /// `position` is the offset to persist as the resume point.
    Stopped { position: usize },
    /// A synthesis or playback failure; always followed by `Stopped`.
    Error(String),
}
