//! Narration session: the state machine behind continuous playback.
//!
//! The session owns everything that was ambient state in a typical
//! player: current segment, prefetch slot, and run lifecycle. It is
//! purely synchronous — the async scheduler drives it — which keeps
//! every transition testable without audio or a real engine.

use super::NarrationEvent;
use crate::text::{position, segmenter, Segment, TextBlock};
use crate::tts::AudioPayload;
use tokio::sync::mpsc;

/// Lifecycle of one narration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No run started yet.
    Idle,
    /// A segment is playing (or being synthesized).
    Active,
    /// Playback suspended; segment and prefetch state retained.
    Paused,
    /// Terminal for this run; a new `start` begins a fresh run.
    Stopped,
}

/// Audio synthesized ahead of playback, keyed by its starting block.
#[derive(Debug)]
struct PrefetchSlot {
    start_block: usize,
    audio: AudioPayload,
}

/// Outcome of advancing past a finished segment.
#[derive(Debug)]
pub enum Advance {
    /// Play this segment next; `audio` is present when a matching
    /// prefetch was consumed.
    Segment {
        segment: Segment,
        audio: Option<AudioPayload>,
    },
    /// The document is exhausted; the session has stopped.
    Finished,
}

pub struct NarrationSession {
    blocks: Vec<TextBlock>,
    budget: usize,
    state: SessionState,
    /// Offset the current run began at; persisted as the resume
    /// position when the run stops.
    start_offset: usize,
    /// Segment currently playing.
    segment: Option<Segment>,
    /// At most one prefetched result at any time.
    prefetch: Option<PrefetchSlot>,
    /// A prefetch synthesis is in flight.
    prefetch_inflight: bool,
    /// Bumped on every start and stop; results tagged with an older
    /// epoch are stale and must be dropped.
    epoch: u64,
    events: mpsc::UnboundedSender<NarrationEvent>,
}

impl NarrationSession {
    pub fn new(
        blocks: Vec<TextBlock>,
        budget: usize,
        events: mpsc::UnboundedSender<NarrationEvent>,
    ) -> Self {
        Self {
            blocks,
            budget,
            state: SessionState::Idle,
            start_offset: 0,
            segment: None,
            prefetch: None,
            prefetch_inflight: false,
            epoch: 0,
            events,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Epoch guarding async results; see [`store_prefetch`].
    ///
    /// [`store_prefetch`]: NarrationSession::store_prefetch
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn start_offset(&self) -> usize {
        self.start_offset
    }

    pub fn current_segment(&self) -> Option<&Segment> {
        self.segment.as_ref()
    }

    /// Begin a run at `offset`. An active or paused run is stopped
    /// first (persisting its position through the `Stopped` event).
    /// Returns the first segment to synthesize, or `None` when the
    /// document has nothing speakable from that offset — in which case
    /// the session stops immediately.
    pub fn start(&mut self, offset: usize) -> Option<Segment> {
        if matches!(self.state, SessionState::Active | SessionState::Paused) {
            self.stop();
        }

        self.epoch += 1;
        self.start_offset = offset;
        self.prefetch = None;
        self.prefetch_inflight = false;

        let start_block = position::find_starting_block(&self.blocks, offset);
        match segmenter::segment_from(&self.blocks, start_block, self.budget) {
            Some(segment) => {
                self.state = SessionState::Active;
                self.begin_segment(segment.clone());
                Some(segment)
            }
            None => {
                self.state = SessionState::Active;
                self.stop();
                None
            }
        }
    }

    /// The playing segment finished; move to the next one.
    ///
    /// Consumes the prefetch slot only when its start block matches the
    /// expected next block; anything else is stale and discarded.
    pub fn advance(&mut self) -> Advance {
        if self.state != SessionState::Active {
            return Advance::Finished;
        }

        let next_start = match &self.segment {
            Some(segment) => segment.end_block + 1,
            None => {
                self.stop();
                return Advance::Finished;
            }
        };

        let Some(segment) = segmenter::segment_from(&self.blocks, next_start, self.budget) else {
            // Natural end of the document.
            self.stop();
            return Advance::Finished;
        };

        let audio = self.take_prefetch(next_start);
        self.begin_segment(segment.clone());
        Advance::Segment { segment, audio }
    }

    /// The next segment to prefetch, if the trigger conditions hold:
    /// session active, no prefetch stored or in flight, and a next
    /// segment exists. Marks the prefetch in flight and returns the
    /// epoch the result must carry to be accepted.
    pub fn prefetch_target(&mut self) -> Option<(u64, Segment)> {
        if self.state != SessionState::Active || self.prefetch.is_some() || self.prefetch_inflight
        {
            return None;
        }
        let current = self.segment.as_ref()?;
        let next = segmenter::segment_from(&self.blocks, current.end_block + 1, self.budget)?;
        self.prefetch_inflight = true;
        Some((self.epoch, next))
    }

    /// Store a completed prefetch. Results from an older epoch (the
    /// run was stopped or restarted meanwhile) are dropped unseen.
    pub fn store_prefetch(&mut self, epoch: u64, segment: &Segment, audio: AudioPayload) {
        if epoch != self.epoch
            || !matches!(self.state, SessionState::Active | SessionState::Paused)
        {
            log::debug!(
                "dropping stale prefetch for block {} (epoch {} != {})",
                segment.start_block,
                epoch,
                self.epoch
            );
            return;
        }
        self.prefetch_inflight = false;
        self.prefetch = Some(PrefetchSlot {
            start_block: segment.start_block,
            audio,
        });
    }

    /// A prefetch failed; clear the in-flight flag so the next advance
    /// synthesizes normally. Best effort — no error surfaces.
    pub fn prefetch_failed(&mut self, epoch: u64) {
        if epoch == self.epoch {
            self.prefetch_inflight = false;
        }
    }

    /// Suspend playback. Only valid from `Active`; segment and
    /// prefetch state are retained.
    pub fn pause(&mut self) -> bool {
        if self.state == SessionState::Active {
            self.state = SessionState::Paused;
            true
        } else {
            false
        }
    }

    /// Resume from `Paused`.
    pub fn resume(&mut self) -> bool {
        if self.state == SessionState::Paused {
            self.state = SessionState::Active;
            true
        } else {
            false
        }
    }

    /// End the run: discard the prefetch slot, clear segment marking,
    /// and report the run's start offset for persistence. Idempotent —
    /// calls past the first return `None` and emit nothing.
    pub fn stop(&mut self) -> Option<usize> {
        match self.state {
            SessionState::Idle | SessionState::Stopped => None,
            SessionState::Active | SessionState::Paused => {
                self.state = SessionState::Stopped;
                self.epoch += 1;
                self.segment = None;
                self.prefetch = None;
                self.prefetch_inflight = false;
                let _ = self.events.send(NarrationEvent::Stopped {
                    position: self.start_offset,
                });
                Some(self.start_offset)
            }
        }
    }

    /// Surface a failure and stop, preserving the run's position.
    pub fn fail(&mut self, message: impl Into<String>) -> Option<usize> {
        let _ = self.events.send(NarrationEvent::Error(message.into()));
        self.stop()
    }

    fn begin_segment(&mut self, segment: Segment) {
        let _ = self.events.send(NarrationEvent::SegmentStarted {
            start_block: segment.start_block,
            end_block: segment.end_block,
        });
        self.segment = Some(segment);
    }

    fn take_prefetch(&mut self, expected_start: usize) -> Option<AudioPayload> {
        match self.prefetch.take() {
            Some(slot) if slot.start_block == expected_start => Some(slot.audio),
            Some(slot) => {
                log::debug!(
                    "discarding prefetch for block {}, expected {}",
                    slot.start_block,
                    expected_start
                );
                None
            }
            None => None,
        }
    }
}
