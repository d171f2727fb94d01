//! Playback sink: the boundary over audio output.
//!
//! A sink accepts one synthesized payload at a time and reports its
//! lifecycle back over a channel. The narration scheduler listens for
//! `Progress` ticks to time prefetching and for `Ended` to advance.

pub mod rodio;

use crate::tts::AudioPayload;
use anyhow::Result;
use tokio::sync::mpsc;

/// Events emitted while a payload plays.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// Audio output began.
    Started,
    /// Elapsed fraction of the payload's duration, in `0.0..=1.0`.
    Progress(f32),
    /// The payload played to completion.
    Ended,
    /// Decode or device failure; the payload cannot continue.
    Error(String),
}

/// Control surface for an in-flight playback.
pub trait PlaybackControl: Send + Sync {
    fn pause(&self);
    fn resume(&self);
    fn stop(&self);
}

/// Handle to one playing payload: its event stream plus controls.
pub struct PlaybackHandle {
    events: mpsc::UnboundedReceiver<PlaybackEvent>,
    control: Box<dyn PlaybackControl>,
}

impl PlaybackHandle {
    pub fn new(
        events: mpsc::UnboundedReceiver<PlaybackEvent>,
        control: Box<dyn PlaybackControl>,
    ) -> Self {
        Self { events, control }
    }

    /// Next playback event; `None` once the stream is closed.
    pub async fn next_event(&mut self) -> Option<PlaybackEvent> {
        self.events.recv().await
    }

    pub fn pause(&self) {
        self.control.pause();
    }

    pub fn resume(&self) {
        self.control.resume();
    }

    pub fn stop(&self) {
        self.control.stop();
    }
}

/// Audio output boundary. `play` hands off a payload and returns
/// immediately; completion is reported through the handle's events.
pub trait PlaybackSink: Send + Sync {
    fn play(&self, payload: AudioPayload) -> Result<PlaybackHandle>;
}
