//! Async driver for the narration session.
//!
//! The scheduler is the only place where synthesis, playback, and user
//! intents meet: it runs a single select loop over the command channel,
//! the active playback's events, and prefetch completions, and applies
//! each to the session state machine. Completion order of the external
//! engine relative to stop/start is absorbed by the session's epoch
//! guard, so a late result is a no-op rather than a wrong-position
//! playback.

use super::session::{Advance, NarrationSession, SessionState};
use crate::playback::{PlaybackEvent, PlaybackHandle, PlaybackSink};
use crate::text::Segment;
use crate::tts::{AudioPayload, SynthesisEngine, SynthesisError, VoiceOptions};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;

/// User intents driving the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start (or restart) narration at a character offset.
    Play(usize),
    Pause,
    Resume,
    Stop,
}

/// Result of one background prefetch synthesis.
struct PrefetchOutcome {
    epoch: u64,
    segment: Segment,
    result: Result<AudioPayload, SynthesisError>,
}

pub struct NarrationScheduler {
    session: NarrationSession,
    engine: Arc<dyn SynthesisEngine>,
    sink: Arc<dyn PlaybackSink>,
    voice: VoiceOptions,
    /// Elapsed-playback fraction that triggers prefetch.
    prefetch_threshold: f32,
    /// Position a bare `Resume` falls back to when no run ever played.
    resume_position: usize,
}

impl NarrationScheduler {
    pub fn new(
        session: NarrationSession,
        engine: Arc<dyn SynthesisEngine>,
        sink: Arc<dyn PlaybackSink>,
        voice: VoiceOptions,
        prefetch_threshold: f32,
        resume_position: usize,
    ) -> Self {
        Self {
            session,
            engine,
            sink,
            voice,
            prefetch_threshold,
            resume_position,
        }
    }

    /// Drive the session until the command channel closes.
    ///
    /// The run loop owns at most one playback handle at a time; a
    /// playback that was stopped (rather than ending) never produces
    /// `Ended`, so the session cannot advance past a user stop.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) -> Result<()> {
        let (prefetch_tx, mut prefetch_rx) = mpsc::channel::<PrefetchOutcome>(1);
        let mut playback: Option<PlaybackHandle> = None;
        // The trigger fires once per segment regardless of whether the
        // prefetch itself succeeds.
        let mut prefetch_fired = false;
        // Set when a segment finishes while the session is paused; the
        // advance happens on the next Resume instead.
        let mut pending_advance = false;

        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(Command::Play(offset)) => {
                        self.halt_playback(&mut playback);
                        self.resume_position = offset;
                        pending_advance = false;
                        if let Some(segment) = self.session.start(offset) {
                            prefetch_fired = false;
                            playback = self.play_segment(&segment, None).await;
                        }
                    }
                    Some(Command::Pause) => {
                        if self.session.pause() {
                            if let Some(handle) = &playback {
                                handle.pause();
                            }
                        }
                    }
                    Some(Command::Resume) => {
                        if self.session.resume() {
                            if pending_advance {
                                pending_advance = false;
                                playback = self.advance_session(&mut prefetch_fired).await;
                            } else if let Some(handle) = &playback {
                                handle.resume();
                            }
                        } else if playback.is_none()
                            && matches!(
                                self.session.state(),
                                SessionState::Idle | SessionState::Stopped
                            )
                        {
                            // Nothing was ever playing: behave like a
                            // fresh start at the last known position.
                            if let Some(segment) = self.session.start(self.resume_position) {
                                prefetch_fired = false;
                                playback = self.play_segment(&segment, None).await;
                            }
                        }
                    }
                    Some(Command::Stop) => {
                        self.halt_playback(&mut playback);
                        pending_advance = false;
                        self.session.stop();
                    }
                    None => {
                        // Controller went away; end the run, persisting
                        // position through the session's Stopped event.
                        self.halt_playback(&mut playback);
                        self.session.stop();
                        break;
                    }
                },

                event = next_playback_event(&mut playback), if playback.is_some() => match event {
                    Some(PlaybackEvent::Started) => {
                        log::debug!("playback started");
                    }
                    Some(PlaybackEvent::Progress(fraction)) => {
                        if !prefetch_fired && fraction >= self.prefetch_threshold {
                            // Only latch when a prefetch actually started;
                            // a tick landing while the session is paused
                            // must not forfeit the segment's prefetch.
                            prefetch_fired = self.spawn_prefetch(&prefetch_tx);
                        }
                    }
                    Some(PlaybackEvent::Ended) => {
                        playback = None;
                        if self.session.state() == SessionState::Paused {
                            // The segment ran out in the tick window before
                            // the pause reached the playback thread; hold
                            // the advance until the user resumes.
                            pending_advance = true;
                        } else {
                            playback = self.advance_session(&mut prefetch_fired).await;
                        }
                    }
                    Some(PlaybackEvent::Error(message)) => {
                        playback = None;
                        self.session.fail(format!("audio playback error: {message}"));
                    }
                    None => {
                        // Event stream closed without Ended: treat as a
                        // sink failure.
                        playback = None;
                        self.session.fail("audio playback ended unexpectedly");
                    }
                },

                Some(outcome) = prefetch_rx.recv() => match outcome.result {
                    Ok(audio) => {
                        self.session.store_prefetch(outcome.epoch, &outcome.segment, audio);
                    }
                    Err(e) => {
                        // Best effort: the next advance synthesizes
                        // normally, at the cost of a latency gap.
                        log::debug!("prefetch for block {} failed: {e}", outcome.segment.start_block);
                        self.session.prefetch_failed(outcome.epoch);
                    }
                },
            }
        }

        Ok(())
    }

    /// Move past a finished segment: play the next one, or let the
    /// session stop at the natural end of the document.
    async fn advance_session(&mut self, prefetch_fired: &mut bool) -> Option<PlaybackHandle> {
        match self.session.advance() {
            Advance::Segment { segment, audio } => {
                *prefetch_fired = false;
                self.play_segment(&segment, audio).await
            }
            Advance::Finished => {
                log::info!("narration reached end of document");
                None
            }
        }
    }

    /// Synthesize (unless prefetched) and hand the segment to the sink.
    /// Any failure stops the session with the position preserved; no
    /// automatic retry — engine failures here are missing-dependency
    /// class, not transient.
    async fn play_segment(
        &mut self,
        segment: &Segment,
        prefetched: Option<AudioPayload>,
    ) -> Option<PlaybackHandle> {
        let audio = match prefetched {
            Some(audio) => {
                log::debug!("consuming prefetched audio for block {}", segment.start_block);
                audio
            }
            None => match self.engine.synthesize(&segment.text, &self.voice).await {
                Ok(audio) => audio,
                Err(e) => {
                    self.session.fail(e.to_string());
                    return None;
                }
            },
        };

        match self.sink.play(audio) {
            Ok(handle) => Some(handle),
            Err(e) => {
                self.session.fail(format!("audio playback error: {e}"));
                None
            }
        }
    }

    /// Kick off background synthesis of the next segment, if the
    /// session allows one. Returns whether a prefetch was started.
    fn spawn_prefetch(&mut self, results: &mpsc::Sender<PrefetchOutcome>) -> bool {
        let Some((epoch, segment)) = self.session.prefetch_target() else {
            return false;
        };

        log::debug!("prefetching blocks {}-{}", segment.start_block, segment.end_block);
        let engine = Arc::clone(&self.engine);
        let voice = self.voice.clone();
        let results = results.clone();

        tokio::spawn(async move {
            let result = engine.synthesize(&segment.text, &voice).await;
            let _ = results
                .send(PrefetchOutcome {
                    epoch,
                    segment,
                    result,
                })
                .await;
        });
        true
    }

    fn halt_playback(&mut self, playback: &mut Option<PlaybackHandle>) {
        if let Some(handle) = playback.take() {
            handle.stop();
        }
    }
}

async fn next_playback_event(playback: &mut Option<PlaybackHandle>) -> Option<PlaybackEvent> {
    match playback.as_mut() {
        Some(handle) => handle.next_event().await,
        None => std::future::pending().await,
    }
}
