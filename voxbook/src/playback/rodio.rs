//! Rodio-backed playback sink.
//!
//! Rodio's output stream is not `Send`, so each payload plays on a
//! dedicated thread that owns the device handle. Control messages go in
//! through a channel the thread polls between progress ticks; events
//! come back out over the handle's channel.

use super::{PlaybackControl, PlaybackEvent, PlaybackHandle, PlaybackSink};
use crate::tts::AudioPayload;
use anyhow::{Context, Result};
use std::io::Cursor;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// How often the playback thread checks controls and reports progress.
const TICK_INTERVAL: Duration = Duration::from_millis(200);

/// Playback sink using the default audio output device.
pub struct RodioSink;

impl RodioSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RodioSink {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
enum ControlMsg {
    Pause,
    Resume,
    Stop,
}

struct ThreadControl(mpsc::UnboundedSender<ControlMsg>);

impl PlaybackControl for ThreadControl {
    fn pause(&self) {
        let _ = self.0.send(ControlMsg::Pause);
    }

    fn resume(&self) {
        let _ = self.0.send(ControlMsg::Resume);
    }

    fn stop(&self) {
        let _ = self.0.send(ControlMsg::Stop);
    }
}

impl PlaybackSink for RodioSink {
    fn play(&self, payload: AudioPayload) -> Result<PlaybackHandle> {
        // Read the duration up front so progress fractions are exact.
        let duration = wav_duration(&payload.data).context("failed to read WAV header")?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        std::thread::spawn(move || {
            if let Err(e) = play_on_thread(payload, duration, &event_tx, control_rx) {
                let _ = event_tx.send(PlaybackEvent::Error(e.to_string()));
            }
        });

        Ok(PlaybackHandle::new(
            event_rx,
            Box::new(ThreadControl(control_tx)),
        ))
    }
}

/// Duration of a WAV payload from its header.
fn wav_duration(data: &[u8]) -> Result<Duration> {
    let reader = hound::WavReader::new(Cursor::new(data))?;
    let spec = reader.spec();
    let frames = reader.duration();
    Ok(Duration::from_secs_f64(
        frames as f64 / spec.sample_rate as f64,
    ))
}

/// Blocking playback loop owning the output device.
fn play_on_thread(
    payload: AudioPayload,
    duration: Duration,
    events: &mpsc::UnboundedSender<PlaybackEvent>,
    mut controls: mpsc::UnboundedReceiver<ControlMsg>,
) -> Result<()> {
    let (_stream, stream_handle) =
        rodio::OutputStream::try_default().context("no audio output device")?;
    let sink = rodio::Sink::try_new(&stream_handle).context("failed to open audio sink")?;

    let source =
        rodio::Decoder::new_wav(Cursor::new(payload.data)).context("failed to decode WAV")?;
    sink.append(source);

    let _ = events.send(PlaybackEvent::Started);

    let mut elapsed = Duration::ZERO;
    let mut last_tick = Instant::now();
    let mut paused = false;

    loop {
        std::thread::sleep(TICK_INTERVAL);

        while let Ok(msg) = controls.try_recv() {
            match msg {
                ControlMsg::Pause => {
                    sink.pause();
                    paused = true;
                }
                ControlMsg::Resume => {
                    sink.play();
                    paused = false;
                }
                ControlMsg::Stop => {
                    // Stopped playback ends silently: no Ended event, so
                    // the scheduler never advances past it.
                    sink.stop();
                    return Ok(());
                }
            }
        }

        let now = Instant::now();
        if !paused {
            elapsed += now - last_tick;
        }
        last_tick = now;

        if sink.empty() {
            let _ = events.send(PlaybackEvent::Ended);
            return Ok(());
        }

        if !duration.is_zero() {
            let fraction = (elapsed.as_secs_f64() / duration.as_secs_f64()).min(1.0) as f32;
            let _ = events.send(PlaybackEvent::Progress(fraction));
        }
    }
}
