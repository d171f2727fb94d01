//! Synthesis gateway: the boundary over the external TTS engine.

pub mod piper;

use async_trait::async_trait;
use thiserror::Error;

/// Default narration language.
pub const DEFAULT_LANGUAGE: &str = "pt-BR";
/// Default voice identifier.
pub const DEFAULT_VOICE: &str = "default";
/// Default speed multiplier.
pub const DEFAULT_SPEED: f32 = 1.0;

/// Voice parameters passed to the engine with every synthesis call.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceOptions {
    /// Language code, e.g. "pt-BR".
    pub language: String,
    /// Voice identifier understood by the engine.
    pub voice: String,
    /// Speed multiplier; 1.0 is normal pace.
    pub speed: f32,
}

impl Default for VoiceOptions {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            speed: DEFAULT_SPEED,
        }
    }
}

impl VoiceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the language code.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the voice identifier.
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    /// Set the speed multiplier, clamped to a speakable range.
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed.clamp(0.25, 4.0);
        self
    }
}

/// Encoded audio produced by one synthesis call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPayload {
    /// WAV-encoded audio bytes.
    pub data: Vec<u8>,
}

impl AudioPayload {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Errors from the synthesis engine boundary.
#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("TTS engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("TTS engine failed: {0}")]
    EngineFailed(String),

    #[error("TTS engine exited successfully but produced no audio")]
    NoOutput,

    #[error("IO error during synthesis: {0}")]
    Io(#[from] std::io::Error),
}

/// The external text-to-speech engine, treated as a black box:
/// text and voice parameters in, encoded audio or a diagnostic out.
///
/// Calls are independent; the narration scheduler, not the engine,
/// enforces the at-most-one-prefetch invariant.
#[async_trait]
pub trait SynthesisEngine: Send + Sync {
    /// Synthesize `text` into an audio payload.
    async fn synthesize(
        &self,
        text: &str,
        voice: &VoiceOptions,
    ) -> Result<AudioPayload, SynthesisError>;

    /// Short engine name for logs and diagnostics.
    fn name(&self) -> &'static str;
}
