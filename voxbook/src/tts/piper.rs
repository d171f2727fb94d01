//! Piper TTS engine invoked as an external Python process.
//!
//! Each call writes the text to a private temp file, runs the service
//! script with `<input> <output> <language> <voice> <speed>`, and reads
//! the WAV it produced. Working files are owned exclusively by the call
//! and removed on every exit path, including engine failure and
//! cancellation.

use super::{AudioPayload, SynthesisEngine, SynthesisError, VoiceOptions};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::process::Command;

/// Per-process counter used to keep output filenames unique when
/// several calls run concurrently (current segment plus prefetch).
static CALL_SEQ: AtomicU64 = AtomicU64::new(0);

/// TTS backend spawning the Piper service script.
#[derive(Debug)]
pub struct PiperEngine {
    /// Python interpreter to run the script with.
    python: PathBuf,
    /// Path to the TTS service script.
    script: PathBuf,
    /// Space-free directory for voice models and output files. Piper
    /// fails to locate models under paths containing spaces.
    cache_dir: PathBuf,
}

impl PiperEngine {
    /// Create an engine for the given service script.
    ///
    /// Fails immediately when the script does not exist, so a missing
    /// installation is reported before a session ever starts.
    pub fn new(script: impl Into<PathBuf>) -> Result<Self, SynthesisError> {
        let script = script.into();
        if !script.exists() {
            return Err(SynthesisError::EngineUnavailable(format!(
                "TTS service script not found: {}",
                script.display()
            )));
        }

        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("voxbook")
            .join("tts");
        std::fs::create_dir_all(&cache_dir)?;

        Ok(Self {
            python: PathBuf::from(default_python()),
            script,
            cache_dir,
        })
    }

    /// Override the Python interpreter.
    pub fn with_python(mut self, python: impl Into<PathBuf>) -> Self {
        self.python = python.into();
        self
    }

    /// Override the model/output cache directory.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }
}

/// Default interpreter name per platform.
fn default_python() -> &'static str {
    if cfg!(windows) { "python" } else { "python3" }
}

/// Removes the engine's output file when the call resolves, whether it
/// succeeded, failed, or was cancelled mid-flight.
struct OutputGuard(PathBuf);

impl Drop for OutputGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

#[async_trait]
impl SynthesisEngine for PiperEngine {
    async fn synthesize(
        &self,
        text: &str,
        voice: &VoiceOptions,
    ) -> Result<AudioPayload, SynthesisError> {
        // Input goes through a file rather than argv: segments run to a
        // thousand characters and may contain arbitrary punctuation.
        let input = tempfile::Builder::new()
            .prefix("voxbook_tts_")
            .suffix(".txt")
            .tempfile()?;
        tokio::fs::write(input.path(), text).await?;

        let call_id = format!(
            "{}_{}",
            std::process::id(),
            CALL_SEQ.fetch_add(1, Ordering::Relaxed)
        );
        let output_path = self.cache_dir.join(format!("out_{call_id}.wav"));
        let _output_guard = OutputGuard(output_path.clone());

        log::debug!(
            "synthesizing {} chars (lang={}, voice={}, speed={})",
            text.chars().count(),
            voice.language,
            voice.voice,
            voice.speed
        );

        let output = run_engine(
            &self.python,
            &self.script,
            input.path(),
            &output_path,
            voice,
            &self.cache_dir,
        )
        .await?;

        if !output.status.success() {
            let diagnostic = String::from_utf8_lossy(&output.stderr).trim().to_string();
            log::warn!("TTS engine exited with {}: {}", output.status, diagnostic);
            return Err(SynthesisError::EngineFailed(if diagnostic.is_empty() {
                format!("engine exited with {}", output.status)
            } else {
                diagnostic
            }));
        }

        match tokio::fs::read(&output_path).await {
            Ok(data) if !data.is_empty() => Ok(AudioPayload::new(data)),
            _ => Err(SynthesisError::NoOutput),
        }
    }

    fn name(&self) -> &'static str {
        "piper"
    }
}

/// Spawn the service script and wait for it to finish.
async fn run_engine(
    python: &Path,
    script: &Path,
    input: &Path,
    output: &Path,
    voice: &VoiceOptions,
    cache_dir: &Path,
) -> Result<std::process::Output, SynthesisError> {
    Command::new(python)
        .arg(script)
        .arg(input)
        .arg(output)
        .arg(&voice.language)
        .arg(&voice.voice)
        .arg(voice.speed.to_string())
        .env("PYTHONIOENCODING", "utf-8")
        .env("TTS_HOME", cache_dir)
        .env("PIPER_VOICE_DIR", cache_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| {
            SynthesisError::EngineUnavailable(format!(
                "failed to launch {}: {}. Install Python 3 and run `pip install piper-tts`.",
                python.display(),
                e
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_script_rejected_at_construction() {
        let err = PiperEngine::new("/nonexistent/tts_service.py").unwrap_err();
        match err {
            SynthesisError::EngineUnavailable(msg) => {
                assert!(msg.contains("tts_service.py"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_engine_unavailable() {
        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("tts_service.py");
        std::fs::write(&script, "# stub").unwrap();

        let engine = PiperEngine::new(&script)
            .unwrap()
            .with_python("/nonexistent/python3")
            .with_cache_dir(dir.path().join("cache"));
        std::fs::create_dir_all(dir.path().join("cache")).unwrap();

        let err = engine
            .synthesize("hello", &VoiceOptions::default())
            .await
            .unwrap_err();
        match err {
            SynthesisError::EngineUnavailable(msg) => {
                assert!(msg.contains("piper-tts"), "diagnostic should be actionable: {msg}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_output_guard_removes_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out.wav");
        std::fs::write(&path, b"wav").unwrap();
        drop(OutputGuard(path.clone()));
        assert!(!path.exists());
    }
}
