//! voxbook configuration management.

use crate::narration::DEFAULT_PREFETCH_THRESHOLD;
use crate::text::segmenter::DEFAULT_SEGMENT_BUDGET;
use crate::tts::{VoiceOptions, DEFAULT_LANGUAGE, DEFAULT_SPEED, DEFAULT_VOICE};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoxbookConfig {
    /// Narration language code, e.g. "pt-BR"
    #[serde(default = "default_language")]
    pub language: String,

    /// Voice identifier passed to the TTS engine
    #[serde(default = "default_voice")]
    pub voice: String,

    /// Speed multiplier (0.25-4.0)
    #[serde(default = "default_speed")]
    pub speed: f32,

    /// Character budget per synthesized segment
    #[serde(default = "default_segment_budget")]
    pub segment_budget: usize,

    /// Elapsed-playback fraction that triggers prefetch (0.0-1.0)
    #[serde(default = "default_prefetch_threshold")]
    pub prefetch_threshold: f32,

    /// Path to the TTS engine script. None means look next to the
    /// voxbook executable.
    #[serde(default)]
    pub tts_script: Option<PathBuf>,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_voice() -> String {
    DEFAULT_VOICE.to_string()
}

fn default_speed() -> f32 {
    DEFAULT_SPEED
}

fn default_segment_budget() -> usize {
    DEFAULT_SEGMENT_BUDGET
}

fn default_prefetch_threshold() -> f32 {
    DEFAULT_PREFETCH_THRESHOLD
}

impl Default for VoxbookConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            voice: default_voice(),
            speed: default_speed(),
            segment_budget: default_segment_budget(),
            prefetch_threshold: default_prefetch_threshold(),
            tts_script: None,
        }
    }
}

impl VoxbookConfig {
    /// Config file path: ~/.config/voxbook/voxbook.toml
    pub fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("voxbook")
            .join("voxbook.toml"))
    }

    /// Load config from file, returning defaults if the file doesn't
    /// exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let config: VoxbookConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to file.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Voice parameters for the synthesis engine.
    pub fn voice_options(&self) -> VoiceOptions {
        VoiceOptions::new()
            .with_language(self.language.clone())
            .with_voice(self.voice.clone())
            .with_speed(self.speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = VoxbookConfig::default();
        assert_eq!(config.language, "pt-BR");
        assert_eq!(config.voice, "default");
        assert_eq!(config.speed, 1.0);
        assert_eq!(config.segment_budget, 1000);
        assert_eq!(config.prefetch_threshold, 0.70);
        assert!(config.tts_script.is_none());
    }

    #[test]
    fn test_config_path() {
        let path = VoxbookConfig::config_path().unwrap();
        assert!(path.ends_with("voxbook/voxbook.toml"));
    }

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
language = "en-US"
voice = "ryan"
speed = 1.5
segment_budget = 600
tts_script = "/opt/voxbook/tts_service.py"
"#;
        let config: VoxbookConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.language, "en-US");
        assert_eq!(config.voice, "ryan");
        assert_eq!(config.speed, 1.5);
        assert_eq!(config.segment_budget, 600);
        assert_eq!(config.prefetch_threshold, 0.70);
        assert_eq!(
            config.tts_script,
            Some(PathBuf::from("/opt/voxbook/tts_service.py"))
        );
    }

    #[test]
    fn test_parse_empty_config() {
        let config: VoxbookConfig = toml::from_str("").unwrap();
        assert_eq!(config.language, "pt-BR");
        assert_eq!(config.segment_budget, 1000);
    }

    #[test]
    fn test_roundtrip() {
        let mut config = VoxbookConfig::default();
        config.voice = "clara".to_string();
        config.speed = 0.8;

        let serialized = toml::to_string_pretty(&config).unwrap();
        let reloaded: VoxbookConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(reloaded.voice, "clara");
        assert_eq!(reloaded.speed, 0.8);
    }

    #[test]
    fn test_voice_options_clamp_speed() {
        let mut config = VoxbookConfig::default();
        config.speed = 50.0;
        assert_eq!(config.voice_options().speed, 4.0);
    }
}
