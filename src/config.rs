use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Order of autoplay attempts made when a session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoplayStrategy {
    /// Start silent, then lift the mute once the context runs
    MutedFirst,
    /// Attempt audible playback straight away
    UnmutedFirst,
}

/// Contiguous range of spectrum bins, `start` inclusive, `end` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandRange {
    pub start: usize,
    pub end: usize,
}

impl BandRange {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Fixed bin ranges for the three bands.
///
/// These are index ranges, not frequencies: the split does not move with the
/// sample rate, so it is a coarse approximation rather than a filter bank.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandLayout {
    pub bass: BandRange,
    pub mid: BandRange,
    pub treble: BandRange,
}

impl Default for BandLayout {
    fn default() -> Self {
        Self {
            bass: BandRange::new(0, 10),
            mid: BandRange::new(10, 40),
            treble: BandRange::new(40, 128),
        }
    }
}

/// EMA weight given to the previous smoothed value, per channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingFactors {
    pub volume: f32,
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
}

impl Default for SmoothingFactors {
    fn default() -> Self {
        Self {
            volume: 0.8,
            bass: 0.7,
            mid: 0.75,
            treble: 0.85,
        }
    }
}

/// Tunables for the whole analysis pipeline.
///
/// Every field has a default, so a config file only needs the values it
/// overrides:
///
/// ```json
/// { "fft_size": 512, "smoothing": { "treble": 0.9 } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    // Analyser node
    pub fft_size: usize,
    pub analyser_smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,

    // Band extraction
    pub bands: BandLayout,

    // Smoothing filter
    pub smoothing: SmoothingFactors,
    pub decay_factor: f32,
    pub silence_threshold: f32,

    // Source and playback
    pub autoplay: AutoplayStrategy,
    pub ready_timeout_ms: u64,
    pub initial_volume: f32,
    pub looping: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fft_size: 256,
            analyser_smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
            bands: BandLayout::default(),
            smoothing: SmoothingFactors::default(),
            decay_factor: 0.95,
            silence_threshold: 0.01,
            autoplay: AutoplayStrategy::MutedFirst,
            ready_timeout_ms: 3000,
            initial_volume: 1.0,
            looping: true,
        }
    }
}

impl AnalyzerConfig {
    /// Load and validate a JSON config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the config as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.fft_size.is_power_of_two() || !(32..=32768).contains(&self.fft_size) {
            return Err(ConfigError::Invalid(format!(
                "fft_size must be a power of two in 32..=32768, got {}",
                self.fft_size
            )));
        }
        if !(0.0..=1.0).contains(&self.analyser_smoothing) {
            return Err(ConfigError::Invalid(format!(
                "analyser_smoothing must be within 0..=1, got {}",
                self.analyser_smoothing
            )));
        }
        if self.min_decibels >= self.max_decibels {
            return Err(ConfigError::Invalid(format!(
                "min_decibels ({}) must be below max_decibels ({})",
                self.min_decibels, self.max_decibels
            )));
        }

        for (name, range) in [
            ("bass", self.bands.bass),
            ("mid", self.bands.mid),
            ("treble", self.bands.treble),
        ] {
            if range.start >= range.end {
                return Err(ConfigError::Invalid(format!(
                    "{} band is empty: {}..{}",
                    name, range.start, range.end
                )));
            }
        }

        let factors = self.smoothing;
        for (name, factor) in [
            ("volume", factors.volume),
            ("bass", factors.bass),
            ("mid", factors.mid),
            ("treble", factors.treble),
        ] {
            if !(0.0..1.0).contains(&factor) {
                return Err(ConfigError::Invalid(format!(
                    "{} smoothing factor must be within 0..1, got {}",
                    name, factor
                )));
            }
        }

        if !(self.decay_factor > 0.0 && self.decay_factor < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "decay_factor must be within (0, 1), got {}",
                self.decay_factor
            )));
        }
        if !(0.0..=1.0).contains(&self.silence_threshold) {
            return Err(ConfigError::Invalid(format!(
                "silence_threshold must be within 0..=1, got {}",
                self.silence_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.initial_volume) {
            return Err(ConfigError::Invalid(format!(
                "initial_volume must be within 0..=1, got {}",
                self.initial_volume
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalyzerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fft_size / 2, config.bands.treble.end);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: AnalyzerConfig =
            serde_json::from_str(r#"{ "fft_size": 512, "smoothing": { "treble": 0.9 } }"#).unwrap();
        assert_eq!(config.fft_size, 512);
        assert_eq!(config.smoothing.treble, 0.9);
        assert_eq!(config.smoothing.bass, 0.7);
        assert_eq!(config.autoplay, AutoplayStrategy::MutedFirst);
    }

    #[test]
    fn test_strategy_names() {
        let config: AnalyzerConfig =
            serde_json::from_str(r#"{ "autoplay": "unmuted_first" }"#).unwrap();
        assert_eq!(config.autoplay, AutoplayStrategy::UnmutedFirst);
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = AnalyzerConfig::default();
        config.fft_size = 300;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = AnalyzerConfig::default();
        config.decay_factor = 1.0;
        assert!(config.validate().is_err());

        let mut config = AnalyzerConfig::default();
        config.smoothing.mid = 1.0;
        assert!(config.validate().is_err());

        let mut config = AnalyzerConfig::default();
        config.bands.mid = BandRange::new(40, 10);
        assert!(config.validate().is_err());

        let mut config = AnalyzerConfig::default();
        config.min_decibels = -20.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analyzer.json");

        let mut config = AnalyzerConfig::default();
        config.decay_factor = 0.9;
        config.save(&path).unwrap();

        let loaded = AnalyzerConfig::load(&path).unwrap();
        assert_eq!(loaded, config);

        std::fs::write(&path, r#"{ "decay_factor": 2.0 }"#).unwrap();
        assert!(matches!(AnalyzerConfig::load(&path), Err(ConfigError::Invalid(_))));
    }
}
