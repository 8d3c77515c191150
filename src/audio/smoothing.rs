use super::RawBands;
use crate::config::{AnalyzerConfig, SmoothingFactors};

/// Values below this snap to zero during decay.
const DECAY_FLOOR: f32 = 1e-6;

/// One smoothed channel: previous output plus its blend factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingState {
    pub value: f32,
    pub factor: f32,
}

impl SmoothingState {
    pub fn new(factor: f32) -> Self {
        Self { value: 0.0, factor }
    }

    /// `value' = value * factor + raw * (1 - factor)`
    pub fn blend(&mut self, raw: f32) -> f32 {
        let raw = raw.clamp(0.0, 1.0);
        self.value = (self.value * self.factor + raw * (1.0 - self.factor)).clamp(0.0, 1.0);
        self.value
    }

    /// `value' = value * decay_factor`, factor limited to 0.0-1.0
    pub fn decay(&mut self, decay_factor: f32) -> f32 {
        self.value = (self.value * decay_factor.clamp(0.0, 1.0)).clamp(0.0, 1.0);
        if self.value < DECAY_FLOOR {
            self.value = 0.0;
        }
        self.value
    }
}

/// Per-channel exponential smoothing for volume, bass, mid and treble.
#[derive(Debug, Clone)]
pub struct SmoothingFilter {
    volume: SmoothingState,
    bass: SmoothingState,
    mid: SmoothingState,
    treble: SmoothingState,
    decay_factor: f32,
    silence_threshold: f32,
}

impl SmoothingFilter {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self::with_factors(config.smoothing, config.decay_factor, config.silence_threshold)
    }

    pub fn with_factors(factors: SmoothingFactors, decay_factor: f32, silence_threshold: f32) -> Self {
        Self {
            volume: SmoothingState::new(factors.volume),
            bass: SmoothingState::new(factors.bass),
            mid: SmoothingState::new(factors.mid),
            treble: SmoothingState::new(factors.treble),
            decay_factor,
            silence_threshold,
        }
    }

    /// Feed one frame of raw values.
    ///
    /// Blends while `running` and the frame is above the silence threshold;
    /// otherwise every channel decays toward zero. `frequency` is passed
    /// through unsmoothed.
    pub fn update(&mut self, raw: &RawBands, running: bool) -> RawBands {
        if running && raw.volume >= self.silence_threshold {
            RawBands {
                volume: self.volume.blend(raw.volume),
                bass: self.bass.blend(raw.bass),
                mid: self.mid.blend(raw.mid),
                treble: self.treble.blend(raw.treble),
                frequency: raw.frequency,
            }
        } else {
            self.decay(raw.frequency)
        }
    }

    fn decay(&mut self, frequency: f32) -> RawBands {
        RawBands {
            volume: self.volume.decay(self.decay_factor),
            bass: self.bass.decay(self.decay_factor),
            mid: self.mid.decay(self.decay_factor),
            treble: self.treble.decay(self.decay_factor),
            frequency,
        }
    }

    pub fn current(&self) -> RawBands {
        RawBands {
            volume: self.volume.value,
            bass: self.bass.value,
            mid: self.mid.value,
            treble: self.treble.value,
            frequency: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.volume.value = 0.0;
        self.bass.value = 0.0;
        self.mid.value = 0.0;
        self.treble.value = 0.0;
    }
}
