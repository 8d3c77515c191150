use super::bands::BandExtractor;
use super::smoothing::SmoothingFilter;
use super::{AudioSignal, SpectrumFrame};
use crate::config::AnalyzerConfig;

/// Per-frame analysis step: spectrum in, smoothed `AudioSignal` out.
///
/// Holds no timer; the host's frame loop drives it. Once started it keeps
/// sampling through pauses so the output can decay instead of cutting out.
pub struct SpectrumSampler {
    extractor: BandExtractor,
    filter: SmoothingFilter,
    active: bool,
    ticks: u64,
}

impl SpectrumSampler {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            extractor: BandExtractor::new(config.bands),
            filter: SmoothingFilter::new(config),
            active: false,
            ticks: 0,
        }
    }

    pub fn start(&mut self) {
        self.active = true;
    }

    pub fn stop(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn sample(&mut self, frame: &SpectrumFrame, sample_rate: f32, running: bool) -> AudioSignal {
        self.ticks += 1;
        let raw = self.extractor.extract(frame, sample_rate);
        let smoothed = self.filter.update(&raw, running);

        AudioSignal {
            volume: smoothed.volume,
            bass: smoothed.bass,
            mid: smoothed.mid,
            treble: smoothed.treble,
            frequency: raw.frequency,
            is_playing: running,
        }
    }

    pub fn reset(&mut self) {
        self.filter.reset();
        self.ticks = 0;
    }
}
