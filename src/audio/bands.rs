use super::analyser::MAX_SAMPLE_VALUE;
use super::SpectrumFrame;
use crate::config::{BandLayout, BandRange};

/// Unsmoothed per-frame measurements, all normalized to 0.0-1.0 except
/// `frequency` (kHz).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawBands {
    pub volume: f32,
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    pub frequency: f32,
}

/// Stateless transform from a byte spectrum to band energies.
#[derive(Debug, Clone)]
pub struct BandExtractor {
    layout: BandLayout,
}

impl BandExtractor {
    pub fn new(layout: BandLayout) -> Self {
        Self { layout }
    }

    pub fn extract(&self, frame: &SpectrumFrame, sample_rate: f32) -> RawBands {
        let bins = frame.bins();
        RawBands {
            volume: Self::rms(bins),
            bass: Self::average_range(bins, self.layout.bass),
            mid: Self::average_range(bins, self.layout.mid),
            treble: Self::average_range(bins, self.layout.treble),
            frequency: Self::dominant_frequency_khz(bins, sample_rate),
        }
    }

    /// `sqrt(mean(x^2)) / 255`
    pub fn rms(bins: &[u8]) -> f32 {
        if bins.is_empty() {
            return 0.0;
        }
        let sum_sq: f32 = bins.iter().map(|&b| (b as f32) * (b as f32)).sum();
        let rms = (sum_sq / bins.len() as f32).sqrt() / MAX_SAMPLE_VALUE;
        rms.clamp(0.0, 1.0)
    }

    /// Mean magnitude over `range`, clipped to the frame length
    pub fn average_range(bins: &[u8], range: BandRange) -> f32 {
        let end = range.end.min(bins.len());
        if range.start >= end {
            return 0.0;
        }

        let sum: f32 = bins[range.start..end].iter().map(|&b| b as f32).sum();
        (sum / (end - range.start) as f32 / MAX_SAMPLE_VALUE).clamp(0.0, 1.0)
    }

    /// Frequency of the loudest bin in kHz; the first bin wins ties
    pub fn dominant_frequency_khz(bins: &[u8], sample_rate: f32) -> f32 {
        if bins.is_empty() {
            return 0.0;
        }

        let mut peak_index = 0;
        let mut peak_value = bins[0];
        for (i, &b) in bins.iter().enumerate().skip(1) {
            if b > peak_value {
                peak_index = i;
                peak_value = b;
            }
        }

        (peak_index as f32 / bins.len() as f32) * (sample_rate / 2.0) / 1000.0
    }
}

impl Default for BandExtractor {
    fn default() -> Self {
        Self::new(BandLayout::default())
    }
}
