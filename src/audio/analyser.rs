use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use super::SpectrumFrame;
use crate::config::AnalyzerConfig;

/// Largest byte magnitude the analyser emits.
pub const MAX_SAMPLE_VALUE: f32 = 255.0;

/// Spectral analysis node.
///
/// Turns the most recent `fft_size` time-domain samples into a byte spectrum
/// of `fft_size / 2` bins. The node keeps its own smoothing over time
/// (`analyser_smoothing`), separate from the per-channel smoothing applied to
/// the published signal.
pub struct AnalyserNode {
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,

    time_domain: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    previous_magnitudes: Vec<f32>,
}

impl AnalyserNode {
    pub fn new(config: &AnalyzerConfig) -> Self {
        let fft_size = config.fft_size;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        Self {
            fft_size,
            fft,
            window: Self::blackman_window(fft_size),
            smoothing: config.analyser_smoothing,
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
            time_domain: vec![0.0; fft_size],
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            previous_magnitudes: vec![0.0; fft_size / 2],
        }
    }

    fn blackman_window(size: usize) -> Vec<f32> {
        let a0 = 0.42;
        let a1 = 0.5;
        let a2 = 0.08;
        (0..size)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
                a0 - a1 * phase.cos() + a2 * (2.0 * phase).cos()
            })
            .collect()
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Scratch buffer the context fills with the latest time-domain samples
    pub fn time_domain_mut(&mut self) -> &mut [f32] {
        &mut self.time_domain
    }

    /// Analyse the current contents of the time-domain buffer
    pub fn byte_frequency_data(&mut self) -> SpectrumFrame {
        for ((slot, &sample), &weight) in self
            .buffer
            .iter_mut()
            .zip(self.time_domain.iter())
            .zip(self.window.iter())
        {
            *slot = Complex::new(sample * weight, 0.0);
        }

        self.fft.process(&mut self.buffer);

        let scale = 1.0 / self.fft_size as f32;
        let db_range = self.max_decibels - self.min_decibels;
        let mut bins = Vec::with_capacity(self.frequency_bin_count());

        for (k, previous) in self.previous_magnitudes.iter_mut().enumerate() {
            let magnitude = self.buffer[k].norm() * scale;
            let smoothed = self.smoothing * *previous + (1.0 - self.smoothing) * magnitude;
            // Keep NaN/inf out of the history
            *previous = if smoothed.is_finite() { smoothed } else { 0.0 };

            let db = 20.0 * previous.log10();
            let scaled = (MAX_SAMPLE_VALUE / db_range * (db - self.min_decibels)).floor();
            let byte = if scaled.is_nan() {
                0
            } else {
                scaled.clamp(0.0, MAX_SAMPLE_VALUE) as u8
            };
            bins.push(byte);
        }

        SpectrumFrame::new(bins)
    }
}
