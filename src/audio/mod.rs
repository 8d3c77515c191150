pub mod analyser;
pub mod bands;
pub mod error;
pub mod gate;
pub mod gesture;
pub mod platform;
pub mod sampler;
pub mod session;
pub mod smoothing;
pub mod source;

pub use analyser::AnalyserNode;
pub use bands::{BandExtractor, RawBands};
pub use error::{ContextError, PlaybackError, SourceError};
pub use gate::{GateEvent, PlaybackGate, PlaybackState};
pub use gesture::{ChannelGestureSource, Gesture, GestureSource, ListenerId};
pub use platform::{Activation, AnalysisContext, AudioPlatform, ContextState, MediaElement, MediaEvent};
pub use sampler::SpectrumSampler;
pub use session::AnalyzerSession;
pub use smoothing::{SmoothingFilter, SmoothingState};
pub use source::{AudioSourceManager, SourceHandle};

use serde::{Deserialize, Serialize};

/// Smoothed loudness and spectral description published to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioSignal {
    /// Smoothed RMS loudness, 0.0-1.0
    pub volume: f32,
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    /// Dominant frequency in kHz
    pub frequency: f32,
    /// True only while the gate is `Running`
    pub is_playing: bool,
}

impl Default for AudioSignal {
    fn default() -> Self {
        Self {
            volume: 0.0,
            bass: 0.0,
            mid: 0.0,
            treble: 0.0,
            frequency: 0.0,
            is_playing: false,
        }
    }
}

/// One analyser snapshot: byte magnitudes, one per frequency bin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpectrumFrame {
    bins: Vec<u8>,
}

impl SpectrumFrame {
    pub fn new(bins: Vec<u8>) -> Self {
        Self { bins }
    }

    pub fn bins(&self) -> &[u8] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

impl From<Vec<u8>> for SpectrumFrame {
    fn from(bins: Vec<u8>) -> Self {
        Self::new(bins)
    }
}
