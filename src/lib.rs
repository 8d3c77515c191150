//! Real-time loudness and spectral analysis for a playing audio source.
//!
//! An [`AnalyzerSession`] plays one source through a rodio output, taps the
//! output into an FFT analyser, and publishes a smoothed [`AudioSignal`] once
//! per frame. Playback that an autoplay policy blocks waits for a single
//! qualifying user gesture.

pub mod audio;
pub mod config;

pub use audio::{
    AnalyzerSession, AudioSignal, ChannelGestureSource, Gesture, PlaybackState, SourceError,
    SpectrumFrame,
};
pub use audio::platform::{AutoplayPolicy, RodioPlatform};
pub use config::{AnalyzerConfig, AutoplayStrategy, ConfigError};
