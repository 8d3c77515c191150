//! Error types for the audio source, playback and analysis context

use thiserror::Error;

/// Failures loading or decoding the audio resource.
///
/// These are the only conditions that propagate to the caller of
/// `initialize()`; everything else is absorbed into playback state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    /// The resource could not be fetched
    #[error("Audio source unreachable: {0}")]
    Unreachable(String),

    /// The resource was fetched but could not be decoded
    #[error("Audio decode failed: {0}")]
    DecodeFailed(String),

    /// The analysis context could not be rebuilt
    #[error("Analysis context error: {0}")]
    Context(#[from] ContextError),
}

/// Failures starting playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlaybackError {
    /// The platform's autoplay policy refused playback without a user gesture
    #[error("Playback blocked by autoplay policy")]
    BlockedByPolicy,

    /// The media has not finished decoding
    #[error("Media not ready for playback")]
    DecodeNotReady,
}

/// Analysis context conditions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// The context was closed and must be rebuilt
    #[error("Analysis context closed")]
    Closed,

    /// The context is suspended and could not be resumed
    #[error("Analysis context suspended")]
    Suspended,

    /// The platform could not provide an output
    #[error("Audio output unavailable: {0}")]
    Unavailable(String),
}
