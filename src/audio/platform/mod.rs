//! Platform seam: decoding, output and the analysis graph.
//!
//! `AudioSourceManager` only talks to these traits. `rodio_backend` is the
//! native implementation; tests use an in-memory fake with a scriptable
//! autoplay policy.

pub mod rodio_backend;

#[cfg(test)]
pub(crate) mod fake;

pub use rodio_backend::{RodioContext, RodioElement, RodioPlatform};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::{ContextError, PlaybackError, SourceError};

/// Whether a call is made on behalf of a user gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Programmatic,
    Gesture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Suspended,
    Running,
    Closed,
}

/// Which playback a platform allows before any user gesture.
///
/// Once a gesture has been honoured, activation is sticky: later
/// programmatic calls on the same element or context are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoplayPolicy {
    /// Nothing is blocked, contexts start running
    Allow,
    /// Muted playback is allowed, the context stays suspended until a gesture
    MutedOnly,
    /// Every programmatic play is refused
    GestureRequired,
}

impl AutoplayPolicy {
    pub fn allows_play(self, activation: Activation, muted: bool, activated: bool) -> bool {
        if activation == Activation::Gesture || activated {
            return true;
        }
        match self {
            AutoplayPolicy::Allow => true,
            AutoplayPolicy::MutedOnly => muted,
            AutoplayPolicy::GestureRequired => false,
        }
    }

    pub fn allows_resume(self, activation: Activation, activated: bool) -> bool {
        activation == Activation::Gesture || activated || self == AutoplayPolicy::Allow
    }

    pub fn initial_context_state(self) -> ContextState {
        match self {
            AutoplayPolicy::Allow => ContextState::Running,
            _ => ContextState::Suspended,
        }
    }
}

/// Notifications raised by a media element, drained once per tick.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    Playing,
    Paused,
    Ended,
    Error(SourceError),
}

pub trait AudioPlatform {
    type Element: MediaElement;
    type Context: AnalysisContext<Element = Self::Element>;

    /// Availability check, independent of the decode pipeline
    fn probe(&self, source: &str) -> Result<(), SourceError>;

    /// Open the resource and start decoding it
    fn open(&mut self, source: &str) -> Result<Self::Element, SourceError>;

    fn create_context(&mut self) -> Result<Self::Context, ContextError>;
}

/// A decodable, playable audio resource.
pub trait MediaElement {
    /// True once enough is decoded to start playback
    fn is_ready(&mut self) -> bool;

    fn set_looping(&mut self, looping: bool);
    fn set_volume(&mut self, volume: f32);
    fn set_muted(&mut self, muted: bool);
    fn is_muted(&self) -> bool;

    fn play(&mut self, activation: Activation) -> Result<(), PlaybackError>;
    fn pause(&mut self);
    fn is_paused(&self) -> bool;

    /// Stop playback and drop the decoded data
    fn release(&mut self);

    fn poll_event(&mut self) -> Option<MediaEvent>;
}

/// Output graph hosting the element and the analysis tap.
#[async_trait(?Send)]
pub trait AnalysisContext {
    type Element;

    fn state(&self) -> ContextState;

    async fn resume(&mut self, activation: Activation) -> Result<(), ContextError>;

    /// Platform-initiated suspension (device loss, OS audio interruption)
    fn suspend(&mut self);

    fn close(&mut self);

    /// Route the element's output through this context
    fn connect(&mut self, element: &mut Self::Element) -> Result<(), ContextError>;

    fn sample_rate(&self) -> f32;

    /// Fill `out` with the most recent mono samples heard on the output;
    /// silence when nothing is audible
    fn read_time_domain(&mut self, out: &mut [f32]);
}
