use log::{debug, info, warn};
use std::time::Duration;

use super::analyser::AnalyserNode;
use super::error::{ContextError, PlaybackError, SourceError};
use super::platform::{Activation, AnalysisContext, AudioPlatform, ContextState, MediaElement, MediaEvent};
use super::SpectrumFrame;
use crate::config::AnalyzerConfig;

const READY_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Identifies the source a session was initialized with.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceHandle {
    pub source: String,
    pub sample_rate: f32,
}

/// Owns one media element and the analysis graph it plays through.
///
/// The context survives `teardown()` so a later `initialize()` can reuse it;
/// only `close_context()` shuts it down.
pub struct AudioSourceManager<P: AudioPlatform> {
    platform: P,
    config: AnalyzerConfig,
    element: Option<P::Element>,
    context: Option<P::Context>,
    analyser: Option<AnalyserNode>,
}

impl<P: AudioPlatform> AudioSourceManager<P> {
    pub fn new(platform: P, config: AnalyzerConfig) -> Self {
        Self {
            platform,
            config,
            element: None,
            context: None,
            analyser: None,
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Build the decode pipeline for `source` and wire it into the graph.
    ///
    /// Waits for decode readiness up to the configured timeout, then carries
    /// on regardless; a decode error reported before then fails the call.
    pub async fn initialize(&mut self, source: &str) -> Result<SourceHandle, SourceError> {
        self.platform.probe(source)?;

        let mut element = self.platform.open(source)?;
        element.set_looping(self.config.looping);
        element.set_volume(self.config.initial_volume);
        element.set_muted(false);

        let timeout = self.config.ready_timeout();
        match tokio::time::timeout(timeout, Self::wait_until_ready(&mut element)).await {
            Ok(Ok(())) => debug!("Audio source ready: {}", source),
            Ok(Err(e)) => {
                element.release();
                return Err(e);
            }
            Err(_) => warn!("Audio source not ready after {:?}, continuing: {}", timeout, source),
        }

        if self.context_state() == ContextState::Closed {
            self.build_context()?;
        }
        if let Some(context) = self.context.as_mut() {
            context.connect(&mut element)?;
        }

        let sample_rate = self.sample_rate();
        self.element = Some(element);
        info!("Initialized audio source: {} ({}Hz analysis)", source, sample_rate);

        Ok(SourceHandle {
            source: source.to_string(),
            sample_rate,
        })
    }

    async fn wait_until_ready(element: &mut P::Element) -> Result<(), SourceError> {
        loop {
            while let Some(event) = element.poll_event() {
                if let MediaEvent::Error(e) = event {
                    return Err(e);
                }
            }
            if element.is_ready() {
                return Ok(());
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    fn build_context(&mut self) -> Result<(), ContextError> {
        let context = self.platform.create_context()?;
        self.context = Some(context);
        self.analyser = Some(AnalyserNode::new(&self.config));
        Ok(())
    }

    /// Make sure the context is running, rebuilding it if it was closed.
    ///
    /// Returns whether the context is running afterwards. A refused resume is
    /// not an error; only a failed rebuild is.
    pub async fn ensure_context_active(&mut self, activation: Activation) -> Result<bool, SourceError> {
        if self.context_state() == ContextState::Closed {
            info!("Analysis context closed, rebuilding audio graph");
            self.build_context()?;
            if let (Some(context), Some(element)) = (self.context.as_mut(), self.element.as_mut()) {
                context.connect(element)?;
            }
        }

        let Some(context) = self.context.as_mut() else {
            return Err(ContextError::Closed.into());
        };

        if context.state() == ContextState::Suspended {
            if let Err(e) = context.resume(activation).await {
                debug!("Context resume refused ({:?}): {}", activation, e);
            }
        }

        Ok(context.state() == ContextState::Running)
    }

    pub fn play(&mut self, activation: Activation) -> Result<(), PlaybackError> {
        match self.element.as_mut() {
            Some(element) => element.play(activation),
            None => Err(PlaybackError::DecodeNotReady),
        }
    }

    pub fn pause(&mut self) {
        if let Some(element) = self.element.as_mut() {
            element.pause();
        }
    }

    pub fn set_muted(&mut self, muted: bool) {
        if let Some(element) = self.element.as_mut() {
            element.set_muted(muted);
        }
    }

    pub fn is_muted(&self) -> bool {
        self.element.as_ref().map_or(false, |e| e.is_muted())
    }

    pub fn is_paused(&self) -> bool {
        self.element.as_ref().map_or(true, |e| e.is_paused())
    }

    pub fn has_source(&self) -> bool {
        self.element.is_some()
    }

    pub fn poll_event(&mut self) -> Option<MediaEvent> {
        self.element.as_mut().and_then(|e| e.poll_event())
    }

    pub fn context_state(&self) -> ContextState {
        self.context.as_ref().map_or(ContextState::Closed, |c| c.state())
    }

    pub fn sample_rate(&self) -> f32 {
        self.context.as_ref().map_or(44100.0, |c| c.sample_rate())
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.config.fft_size / 2
    }

    /// Snapshot the analyser; `None` without a live graph
    pub fn read_frame(&mut self) -> Option<SpectrumFrame> {
        let (Some(context), Some(analyser)) = (self.context.as_mut(), self.analyser.as_mut()) else {
            return None;
        };
        if context.state() == ContextState::Closed {
            return None;
        }
        context.read_time_domain(analyser.time_domain_mut());
        Some(analyser.byte_frequency_data())
    }

    /// Relay a platform audio interruption to the context
    pub fn suspend_context(&mut self) {
        if let Some(context) = self.context.as_mut() {
            context.suspend();
        }
    }

    /// Stop playback and release the element; the context stays open
    pub fn teardown(&mut self) {
        if let Some(mut element) = self.element.take() {
            element.pause();
            element.release();
        }
    }

    pub fn close_context(&mut self) {
        if let Some(mut context) = self.context.take() {
            context.close();
        }
        self.analyser = None;
    }
}
