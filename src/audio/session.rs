use crossbeam_channel::{Receiver, Sender};
use log::{debug, info, warn};
use tokio::sync::watch;

use super::gate::{GateEvent, PlaybackGate, PlaybackState};
use super::gesture::{Gesture, GestureSource};
use super::platform::{Activation, AudioPlatform, ContextState, MediaEvent};
use super::sampler::SpectrumSampler;
use super::source::{AudioSourceManager, SourceHandle};
use super::{AudioSignal, PlaybackError, SourceError, SpectrumFrame};
use crate::config::{AnalyzerConfig, AutoplayStrategy};

/// One analyzer session: source manager, playback gate and sampler for a
/// single audio source, publishing `AudioSignal` on a watch channel.
///
/// Everything runs on the caller's thread. `tick()` is meant to be called
/// once per rendered frame and never waits; `start()`, `poll_gestures()` and
/// `resume()` may await platform work.
pub struct AnalyzerSession<P: AudioPlatform, G: GestureSource> {
    config: AnalyzerConfig,
    source: AudioSourceManager<P>,
    gate: PlaybackGate,
    sampler: SpectrumSampler,
    gestures: G,
    gesture_tx: Sender<Gesture>,
    gesture_rx: Receiver<Gesture>,
    signal: watch::Sender<AudioSignal>,
    handle: Option<SourceHandle>,
}

impl<P: AudioPlatform, G: GestureSource> AnalyzerSession<P, G> {
    pub fn new(platform: P, gestures: G, config: AnalyzerConfig) -> Self {
        let (gesture_tx, gesture_rx) = crossbeam_channel::unbounded();
        let (signal, _) = watch::channel(AudioSignal::default());

        Self {
            source: AudioSourceManager::new(platform, config.clone()),
            sampler: SpectrumSampler::new(&config),
            config,
            gate: PlaybackGate::new(),
            gestures,
            gesture_tx,
            gesture_rx,
            signal,
            handle: None,
        }
    }

    /// Latest published signal
    pub fn signal(&self) -> watch::Receiver<AudioSignal> {
        self.signal.subscribe()
    }

    pub fn status(&self) -> watch::Receiver<PlaybackState> {
        self.gate.subscribe()
    }

    pub fn state(&self) -> PlaybackState {
        self.gate.state()
    }

    pub fn is_awaiting_gesture(&self) -> bool {
        self.gate.state().is_awaiting_gesture()
    }

    pub fn current_source(&self) -> Option<&str> {
        self.handle.as_ref().map(|h| h.source.as_str())
    }

    pub fn gestures_mut(&mut self) -> &mut G {
        &mut self.gestures
    }

    pub fn source_manager(&self) -> &AudioSourceManager<P> {
        &self.source
    }

    /// Start analysing `source`.
    ///
    /// Calling again with the same identifier while the session is live is a
    /// no-op; a different identifier tears the current session down first.
    pub async fn start(&mut self, source: &str) -> Result<SourceHandle, SourceError> {
        if let Some(handle) = &self.handle {
            if handle.source == source {
                return Ok(handle.clone());
            }
            info!("Audio source changed: {} -> {}", handle.source, source);
            self.teardown();
        }

        let handle = self.source.initialize(source).await?;
        self.gate.handle(GateEvent::Initialized);
        self.handle = Some(handle.clone());

        self.autoplay().await;
        Ok(handle)
    }

    async fn autoplay(&mut self) {
        let muted_first = self.config.autoplay == AutoplayStrategy::MutedFirst;
        self.source.set_muted(muted_first);

        match self.source.play(Activation::Programmatic) {
            Ok(()) => {
                let running = match self.source.ensure_context_active(Activation::Programmatic).await {
                    Ok(running) => running,
                    Err(e) => {
                        warn!("Analysis context unavailable: {}", e);
                        false
                    }
                };
                if running && muted_first {
                    self.source.set_muted(false);
                }
                if !running {
                    info!("Autoplay started muted, waiting for a user gesture to resume audio");
                }
                self.gate.handle(GateEvent::AutoplayStarted {
                    context_running: running,
                });
            }
            Err(PlaybackError::BlockedByPolicy) => {
                info!("Autoplay blocked, waiting for a user gesture");
                self.gate.handle(GateEvent::AutoplayBlocked);
            }
            Err(PlaybackError::DecodeNotReady) => {
                warn!("Audio not decoded yet, deferring playback to the next user gesture");
                self.gate.handle(GateEvent::AutoplayBlocked);
            }
        }

        self.sync_with_gate();
    }

    /// Register or drop the gesture listener and start sampling to match
    /// the gate's state
    fn sync_with_gate(&mut self) {
        let state = self.gate.state();

        if state.is_awaiting_gesture() {
            if self.gate.listener().is_none() {
                let id = self.gestures.subscribe(self.gesture_tx.clone());
                self.gate.set_listener(id);
                debug!("Gesture listener {:?} registered", id);
            }
        } else if let Some(id) = self.gate.take_listener() {
            self.gestures.unsubscribe(id);
            debug!("Gesture listener {:?} removed", id);
        }

        if state.is_running() && !self.sampler.is_active() {
            info!("Spectrum sampling started");
            self.sampler.start();
        }
    }

    /// Drain pending gestures; returns true if one unlocked playback.
    ///
    /// Gestures that arrive outside `AwaitingUserGesture` are discarded. A
    /// source error reported while waiting ends the session instead.
    pub async fn poll_gestures(&mut self) -> bool {
        self.drain_media_events();

        let pending: Vec<Gesture> = self.gesture_rx.try_iter().collect();

        for gesture in pending {
            if !self.gate.state().is_awaiting_gesture() {
                break;
            }
            if !gesture.is_qualifying() {
                continue;
            }
            if self.unlock(gesture).await {
                return true;
            }
        }
        false
    }

    async fn unlock(&mut self, gesture: Gesture) -> bool {
        match self.source.ensure_context_active(Activation::Gesture).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("{:?} did not resume the analysis context", gesture);
                return false;
            }
            Err(e) => {
                warn!("Cannot rebuild analysis context: {}", e);
                return false;
            }
        }

        self.source.set_muted(false);
        if let Err(e) = self.source.play(Activation::Gesture) {
            warn!("Playback failed after {:?}: {}", gesture, e);
            self.drain_media_events();
            return false;
        }

        // The unlocking play() raises Playing; it must not count as a resume
        self.drain_media_events();
        self.gate.handle(GateEvent::GestureUnlocked);
        self.sync_with_gate();
        if !self.gate.is_running() {
            return false;
        }
        info!("Audio unlocked by {:?}", gesture);
        true
    }

    /// Explicit pause; resources stay open
    pub fn pause(&mut self) {
        if !self.gate.is_running() {
            return;
        }
        self.source.pause();
        self.drain_media_events();
    }

    /// Resume from `Paused` or `Suspended`.
    ///
    /// Falls back to `AwaitingUserGesture` when the platform will not resume
    /// without one. Returns whether the session is running afterwards.
    pub async fn resume(&mut self) -> bool {
        match self.gate.state() {
            PlaybackState::Paused | PlaybackState::Suspended => {}
            state => return state.is_running(),
        }

        let running = match self.source.ensure_context_active(Activation::Programmatic).await {
            Ok(running) => running,
            Err(e) => {
                warn!("Cannot rebuild analysis context: {}", e);
                false
            }
        };

        let resumed = running
            && match self.source.play(Activation::Programmatic) {
                Ok(()) => true,
                Err(e) => {
                    debug!("Programmatic resume refused: {}", e);
                    false
                }
            };

        if resumed {
            self.drain_media_events();
            self.gate.handle(GateEvent::Resumed);
        } else {
            self.gate.handle(GateEvent::ResumeNeedsGesture);
        }
        self.sync_with_gate();
        self.gate.is_running()
    }

    /// Relay a platform audio interruption; the gate notices on the next tick
    pub fn suspend_context(&mut self) {
        self.source.suspend_context();
    }

    fn drain_media_events(&mut self) {
        while let Some(event) = self.source.poll_event() {
            match event {
                MediaEvent::Playing => {
                    if self.gate.state() == PlaybackState::Paused
                        && self.source.context_state() == ContextState::Running
                    {
                        self.gate.handle(GateEvent::Resumed);
                    }
                }
                MediaEvent::Paused | MediaEvent::Ended => {
                    self.gate.handle(GateEvent::Paused);
                }
                MediaEvent::Error(e) if self.gate.state().is_awaiting_gesture() => {
                    // Nothing left for a gesture to unlock
                    warn!("Audio source failed before playback started: {}", e);
                    self.teardown();
                }
                MediaEvent::Error(e) => {
                    warn!("Audio source error: {}", e);
                    self.gate.handle(GateEvent::Paused);
                }
            }
        }
    }

    /// One frame of analysis; `None` when sampling is inactive.
    pub fn tick(&mut self) -> Option<AudioSignal> {
        if !self.sampler.is_active() {
            return None;
        }

        self.drain_media_events();
        if self.gate.is_running() && self.source.context_state() != ContextState::Running {
            warn!("Analysis context suspended by the platform");
            self.gate.handle(GateEvent::ContextSuspended);
        }
        self.sync_with_gate();

        let running = self.gate.is_running();
        let frame = self
            .source
            .read_frame()
            .unwrap_or_else(|| SpectrumFrame::new(vec![0; self.source.frequency_bin_count()]));
        let signal = self.sampler.sample(&frame, self.source.sample_rate(), running);

        if self.sampler.ticks() % 120 == 0 {
            debug!(
                "Audio signal: volume={:.3} bass={:.3} mid={:.3} treble={:.3} freq={:.2}kHz playing={}",
                signal.volume, signal.bass, signal.mid, signal.treble, signal.frequency, signal.is_playing
            );
        }

        self.signal.send_replace(signal);
        Some(signal)
    }

    /// Lightweight teardown: stops sampling and playback, keeps the context
    pub fn teardown(&mut self) {
        self.sampler.stop();
        self.sampler.reset();
        if let Some(id) = self.gate.take_listener() {
            self.gestures.unsubscribe(id);
        }
        self.source.teardown();
        self.gate.handle(GateEvent::TornDown);
        self.signal.send_replace(AudioSignal::default());

        if let Some(handle) = self.handle.take() {
            info!("Analyzer session torn down: {}", handle.source);
        }
        // Anything queued for the old session is stale
        while self.gesture_rx.try_recv().is_ok() {}
    }

    /// Full shutdown: teardown plus closing the analysis context
    pub fn shutdown(&mut self) {
        self.teardown();
        self.source.close_context();
    }
}
