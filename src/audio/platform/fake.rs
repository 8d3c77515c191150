use async_trait::async_trait;
use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use super::{
    Activation, AnalysisContext, AudioPlatform, AutoplayPolicy, ContextState, MediaElement, MediaEvent,
};
use crate::audio::error::{ContextError, PlaybackError, SourceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FakeDecode {
    Ready,
    Never,
    Fails,
}

/// Knobs and counters shared between a test and the fake platform.
pub(crate) struct FakeShared {
    pub policy: Cell<AutoplayPolicy>,
    pub decode: Cell<FakeDecode>,
    pub reachable: Cell<bool>,
    pub sample_rate: Cell<f32>,
    /// Tone placed on the output as (bin, amplitude) for a 256-point window
    pub tone: Cell<(usize, f32)>,
    pub context_state: Cell<ContextState>,
    pub contexts_created: Cell<usize>,
    pub elements_opened: Cell<usize>,
    pub released: Cell<usize>,
    pub element_playing: Rc<Cell<bool>>,
    pub element_muted: Rc<Cell<bool>>,
}

impl FakeShared {
    fn new(policy: AutoplayPolicy) -> Self {
        Self {
            policy: Cell::new(policy),
            decode: Cell::new(FakeDecode::Ready),
            reachable: Cell::new(true),
            sample_rate: Cell::new(48000.0),
            tone: Cell::new((20, 0.5)),
            context_state: Cell::new(ContextState::Closed),
            contexts_created: Cell::new(0),
            elements_opened: Cell::new(0),
            released: Cell::new(0),
            element_playing: Rc::new(Cell::new(false)),
            element_muted: Rc::new(Cell::new(false)),
        }
    }
}

pub(crate) struct FakePlatform {
    shared: Rc<FakeShared>,
}

impl FakePlatform {
    pub fn new(policy: AutoplayPolicy) -> Self {
        Self {
            shared: Rc::new(FakeShared::new(policy)),
        }
    }

    pub fn shared(&self) -> Rc<FakeShared> {
        Rc::clone(&self.shared)
    }
}

impl AudioPlatform for FakePlatform {
    type Element = FakeElement;
    type Context = FakeContext;

    fn probe(&self, source: &str) -> Result<(), SourceError> {
        if self.shared.reachable.get() {
            Ok(())
        } else {
            Err(SourceError::Unreachable(source.to_string()))
        }
    }

    fn open(&mut self, _source: &str) -> Result<FakeElement, SourceError> {
        self.shared.elements_opened.set(self.shared.elements_opened.get() + 1);
        self.shared.element_playing.set(false);
        Ok(FakeElement {
            shared: Rc::clone(&self.shared),
            paused: true,
            activated: false,
            released: false,
            reported_failure: false,
            events: VecDeque::new(),
        })
    }

    fn create_context(&mut self) -> Result<FakeContext, ContextError> {
        self.shared.contexts_created.set(self.shared.contexts_created.get() + 1);
        self.shared
            .context_state
            .set(self.shared.policy.get().initial_context_state());
        Ok(FakeContext {
            shared: Rc::clone(&self.shared),
            connected: false,
            activated: false,
        })
    }
}

pub(crate) struct FakeElement {
    shared: Rc<FakeShared>,
    paused: bool,
    activated: bool,
    released: bool,
    reported_failure: bool,
    events: VecDeque<MediaEvent>,
}

impl FakeElement {
    fn decoded(&self) -> bool {
        !self.released && self.shared.decode.get() == FakeDecode::Ready
    }
}

impl MediaElement for FakeElement {
    fn is_ready(&mut self) -> bool {
        self.decoded()
    }

    fn set_looping(&mut self, _looping: bool) {}

    fn set_volume(&mut self, _volume: f32) {}

    fn set_muted(&mut self, muted: bool) {
        self.shared.element_muted.set(muted);
    }

    fn is_muted(&self) -> bool {
        self.shared.element_muted.get()
    }

    fn play(&mut self, activation: Activation) -> Result<(), PlaybackError> {
        if !self.decoded() {
            return Err(PlaybackError::DecodeNotReady);
        }
        let policy = self.shared.policy.get();
        if !policy.allows_play(activation, self.is_muted(), self.activated) {
            return Err(PlaybackError::BlockedByPolicy);
        }
        if activation == Activation::Gesture {
            self.activated = true;
        }
        if self.paused {
            self.paused = false;
            self.events.push_back(MediaEvent::Playing);
        }
        self.shared.element_playing.set(true);
        Ok(())
    }

    fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            self.events.push_back(MediaEvent::Paused);
        }
        self.shared.element_playing.set(false);
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn release(&mut self) {
        self.paused = true;
        self.released = true;
        self.events.clear();
        self.shared.element_playing.set(false);
        self.shared.released.set(self.shared.released.get() + 1);
    }

    fn poll_event(&mut self) -> Option<MediaEvent> {
        if self.shared.decode.get() == FakeDecode::Fails && !self.reported_failure {
            self.reported_failure = true;
            self.events
                .push_back(MediaEvent::Error(SourceError::DecodeFailed("fake decode failure".to_string())));
        }
        self.events.pop_front()
    }
}

pub(crate) struct FakeContext {
    shared: Rc<FakeShared>,
    connected: bool,
    activated: bool,
}

#[async_trait(?Send)]
impl AnalysisContext for FakeContext {
    type Element = FakeElement;

    fn state(&self) -> ContextState {
        self.shared.context_state.get()
    }

    async fn resume(&mut self, activation: Activation) -> Result<(), ContextError> {
        match self.state() {
            ContextState::Closed => Err(ContextError::Closed),
            ContextState::Running => Ok(()),
            ContextState::Suspended => {
                if !self.shared.policy.get().allows_resume(activation, self.activated) {
                    return Err(ContextError::Suspended);
                }
                if activation == Activation::Gesture {
                    self.activated = true;
                }
                self.shared.context_state.set(ContextState::Running);
                Ok(())
            }
        }
    }

    fn suspend(&mut self) {
        if self.state() == ContextState::Running {
            self.shared.context_state.set(ContextState::Suspended);
        }
    }

    fn close(&mut self) {
        self.shared.context_state.set(ContextState::Closed);
        self.connected = false;
    }

    fn connect(&mut self, _element: &mut FakeElement) -> Result<(), ContextError> {
        if self.state() == ContextState::Closed {
            return Err(ContextError::Closed);
        }
        self.connected = true;
        Ok(())
    }

    fn sample_rate(&self) -> f32 {
        self.shared.sample_rate.get()
    }

    fn read_time_domain(&mut self, out: &mut [f32]) {
        let audible = self.connected
            && self.state() == ContextState::Running
            && self.shared.element_playing.get();
        if !audible {
            out.fill(0.0);
            return;
        }

        let (bin, amplitude) = self.shared.tone.get();
        let size = out.len() as f32;
        for (i, sample) in out.iter_mut().enumerate() {
            let phase = 2.0 * std::f32::consts::PI * bin as f32 * i as f32 / size;
            *sample = amplitude * phase.cos();
        }
    }
}
