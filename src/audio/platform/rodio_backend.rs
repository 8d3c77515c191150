use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait};
use crossbeam_channel::{Receiver, TryRecvError};
use log::{debug, info, warn};
use rodio::buffer::SamplesBuffer;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{
    Activation, AnalysisContext, AudioPlatform, AutoplayPolicy, ContextState, MediaElement, MediaEvent,
};
use crate::audio::error::{ContextError, PlaybackError, SourceError};

const DEFAULT_SAMPLE_RATE: f32 = 44100.0;

/// Native platform: files decoded with rodio, played on the default output.
pub struct RodioPlatform {
    policy: AutoplayPolicy,
}

impl RodioPlatform {
    pub fn new(policy: AutoplayPolicy) -> Self {
        Self { policy }
    }
}

impl AudioPlatform for RodioPlatform {
    type Element = RodioElement;
    type Context = RodioContext;

    fn probe(&self, source: &str) -> Result<(), SourceError> {
        let metadata = std::fs::metadata(source)
            .map_err(|e| SourceError::Unreachable(format!("{}: {}", source, e)))?;
        if !metadata.is_file() {
            return Err(SourceError::Unreachable(format!("{}: not a file", source)));
        }
        Ok(())
    }

    fn open(&mut self, source: &str) -> Result<RodioElement, SourceError> {
        let file = File::open(source).map_err(|e| SourceError::Unreachable(format!("{}: {}", source, e)))?;
        let (sender, receiver) = crossbeam_channel::bounded(1);

        std::thread::Builder::new()
            .name("decoder".to_string())
            .spawn(move || {
                if sender.send(decode(file)).is_err() {
                    debug!("Decoder result dropped, element released early");
                }
            })
            .map_err(|e| SourceError::DecodeFailed(format!("cannot spawn decoder: {}", e)))?;

        Ok(RodioElement::new(source, receiver, self.policy))
    }

    fn create_context(&mut self) -> Result<RodioContext, ContextError> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| ContextError::Unavailable(e.to_string()))?;

        if let Some(device) = cpal::default_host().default_output_device() {
            info!("Using audio device: {}", device.name().unwrap_or_else(|_| "Unknown".to_string()));
        }

        Ok(RodioContext {
            stream: Some(stream),
            handle,
            shared: Rc::new(ContextShared::new(self.policy.initial_context_state())),
            policy: self.policy,
            activated: false,
        })
    }
}

struct DecodedAudio {
    channels: u16,
    sample_rate: u32,
    samples: Vec<f32>,
    mono: Vec<f32>,
}

impl DecodedAudio {
    fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.mono.len() as f64 / self.sample_rate as f64)
    }
}

fn decode(file: File) -> Result<DecodedAudio, SourceError> {
    let source = Decoder::new(BufReader::new(file)).map_err(|e| SourceError::DecodeFailed(e.to_string()))?;
    let channels = source.channels();
    let sample_rate = source.sample_rate();

    let samples: Vec<f32> = source.convert_samples().collect();
    if channels == 0 || sample_rate == 0 || samples.is_empty() {
        return Err(SourceError::DecodeFailed("no audio samples".to_string()));
    }

    // Mix to mono for analysis
    let mono = samples
        .chunks_exact(channels as usize)
        .map(|chunk| chunk.iter().sum::<f32>() / channels as f32)
        .collect();

    Ok(DecodedAudio {
        channels,
        sample_rate,
        samples,
        mono,
    })
}

#[derive(Debug, Default)]
struct PlayClock {
    accumulated: Duration,
    started: Option<Instant>,
}

impl PlayClock {
    fn starting_at(offset: Duration) -> Self {
        Self {
            accumulated: offset,
            started: None,
        }
    }

    fn start(&mut self) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    fn stop(&mut self) {
        if let Some(started) = self.started.take() {
            self.accumulated += started.elapsed();
        }
    }

    fn elapsed(&self) -> Duration {
        self.accumulated + self.started.map_or(Duration::ZERO, |s| s.elapsed())
    }
}

/// A sink playing one element on one context.
struct Output {
    sink: Sink,
    audio: Arc<DecodedAudio>,
    clock: RefCell<PlayClock>,
    wants_play: Cell<bool>,
    looping: bool,
}

impl Output {
    fn apply(&self, context_running: bool) {
        if self.wants_play.get() && context_running {
            self.sink.play();
            self.clock.borrow_mut().start();
        } else {
            self.sink.pause();
            self.clock.borrow_mut().stop();
        }
    }

    fn audible(&self, context_running: bool) -> bool {
        self.wants_play.get() && context_running
    }

    fn position_frames(&self) -> usize {
        let frames = (self.clock.borrow().elapsed().as_secs_f64() * self.audio.sample_rate as f64) as usize;
        let len = self.audio.mono.len();
        if self.looping && len > 0 {
            frames % len
        } else {
            frames.min(len)
        }
    }

    fn finished(&self) -> bool {
        !self.looping && self.clock.borrow().elapsed() >= self.audio.duration()
    }

    fn read(&self, out: &mut [f32]) {
        let mono = &self.audio.mono;
        let len = mono.len() as isize;
        let end = self.position_frames() as isize;
        let start = end - out.len() as isize;

        for (i, slot) in out.iter_mut().enumerate() {
            let index = start + i as isize;
            *slot = if index >= 0 {
                mono[index as usize]
            } else if self.looping && len > 0 && self.clock.borrow().elapsed() >= self.audio.duration() {
                mono[(index.rem_euclid(len)) as usize]
            } else {
                0.0
            };
        }
    }
}

/// State a context shares with the elements connected to it.
struct ContextShared {
    state: Cell<ContextState>,
    outputs: RefCell<Vec<Weak<Output>>>,
}

impl ContextShared {
    fn new(state: ContextState) -> Self {
        Self {
            state: Cell::new(state),
            outputs: RefCell::new(Vec::new()),
        }
    }

    fn is_running(&self) -> bool {
        self.state.get() == ContextState::Running
    }

    fn set_state(&self, state: ContextState) {
        self.state.set(state);
        let running = self.is_running();
        let mut outputs = self.outputs.borrow_mut();
        outputs.retain(|output| output.strong_count() > 0);
        for output in outputs.iter().filter_map(Weak::upgrade) {
            output.apply(running);
        }
    }

    /// Track a new output, forgetting any that were dropped
    fn register(&self, output: &Rc<Output>) {
        let mut outputs = self.outputs.borrow_mut();
        outputs.retain(|o| o.strong_count() > 0);
        outputs.push(Rc::downgrade(output));
    }

    fn current_output(&self) -> Option<Rc<Output>> {
        self.outputs.borrow().iter().find_map(Weak::upgrade)
    }
}

#[derive(Clone)]
struct Attachment {
    handle: OutputStreamHandle,
    shared: Rc<ContextShared>,
}

/// Decoded file plus its playback controls.
pub struct RodioElement {
    source: String,
    decoded: Option<Receiver<Result<DecodedAudio, SourceError>>>,
    audio: Option<Arc<DecodedAudio>>,
    attachment: Option<Attachment>,
    output: Option<Rc<Output>>,
    resume_at: Duration,

    looping: bool,
    volume: f32,
    muted: bool,
    paused: bool,
    ended: bool,
    activated: bool,
    policy: AutoplayPolicy,
    events: VecDeque<MediaEvent>,
}

impl RodioElement {
    fn new(source: &str, decoded: Receiver<Result<DecodedAudio, SourceError>>, policy: AutoplayPolicy) -> Self {
        Self {
            source: source.to_string(),
            decoded: Some(decoded),
            audio: None,
            attachment: None,
            output: None,
            resume_at: Duration::ZERO,
            looping: false,
            volume: 1.0,
            muted: false,
            paused: true,
            ended: false,
            activated: false,
            policy,
            events: VecDeque::new(),
        }
    }

    fn poll_decoder(&mut self) {
        let Some(receiver) = &self.decoded else {
            return;
        };

        match receiver.try_recv() {
            Ok(Ok(audio)) => {
                info!(
                    "Decoded audio file: {} ({}Hz, {} channels, {} samples)",
                    self.source,
                    audio.sample_rate,
                    audio.channels,
                    audio.mono.len()
                );
                self.audio = Some(Arc::new(audio));
                self.decoded = None;
                self.build_output();
            }
            Ok(Err(e)) => {
                warn!("Failed to decode {}: {}", self.source, e);
                self.events.push_back(MediaEvent::Error(e));
                self.decoded = None;
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                self.events
                    .push_back(MediaEvent::Error(SourceError::DecodeFailed("decoder stopped".to_string())));
                self.decoded = None;
            }
        }
    }

    fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }

    fn position(&self) -> Duration {
        self.output
            .as_ref()
            .map_or(self.resume_at, |output| output.clock.borrow().elapsed())
    }

    fn context_running(&self) -> bool {
        self.attachment.as_ref().map_or(false, |a| a.shared.is_running())
    }

    fn drop_output(&mut self) {
        if let Some(output) = self.output.take() {
            output.clock.borrow_mut().stop();
            self.resume_at = output.clock.borrow().elapsed();
            output.sink.stop();
        }
    }

    fn build_output(&mut self) {
        let (Some(audio), Some(attachment)) = (self.audio.clone(), self.attachment.clone()) else {
            return;
        };

        let sink = match Sink::try_new(&attachment.handle) {
            Ok(sink) => sink,
            Err(e) => {
                warn!("Cannot create sink for {}: {}", self.source, e);
                return;
            }
        };

        let buffer = SamplesBuffer::new(audio.channels, audio.sample_rate, audio.samples.clone());
        let duration = audio.duration();
        if self.looping {
            let offset = if duration.is_zero() {
                Duration::ZERO
            } else {
                Duration::from_secs_f64(self.resume_at.as_secs_f64() % duration.as_secs_f64())
            };
            sink.append(buffer.repeat_infinite().skip_duration(offset));
        } else {
            sink.append(buffer.skip_duration(self.resume_at));
        }
        sink.set_volume(self.effective_volume());
        sink.pause();

        let output = Rc::new(Output {
            sink,
            audio,
            clock: RefCell::new(PlayClock::starting_at(self.resume_at)),
            wants_play: Cell::new(!self.paused),
            looping: self.looping,
        });
        output.apply(attachment.shared.is_running());
        attachment.shared.register(&output);
        self.output = Some(output);
    }

    fn attach(&mut self, attachment: Attachment) {
        self.drop_output();
        self.attachment = Some(attachment);
        self.build_output();
    }
}

impl MediaElement for RodioElement {
    fn is_ready(&mut self) -> bool {
        self.poll_decoder();
        self.audio.is_some()
    }

    fn set_looping(&mut self, looping: bool) {
        if self.looping != looping {
            self.looping = looping;
            // Rebuild so the sink picks up the new repeat mode
            if self.output.is_some() {
                self.drop_output();
                self.build_output();
            }
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(output) = &self.output {
            output.sink.set_volume(self.effective_volume());
        }
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        if let Some(output) = &self.output {
            output.sink.set_volume(self.effective_volume());
        }
    }

    fn is_muted(&self) -> bool {
        self.muted
    }

    fn play(&mut self, activation: Activation) -> Result<(), PlaybackError> {
        self.poll_decoder();
        if self.audio.is_none() {
            return Err(PlaybackError::DecodeNotReady);
        }
        if !self.policy.allows_play(activation, self.muted, self.activated) {
            return Err(PlaybackError::BlockedByPolicy);
        }
        if activation == Activation::Gesture {
            self.activated = true;
        }

        if self.ended {
            self.ended = false;
            self.resume_at = Duration::ZERO;
            if self.output.is_some() {
                self.drop_output();
                self.resume_at = Duration::ZERO;
                self.build_output();
            }
        }

        if self.paused {
            self.paused = false;
            self.events.push_back(MediaEvent::Playing);
            info!("Audio playback started");
        }

        let running = self.context_running();
        if let Some(output) = &self.output {
            output.wants_play.set(true);
            output.apply(running);
        }
        Ok(())
    }

    fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            self.events.push_back(MediaEvent::Paused);
            info!("Audio playback paused");
        }

        let running = self.context_running();
        if let Some(output) = &self.output {
            output.wants_play.set(false);
            output.apply(running);
        }
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn release(&mut self) {
        self.paused = true;
        self.drop_output();
        self.attachment = None;
        self.audio = None;
        self.decoded = None;
        self.events.clear();
        info!("Released audio source: {}", self.source);
    }

    fn poll_event(&mut self) -> Option<MediaEvent> {
        self.poll_decoder();

        if !self.paused && !self.ended {
            if let Some(output) = &self.output {
                if output.finished() {
                    self.ended = true;
                    self.paused = true;
                    output.wants_play.set(false);
                    output.apply(false);
                    self.events.push_back(MediaEvent::Ended);
                }
            }
        }

        self.events.pop_front()
    }
}

/// Default output stream acting as the analysis context.
pub struct RodioContext {
    stream: Option<OutputStream>,
    handle: OutputStreamHandle,
    shared: Rc<ContextShared>,
    policy: AutoplayPolicy,
    activated: bool,
}

#[async_trait(?Send)]
impl AnalysisContext for RodioContext {
    type Element = RodioElement;

    fn state(&self) -> ContextState {
        self.shared.state.get()
    }

    async fn resume(&mut self, activation: Activation) -> Result<(), ContextError> {
        match self.state() {
            ContextState::Closed => Err(ContextError::Closed),
            ContextState::Running => Ok(()),
            ContextState::Suspended => {
                if !self.policy.allows_resume(activation, self.activated) {
                    return Err(ContextError::Suspended);
                }
                if activation == Activation::Gesture {
                    self.activated = true;
                }
                self.shared.set_state(ContextState::Running);
                info!("Audio output resumed");
                Ok(())
            }
        }
    }

    fn suspend(&mut self) {
        if self.state() == ContextState::Running {
            self.shared.set_state(ContextState::Suspended);
            info!("Audio output suspended");
        }
    }

    fn close(&mut self) {
        self.shared.set_state(ContextState::Closed);
        self.shared.outputs.borrow_mut().clear();
        self.stream = None;
        info!("Audio output closed");
    }

    fn connect(&mut self, element: &mut RodioElement) -> Result<(), ContextError> {
        if self.state() == ContextState::Closed || self.stream.is_none() {
            return Err(ContextError::Closed);
        }
        element.attach(Attachment {
            handle: self.handle.clone(),
            shared: Rc::clone(&self.shared),
        });
        Ok(())
    }

    fn sample_rate(&self) -> f32 {
        self.shared
            .current_output()
            .map_or(DEFAULT_SAMPLE_RATE, |output| output.audio.sample_rate as f32)
    }

    fn read_time_domain(&mut self, out: &mut [f32]) {
        match self.shared.current_output() {
            Some(output) if output.audible(self.shared.is_running()) => output.read(out),
            _ => out.fill(0.0),
        }
    }
}
