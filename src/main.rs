use anyhow::{Context, Result};
use arrvee_signal::audio::ChannelGestureSource;
use arrvee_signal::{AnalyzerConfig, AnalyzerSession, AutoplayPolicy, Gesture, PlaybackState, RodioPlatform};
use clap::{Parser, ValueEnum};
use log::{info, warn};
use std::sync::Arc;
use winit::{
    event::{ElementState, Event, TouchPhase, WindowEvent},
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

#[derive(Parser)]
#[command(name = "arrvee-signal")]
#[command(about = "Play an audio file and print its live loudness and spectrum")]
struct Args {
    /// Audio file to analyse (MP3, WAV, M4A, OGG, etc.)
    #[arg()]
    input_file: String,

    /// JSON analyzer config; defaults are used when omitted
    #[arg(short, long)]
    config: Option<String>,

    /// Autoplay rules the output device should emulate
    #[arg(long, value_enum, default_value = "muted-only")]
    autoplay: AutoplayArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum AutoplayArg {
    Allow,
    MutedOnly,
    GestureRequired,
}

impl From<AutoplayArg> for AutoplayPolicy {
    fn from(arg: AutoplayArg) -> Self {
        match arg {
            AutoplayArg::Allow => AutoplayPolicy::Allow,
            AutoplayArg::MutedOnly => AutoplayPolicy::MutedOnly,
            AutoplayArg::GestureRequired => AutoplayPolicy::GestureRequired,
        }
    }
}

const TITLE: &str = "Arrvee Signal";

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    info!("Starting Arrvee Signal");

    let config = match &args.config {
        Some(path) => AnalyzerConfig::load(path).with_context(|| format!("loading config {}", path))?,
        None => AnalyzerConfig::default(),
    };

    // Session types hold the output stream and are not Send
    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build()?;

    let platform = RodioPlatform::new(args.autoplay.into());
    let mut session = AnalyzerSession::new(platform, ChannelGestureSource::new(), config);
    rt.block_on(session.start(&args.input_file))?;

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(TITLE)
            .with_inner_size(winit::dpi::LogicalSize::new(640, 360))
            .build(&event_loop)?,
    );

    let mut shown_state = None;
    let mut frame_count = 0u64;

    let window_clone = Arc::clone(&window);
    event_loop.run(move |event, elwt| {
        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => {
                    info!("Close requested");
                    session.shutdown();
                    elwt.exit();
                }
                WindowEvent::MouseInput {
                    state: ElementState::Pressed,
                    ..
                } => {
                    session.gestures_mut().emit(Gesture::Click);
                }
                WindowEvent::Touch(touch) if touch.phase == TouchPhase::Started => {
                    session.gestures_mut().emit(Gesture::TouchStart);
                }
                WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                    match event.physical_key {
                        PhysicalKey::Code(KeyCode::Escape) => {
                            info!("Escape pressed");
                            session.shutdown();
                            elwt.exit();
                        }
                        PhysicalKey::Code(KeyCode::Space) if !event.repeat => match session.state() {
                            PlaybackState::Running => session.pause(),
                            PlaybackState::Paused | PlaybackState::Suspended => {
                                rt.block_on(session.resume());
                            }
                            _ => session.gestures_mut().emit(Gesture::KeyPress),
                        },
                        _ => session.gestures_mut().emit(Gesture::KeyPress),
                    }
                }
                WindowEvent::RedrawRequested => {
                    if session.is_awaiting_gesture() && rt.block_on(session.poll_gestures()) {
                        info!("Audio started");
                    }

                    let state = session.state();
                    if shown_state != Some(state) {
                        let title = match state {
                            PlaybackState::AwaitingUserGesture => format!("{} - Click to start audio", TITLE),
                            PlaybackState::Paused => format!("{} - Paused", TITLE),
                            _ => TITLE.to_string(),
                        };
                        window_clone.set_title(&title);
                        shown_state = Some(state);
                    }

                    if let Some(signal) = session.tick() {
                        frame_count += 1;
                        if frame_count % 120 == 0 {
                            info!(
                                "vol {:.3} | bass {:.3} mid {:.3} treble {:.3} | {:.2} kHz{}",
                                signal.volume,
                                signal.bass,
                                signal.mid,
                                signal.treble,
                                signal.frequency,
                                if signal.is_playing { "" } else { " (idle)" }
                            );
                        }
                    }
                }
                _ => {}
            },
            Event::Suspended => {
                warn!("Application suspended, suspending audio");
                session.suspend_context();
            }
            Event::Resumed => {
                if matches!(session.state(), PlaybackState::Suspended) && !rt.block_on(session.resume()) {
                    info!("Audio needs a click to resume");
                }
            }
            Event::LoopExiting => {
                if session.state() != PlaybackState::Closed {
                    session.shutdown();
                }
            }
            Event::AboutToWait => {
                window_clone.request_redraw();
            }
            _ => {}
        }
    })?;

    Ok(())
}
