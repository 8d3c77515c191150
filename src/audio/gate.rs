use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::gesture::ListenerId;

/// Lifecycle of one analyzer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackState {
    Uninitialized,
    AwaitingUserGesture,
    Starting,
    Running,
    Paused,
    Suspended,
    Closed,
}

impl PlaybackState {
    pub fn is_running(self) -> bool {
        self == PlaybackState::Running
    }

    pub fn is_awaiting_gesture(self) -> bool {
        self == PlaybackState::AwaitingUserGesture
    }

    /// Transition table. `None` means the event does not apply in this state.
    pub fn next(self, event: GateEvent) -> Option<PlaybackState> {
        use GateEvent as E;
        use PlaybackState as S;

        match (self, event) {
            (_, E::TornDown) => Some(S::Closed),

            (S::Uninitialized | S::Closed, E::Initialized) => Some(S::Starting),

            (S::Starting, E::AutoplayStarted { context_running: true }) => Some(S::Running),
            (S::Starting, E::AutoplayStarted { context_running: false }) => Some(S::AwaitingUserGesture),
            (S::Starting, E::AutoplayBlocked) => Some(S::AwaitingUserGesture),

            (S::AwaitingUserGesture, E::GestureUnlocked) => Some(S::Running),

            (S::Running, E::Paused) => Some(S::Paused),
            (S::Paused | S::Suspended, E::Resumed) => Some(S::Running),
            (S::Paused | S::Suspended, E::ResumeNeedsGesture) => Some(S::AwaitingUserGesture),

            (S::Starting | S::Running, E::ContextSuspended) => Some(S::Suspended),

            _ => None,
        }
    }
}

/// Inputs driving the gate, raised by the source manager and the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateEvent {
    Initialized,
    AutoplayStarted { context_running: bool },
    AutoplayBlocked,
    GestureUnlocked,
    Paused,
    Resumed,
    ResumeNeedsGesture,
    /// Platform suspended the context outside of an explicit pause
    ContextSuspended,
    TornDown,
}

/// Owns the session's `PlaybackState` and publishes every change.
pub struct PlaybackGate {
    state: PlaybackState,
    listener: Option<ListenerId>,
    status: watch::Sender<PlaybackState>,
}

impl PlaybackGate {
    pub fn new() -> Self {
        let (status, _) = watch::channel(PlaybackState::Uninitialized);
        Self {
            state: PlaybackState::Uninitialized,
            listener: None,
            status,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Observable status, e.g. for a "click to start audio" prompt
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.status.subscribe()
    }

    /// Apply an event; returns whether the state changed
    pub fn handle(&mut self, event: GateEvent) -> bool {
        match self.state.next(event) {
            Some(next) if next != self.state => {
                debug!("Playback gate: {:?} -> {:?} ({:?})", self.state, next, event);
                self.state = next;
                self.status.send_replace(next);
                true
            }
            Some(_) => false,
            None => {
                debug!("Playback gate ignored {:?} in {:?}", event, self.state);
                false
            }
        }
    }

    pub fn listener(&self) -> Option<ListenerId> {
        self.listener
    }

    pub fn set_listener(&mut self, listener: ListenerId) {
        self.listener = Some(listener);
    }

    pub fn take_listener(&mut self) -> Option<ListenerId> {
        self.listener.take()
    }
}

impl Default for PlaybackGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_event() -> impl Strategy<Value = GateEvent> {
        prop_oneof![
            Just(GateEvent::Initialized),
            any::<bool>().prop_map(|context_running| GateEvent::AutoplayStarted { context_running }),
            Just(GateEvent::AutoplayBlocked),
            Just(GateEvent::GestureUnlocked),
            Just(GateEvent::Paused),
            Just(GateEvent::Resumed),
            Just(GateEvent::ResumeNeedsGesture),
            Just(GateEvent::ContextSuspended),
            Just(GateEvent::TornDown),
        ]
    }

    #[test]
    fn test_muted_autoplay_path() {
        let mut gate = PlaybackGate::new();
        assert!(gate.handle(GateEvent::Initialized));
        assert!(gate.handle(GateEvent::AutoplayStarted { context_running: false }));
        assert_eq!(gate.state(), PlaybackState::AwaitingUserGesture);
        assert!(gate.handle(GateEvent::GestureUnlocked));
        assert!(gate.is_running());
    }

    #[test]
    fn test_pause_resume_and_suspend() {
        let mut gate = PlaybackGate::new();
        gate.handle(GateEvent::Initialized);
        gate.handle(GateEvent::AutoplayStarted { context_running: true });
        assert!(gate.is_running());

        gate.handle(GateEvent::Paused);
        assert_eq!(gate.state(), PlaybackState::Paused);
        // Explicit pause is not a platform suspension
        assert!(!gate.handle(GateEvent::ContextSuspended));
        gate.handle(GateEvent::Resumed);
        assert!(gate.is_running());

        gate.handle(GateEvent::ContextSuspended);
        assert_eq!(gate.state(), PlaybackState::Suspended);
        gate.handle(GateEvent::ResumeNeedsGesture);
        assert_eq!(gate.state(), PlaybackState::AwaitingUserGesture);
    }

    #[test]
    fn test_closed_only_restarts_through_initialize() {
        let mut gate = PlaybackGate::new();
        gate.handle(GateEvent::Initialized);
        gate.handle(GateEvent::TornDown);
        assert_eq!(gate.state(), PlaybackState::Closed);

        for event in [GateEvent::GestureUnlocked, GateEvent::Resumed, GateEvent::AutoplayBlocked] {
            assert!(!gate.handle(event));
        }
        assert!(gate.handle(GateEvent::Initialized));
        assert_eq!(gate.state(), PlaybackState::Starting);
    }

    #[test]
    fn test_status_is_published() {
        let mut gate = PlaybackGate::new();
        let mut status = gate.subscribe();
        gate.handle(GateEvent::Initialized);
        gate.handle(GateEvent::AutoplayBlocked);
        assert!(status.has_changed().unwrap());
        assert!(status.borrow_and_update().is_awaiting_gesture());
    }

    proptest! {
        #[test]
        fn running_requires_starting(events in prop::collection::vec(any_event(), 0..64)) {
            let mut state = PlaybackState::Uninitialized;
            let mut seen_starting = false;
            for event in events {
                if let Some(next) = state.next(event) {
                    state = next;
                }
                seen_starting |= state == PlaybackState::Starting;
                if state == PlaybackState::Running {
                    prop_assert!(seen_starting);
                }
            }
        }

        #[test]
        fn one_gesture_unlocks(prefix in prop::collection::vec(any_event(), 0..32)) {
            let mut state = PlaybackState::Uninitialized;
            for event in prefix {
                if let Some(next) = state.next(event) {
                    state = next;
                }
            }
            if state == PlaybackState::AwaitingUserGesture {
                prop_assert_eq!(state.next(GateEvent::GestureUnlocked), Some(PlaybackState::Running));
            }
        }
    }
}
