use crossbeam_channel::Sender;
use log::warn;

/// Global interaction events that may satisfy an autoplay policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gesture {
    Click,
    KeyPress,
    TouchStart,
    PointerDown,
    PointerMove,
    Scroll,
}

impl Gesture {
    /// Whether the platform counts this as user activation
    pub fn is_qualifying(self) -> bool {
        matches!(
            self,
            Gesture::Click | Gesture::KeyPress | Gesture::TouchStart | Gesture::PointerDown
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Document-level interaction surface.
///
/// Subscribers receive every gesture on their channel until unsubscribed.
pub trait GestureSource {
    fn subscribe(&mut self, sender: Sender<Gesture>) -> ListenerId;
    fn unsubscribe(&mut self, id: ListenerId);
}

/// Fan-out gesture source fed by the host's event loop.
#[derive(Default)]
pub struct ChannelGestureSource {
    next_id: u64,
    listeners: Vec<(ListenerId, Sender<Gesture>)>,
}

impl ChannelGestureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, gesture: Gesture) {
        self.listeners.retain(|(id, sender)| {
            if sender.send(gesture).is_err() {
                warn!("Dropping disconnected gesture listener {:?}", id);
                false
            } else {
                true
            }
        });
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl GestureSource for ChannelGestureSource {
    fn subscribe(&mut self, sender: Sender<Gesture>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, sender));
        id
    }

    fn unsubscribe(&mut self, id: ListenerId) {
        self.listeners.retain(|(listener, _)| *listener != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_reaches_subscribers_until_unsubscribed() {
        let mut source = ChannelGestureSource::new();
        let (tx, rx) = crossbeam_channel::unbounded();
        let id = source.subscribe(tx);

        source.emit(Gesture::Click);
        assert_eq!(rx.try_recv(), Ok(Gesture::Click));

        source.unsubscribe(id);
        source.emit(Gesture::KeyPress);
        assert!(rx.try_recv().is_err());
        assert_eq!(source.listener_count(), 0);
    }

    #[test]
    fn test_disconnected_listener_is_dropped() {
        let mut source = ChannelGestureSource::new();
        let (tx, rx) = crossbeam_channel::unbounded();
        source.subscribe(tx);
        drop(rx);
        source.emit(Gesture::TouchStart);
        assert_eq!(source.listener_count(), 0);
    }

    #[test]
    fn test_qualifying_kinds() {
        assert!(Gesture::PointerDown.is_qualifying());
        assert!(!Gesture::PointerMove.is_qualifying());
        assert!(!Gesture::Scroll.is_qualifying());
    }
}
