//! Thread-safe dispatch from the bridge worker to the UI thread
//!
//! The worker never touches widget state. It posts [`UiEvent`]s into an
//! unbounded FIFO channel and the UI drains them in order.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::trace;

use crate::StatusAction;

/// A visible mutation requested by the bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// Module output, appended to the conversation log as-is
    Output(String),
    /// Module log line, appended with the log marker
    Log(String),
    /// The module is blocked on a question
    AwaitingInput(String),
    /// Show or hide the busy spinner
    Status(StatusAction),
}

impl UiEvent {
    /// Whether applying this event adds a line to the conversation log
    pub fn appends_to_log(&self) -> bool {
        !matches!(self, UiEvent::Status(_))
    }
}

/// Sending half, cloned into every callback
#[derive(Debug, Clone)]
pub struct UiDispatcher {
    tx: UnboundedSender<UiEvent>,
}

/// Receiving half, owned by the UI
#[derive(Debug)]
pub struct UiEvents {
    rx: UnboundedReceiver<UiEvent>,
}

/// Create a connected dispatcher/receiver pair
pub fn channel() -> (UiDispatcher, UiEvents) {
    let (tx, rx) = mpsc::unbounded_channel();
    (UiDispatcher { tx }, UiEvents { rx })
}

impl UiDispatcher {
    /// Post an event. Events sent after the UI has gone away are dropped.
    pub fn post(&self, event: UiEvent) {
        if let Err(err) = self.tx.send(event) {
            trace!("UI gone, dropping {:?}", err.0);
        }
    }
}

impl UiEvents {
    /// Wait for the next event. `None` once every dispatcher is dropped.
    pub async fn next(&mut self) -> Option<UiEvent> {
        self.rx.recv().await
    }

    /// Take the next event without waiting, if one is queued.
    pub fn try_next(&mut self) -> Option<UiEvent> {
        self.rx.try_recv().ok()
    }

    /// Drain everything queued so far, without waiting.
    pub fn drain(&mut self) -> Vec<UiEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_arrive_in_order() {
        let (dispatcher, mut events) = channel();
        dispatcher.post(UiEvent::Output("A".into()));
        dispatcher.post(UiEvent::Status(StatusAction::Start));
        dispatcher.post(UiEvent::Log("B".into()));

        assert_eq!(
            events.drain(),
            vec![
                UiEvent::Output("A".into()),
                UiEvent::Status(StatusAction::Start),
                UiEvent::Log("B".into()),
            ]
        );
    }

    #[test]
    fn test_only_status_leaves_log_alone() {
        assert!(UiEvent::Output(String::new()).appends_to_log());
        assert!(UiEvent::Log("x".into()).appends_to_log());
        assert!(UiEvent::AwaitingInput("Name?".into()).appends_to_log());
        assert!(!UiEvent::Status(StatusAction::Start).appends_to_log());
        assert!(!UiEvent::Status(StatusAction::Stop).appends_to_log());
    }

    #[test]
    fn test_drain_stops_at_empty_queue() {
        let (dispatcher, mut events) = channel();
        assert!(events.drain().is_empty());

        dispatcher.post(UiEvent::Output("A".into()));
        assert_eq!(events.try_next(), Some(UiEvent::Output("A".into())));
        assert_eq!(events.try_next(), None);

        // Still connected: later posts are picked up by the next drain
        dispatcher.post(UiEvent::Log("B".into()));
        assert_eq!(events.drain(), vec![UiEvent::Log("B".into())]);
    }

    #[test]
    fn test_post_after_receiver_dropped() {
        let (dispatcher, events) = channel();
        drop(events);
        dispatcher.post(UiEvent::Output("lost".into()));
    }

    #[tokio::test]
    async fn test_next_ends_when_dispatchers_dropped() {
        let (dispatcher, mut events) = channel();
        let clone = dispatcher.clone();
        clone.post(UiEvent::Log("x".into()));
        drop(dispatcher);
        drop(clone);

        assert_eq!(events.next().await, Some(UiEvent::Log("x".into())));
        assert_eq!(events.next().await, None);
    }
}
