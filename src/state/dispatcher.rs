//! Listener registry for engine events (pub-sub)

use tracing::debug;

use crate::state::events::{EngineEvent, EventKind};

/// Trait for components that subscribe to engine events
pub trait EngineSubscriber: Send {
    fn on_event(&mut self, event: &EngineEvent);

    /// Subscriber name for debugging
    fn name(&self) -> &str;
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Adapts a closure listening to a single event kind
struct FnSubscriber<F> {
    name: String,
    kind: EventKind,
    callback: F,
}

impl<F> EngineSubscriber for FnSubscriber<F>
where
    F: FnMut(&EngineEvent) + Send,
{
    fn on_event(&mut self, event: &EngineEvent) {
        if event.kind() == self.kind {
            (self.callback)(event);
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Fans events out to subscribers in registration order
pub struct EventDispatcher {
    subscribers: Vec<(SubscriptionId, Box<dyn EngineSubscriber>)>,
    next_id: u64,

    /// Event history for debugging
    event_history: Vec<String>,

    /// Maximum event history size
    max_history: usize,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
            next_id: 0,
            event_history: Vec::new(),
            max_history: 100,
        }
    }

    pub fn subscribe(&mut self, subscriber: Box<dyn EngineSubscriber>) -> SubscriptionId {
        debug!(target: "engine", "Adding subscriber: {}", subscriber.name());
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscribers.push((id, subscriber));
        id
    }

    /// Register a closure for one kind of event
    pub fn subscribe_fn<F>(&mut self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: FnMut(&EngineEvent) + Send + 'static,
    {
        self.subscribe(Box::new(FnSubscriber {
            name: format!("{:?} listener", kind),
            kind,
            callback,
        }))
    }

    /// Returns false if the id was not registered
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub_id, _)| *sub_id != id);
        self.subscribers.len() != before
    }

    pub fn dispatch(&mut self, event: EngineEvent) {
        let summary = event.summary();
        debug!(target: "engine", "Dispatching {}", summary);

        self.event_history.push(summary);
        if self.event_history.len() > self.max_history {
            self.event_history.remove(0);
        }

        for (_, subscriber) in &mut self.subscribers {
            subscriber.on_event(&event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Get event history for debugging
    pub fn get_event_history(&self) -> &[String] {
        &self.event_history
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::datatable::RowId;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_closure_listeners_only_see_their_kind() {
        let mut dispatcher = EventDispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        dispatcher.subscribe_fn(EventKind::RowActivated, move |event| {
            if let EngineEvent::RowActivated(id) = event {
                sink.lock().unwrap().push(id.clone());
            }
        });

        dispatcher.dispatch(EngineEvent::SelectionChanged(vec![RowId::from(1)]));
        dispatcher.dispatch(EngineEvent::RowActivated(RowId::from(2)));

        assert_eq!(*seen.lock().unwrap(), vec![RowId::from(2)]);
        assert_eq!(dispatcher.get_event_history().len(), 2);
    }

    #[test]
    fn test_unsubscribe() {
        let mut dispatcher = EventDispatcher::new();
        let id = dispatcher.subscribe_fn(EventKind::ViewChanged, |_| {});
        assert_eq!(dispatcher.subscriber_count(), 1);
        assert!(dispatcher.unsubscribe(id));
        assert!(!dispatcher.unsubscribe(id));
    }

    #[test]
    fn test_history_is_bounded() {
        let mut dispatcher = EventDispatcher::new();
        for i in 0..150 {
            dispatcher.dispatch(EngineEvent::RowActivated(RowId::from(i)));
        }
        let history = dispatcher.get_event_history();
        assert_eq!(history.len(), 100);
        assert_eq!(history[0], "RowActivated: 50");
    }
}
