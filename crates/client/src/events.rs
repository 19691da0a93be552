//! Typed publish/subscribe fan-out for UI consumers.
//!
//! Subscribers register per event kind and receive an opaque handle;
//! removal by handle is idempotent so UI teardown code can call it
//! without caring whether the listener is still registered.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chatline_protocol::frames::ServerFrame;
use chatline_protocol::types::ChatMessage;

/// Opaque handle identifying one subscription.
pub type SubscriptionId = u64;

/// Event kinds a consumer can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The socket opened.
    Opened,
    /// The socket closed.
    Closed,
    /// Any decoded server frame.
    Frame,
    /// A chat message addressed to this client arrived.
    NewMessage,
    /// The server acknowledged a message this client sent.
    MessageSent,
    /// A peer read a message this client sent.
    MessageRead,
}

/// Events delivered to subscribers.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    Opened,
    Closed,
    Frame(ServerFrame),
    NewMessage(ChatMessage),
    MessageSent(ChatMessage),
    MessageRead { message_id: String },
}

impl ClientEvent {
    /// The kind this event is delivered under.
    pub fn kind(&self) -> EventKind {
        match self {
            ClientEvent::Opened => EventKind::Opened,
            ClientEvent::Closed => EventKind::Closed,
            ClientEvent::Frame(_) => EventKind::Frame,
            ClientEvent::NewMessage(_) => EventKind::NewMessage,
            ClientEvent::MessageSent(_) => EventKind::MessageSent,
            ClientEvent::MessageRead { .. } => EventKind::MessageRead,
        }
    }
}

type Callback = Arc<dyn Fn(&ClientEvent) + Send + Sync>;

/// Subscription registry keyed by event kind.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    subscribers: RwLock<HashMap<EventKind, Vec<(SubscriptionId, Callback)>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback for one event kind.
    pub fn on<F>(&self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.subscribers
            .write()
            .unwrap()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    /// Removes a subscription by handle. No-op if it was never
    /// registered or was already removed.
    pub fn off(&self, id: SubscriptionId) {
        let mut map = self.subscribers.write().unwrap();
        for subs in map.values_mut() {
            subs.retain(|(sub_id, _)| *sub_id != id);
        }
    }

    /// Delivers an event to every subscriber of its kind.
    ///
    /// Callbacks are cloned out of the lock before invocation so a
    /// handler may subscribe or unsubscribe without deadlocking.
    pub(crate) fn emit(&self, event: &ClientEvent) {
        let callbacks: Vec<Callback> = {
            let map = self.subscribers.read().unwrap();
            match map.get(&event.kind()) {
                Some(subs) => subs.iter().map(|(_, cb)| cb.clone()).collect(),
                None => return,
            }
        };
        for callback in callbacks {
            callback(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn on_and_emit_delivers_to_matching_kind() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_opened = seen.clone();
        bus.on(EventKind::Opened, move |_| {
            seen_opened.lock().unwrap().push("opened");
        });
        let seen_closed = seen.clone();
        bus.on(EventKind::Closed, move |_| {
            seen_closed.lock().unwrap().push("closed");
        });

        bus.emit(&ClientEvent::Opened);
        assert_eq!(*seen.lock().unwrap(), vec!["opened"]);
    }

    #[test]
    fn off_removes_subscription() {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));

        let c = count.clone();
        let id = bus.on(EventKind::Opened, move |_| {
            *c.lock().unwrap() += 1;
        });

        bus.emit(&ClientEvent::Opened);
        bus.off(id);
        bus.emit(&ClientEvent::Opened);

        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn off_is_idempotent() {
        let bus = EventBus::new();
        let id = bus.on(EventKind::Closed, |_| {});
        bus.off(id);
        bus.off(id);
        // Removing a handle that never existed is fine too.
        bus.off(9999);
    }

    #[test]
    fn unsubscribe_from_within_handler_does_not_deadlock() {
        let bus = Arc::new(EventBus::new());
        let bus2 = bus.clone();
        let id_slot = Arc::new(Mutex::new(None::<SubscriptionId>));
        let slot = id_slot.clone();

        let id = bus.on(EventKind::Opened, move |_| {
            if let Some(id) = slot.lock().unwrap().take() {
                bus2.off(id);
            }
        });
        *id_slot.lock().unwrap() = Some(id);

        bus.emit(&ClientEvent::Opened);
        bus.emit(&ClientEvent::Opened);
    }

    #[test]
    fn multiple_subscribers_same_kind() {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));

        for _ in 0..3 {
            let c = count.clone();
            bus.on(EventKind::NewMessage, move |event| {
                assert!(matches!(event, ClientEvent::NewMessage(_)));
                *c.lock().unwrap() += 1;
            });
        }

        let message = ChatMessage {
            id: "m-1".into(),
            sender_id: "1".into(),
            receiver_id: "2".into(),
            content: "hi".into(),
            read: false,
            created_at: "2026-01-15T10:30:00Z".parse().unwrap(),
        };
        bus.emit(&ClientEvent::NewMessage(message));
        assert_eq!(*count.lock().unwrap(), 3);
    }
}
