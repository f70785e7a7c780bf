//! Typed broadcast channels for engine observers.
//!
//! One channel per event category; subscribers receive only events published
//! after subscription (no replay).  A lagging subscriber loses the oldest
//! events, never blocks a publisher.

use tokio::sync::broadcast;

use courrier_shared::update::{
    MessageUpdate, PeerDeleting, PeerUpdate, SendErrorEvent, SentMsg, WriteText,
};

/// Buffer size for each broadcast channel.
const CHANNEL_CAPACITY: usize = 256;

pub struct EventBus {
    peer_updates: broadcast::Sender<Vec<PeerUpdate>>,
    peer_deleting: broadcast::Sender<PeerDeleting>,
    message_updates: broadcast::Sender<Vec<MessageUpdate>>,
    write_text: broadcast::Sender<Vec<WriteText>>,
    sent_messages: broadcast::Sender<SentMsg>,
    send_errors: broadcast::Sender<SendErrorEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            peer_updates: broadcast::channel(CHANNEL_CAPACITY).0,
            peer_deleting: broadcast::channel(CHANNEL_CAPACITY).0,
            message_updates: broadcast::channel(CHANNEL_CAPACITY).0,
            write_text: broadcast::channel(CHANNEL_CAPACITY).0,
            sent_messages: broadcast::channel(CHANNEL_CAPACITY).0,
            send_errors: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    pub fn subscribe_peer_updates(&self) -> broadcast::Receiver<Vec<PeerUpdate>> {
        self.peer_updates.subscribe()
    }

    pub fn subscribe_peer_deleting(&self) -> broadcast::Receiver<PeerDeleting> {
        self.peer_deleting.subscribe()
    }

    pub fn subscribe_message_updates(&self) -> broadcast::Receiver<Vec<MessageUpdate>> {
        self.message_updates.subscribe()
    }

    pub fn subscribe_write_text(&self) -> broadcast::Receiver<Vec<WriteText>> {
        self.write_text.subscribe()
    }

    pub fn subscribe_sent_messages(&self) -> broadcast::Receiver<SentMsg> {
        self.sent_messages.subscribe()
    }

    pub fn subscribe_send_errors(&self) -> broadcast::Receiver<SendErrorEvent> {
        self.send_errors.subscribe()
    }

    // Publishing ignores the "no receivers" case: events are fire-and-forget.

    pub(crate) fn publish_peer_updates(&self, updates: Vec<PeerUpdate>) {
        if !updates.is_empty() {
            let _ = self.peer_updates.send(updates);
        }
    }

    pub(crate) fn publish_peer_deleting(&self, event: PeerDeleting) {
        let _ = self.peer_deleting.send(event);
    }

    pub(crate) fn publish_message_updates(&self, updates: Vec<MessageUpdate>) {
        if !updates.is_empty() {
            let _ = self.message_updates.send(updates);
        }
    }

    pub(crate) fn publish_write_text(&self, events: Vec<WriteText>) {
        if !events.is_empty() {
            let _ = self.write_text.send(events);
        }
    }

    pub(crate) fn publish_sent_message(&self, event: SentMsg) {
        let _ = self.sent_messages.send(event);
    }

    pub(crate) fn publish_send_error(&self, event: SendErrorEvent) {
        let _ = self.send_errors.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
