use tokio::sync::broadcast;

use crate::dto::ws::RoomEvent;

/// Broadcast hub fanning session events out to every connection joined to
/// the session's room.
///
/// Publishing is fire-and-forget: delivery is not confirmed and lost events
/// are recovered by a client-initiated resync, not by the hub. Total
/// ordering among already-joined connections follows from publishing while
/// the owning session's lock is held.
pub struct RoomHub {
    sender: broadcast::Sender<RoomEvent>,
}

impl RoomHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the
    /// given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn publish(&self, event: RoomEvent) {
        let _ = self.sender.send(event);
    }
}
