use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::{CourtId, Event};

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for per-court change notifications.
pub struct NotifyHub {
    channels: DashMap<CourtId, broadcast::Sender<Event>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to notifications for a court. Creates the channel if needed.
    pub fn subscribe(&self, court_id: CourtId) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(court_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a notification on the event's court. No-op if nobody is listening.
    pub fn send(&self, event: &Event) {
        if let Some(sender) = self.channels.get(&event.court_id()) {
            let _ = sender.send(event.clone());
        }
    }

    /// Remove a channel (e.g. when the court is deleted).
    pub fn remove(&self, court_id: &CourtId) {
        self.channels.remove(court_id);
    }
}
