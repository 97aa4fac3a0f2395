//! In-process geofence transition bus backed by a tokio broadcast channel.

use tokio::sync::broadcast;

use autoflow_domain::geofence::GeofenceTransition;

/// Fan-out of every detected [`GeofenceTransition`], debounced or not.
///
/// Publishing succeeds even when there are no active subscribers
/// (the transition is simply dropped).
#[derive(Debug, Clone)]
pub struct TransitionBus {
    sender: broadcast::Sender<GeofenceTransition>,
}

impl TransitionBus {
    /// Create a new bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to transitions on this bus.
    ///
    /// Returns a receiver that will get all transitions published *after*
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<GeofenceTransition> {
        self.sender.subscribe()
    }

    /// Publish a transition to all current subscribers.
    pub fn publish(&self, transition: GeofenceTransition) {
        // fails only when nobody is subscribed
        let _ = self.sender.send(transition);
    }
}
