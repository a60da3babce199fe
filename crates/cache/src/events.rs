//! Change notifications for downstream collaborators.

use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

/// Emitted when a `put` actually changed stored content.
///
/// Timestamp-only bumps (re-index confirmed the record unchanged) do not
/// emit; the fingerprint comparison in the store guarantees that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub mal_id: u64,
    pub fingerprint: String,
}

/// Fan-out channel for [`ChangeEvent`]s.
///
/// Lagging subscribers lose the oldest events rather than applying
/// backpressure to the writer; consumers that care should resynchronize
/// from the store on `RecvError::Lagged`.
#[derive(Debug, Clone)]
pub struct Events {
    sender: broadcast::Sender<ChangeEvent>,
}

impl Events {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    pub(crate) fn emit(&self, event: ChangeEvent) {
        // Send only fails when nobody is subscribed, which is fine.
        _ = self.sender.send(event);
    }
}

impl Default for Events {
    fn default() -> Self {
        Self::new()
    }
}
