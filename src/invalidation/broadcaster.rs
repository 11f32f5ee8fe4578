use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;

use crate::invalidation::{InvalidationChannel, InvalidationEvent};

/// In-process fan-out hub: every published event is delivered to every live
/// subscriber, the publisher's own subscription included. Subscribers filter
/// out their own events by origin.
#[derive(Debug, Default)]
pub struct LocalBroadcaster {
    subscribers: Mutex<Vec<Sender<InvalidationEvent>>>,
}

impl LocalBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<InvalidationEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl InvalidationChannel for LocalBroadcaster {
    fn publish(&self, event: InvalidationEvent) {
        let mut guard = self.subscribers.lock();
        // Dropped receivers disconnect their sender; prune them here.
        guard.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
