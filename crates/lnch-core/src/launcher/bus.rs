use std::sync::Arc;

use lnch_model::{SessionEvent, Subscribe};

/// Fans session events out to every registered subscriber.
#[derive(Clone, Default)]
pub(crate) struct EventBus {
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl EventBus {
    pub(crate) fn new(subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        Self { subscribers }
    }

    pub(crate) fn publish(&self, event: SessionEvent) {
        for sub in &self.subscribers {
            sub.on_event(&event);
        }
    }
}
