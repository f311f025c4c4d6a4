use lnch_model::{SessionEvent, Subscribe};

use super::view::log_event;

/// Forwards session events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSubscriber;

impl Subscribe for LogSubscriber {
    fn on_event(&self, event: &SessionEvent) {
        log_event(event);
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
