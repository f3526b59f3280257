//! Event delivery off the command path

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use redkit_core::{ConnectionEvent, EventObserver};

/// Queues events for a dedicated delivery task
///
/// Emitting never blocks. Without an observer events are logged and dropped.
#[derive(Clone)]
pub(crate) struct EventDispatcher {
    sender: Option<mpsc::UnboundedSender<ConnectionEvent>>,
}

impl EventDispatcher {
    /// Start a delivery task for the observer, if any
    ///
    /// Must be called from within a tokio runtime when an observer is given.
    pub(crate) fn new(observer: Option<Arc<dyn EventObserver>>) -> Self {
        let Some(observer) = observer else {
            return Self::disabled();
        };
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(deliver(observer, receiver));
        Self {
            sender: Some(sender),
        }
    }

    pub(crate) fn disabled() -> Self {
        Self { sender: None }
    }

    pub(crate) fn emit(&self, event: ConnectionEvent) {
        match &self.sender {
            Some(sender) => {
                if let Err(rejected) = sender.send(event) {
                    debug!(event = rejected.0.name(), "Event delivery task stopped, dropping event");
                }
            }
            None => debug!(event = event.name(), "No observer registered, dropping event"),
        }
    }
}

async fn deliver(
    observer: Arc<dyn EventObserver>,
    mut receiver: mpsc::UnboundedReceiver<ConnectionEvent>,
) {
    while let Some(event) = receiver.recv().await {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| event.notify(observer.as_ref())));
        if outcome.is_err() {
            warn!(event = event.name(), "Event observer panicked while handling event");
        }
    }
    debug!("Event delivery task finished");
}
