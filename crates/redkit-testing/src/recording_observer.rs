//! # Recording Observer
//!
//! An [`EventObserver`] that keeps every event it receives. Delivery happens
//! on a background task, so tests use [`RecordingObserver::wait_for`] instead
//! of asserting right after the command that triggered an event.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use redkit_core::{
    ConnectionEvent, ConnectionFailure, EventObserver, HashSlotMove, InternalError,
};

/// Observer that records events in arrival order
#[derive(Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<ConnectionEvent>>>,
    panic_on: Option<&'static str>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record events but panic inside the named handler, after recording
    pub fn panicking_on(event_name: &'static str) -> Self {
        Self {
            events: Arc::default(),
            panic_on: Some(event_name),
        }
    }

    /// Every event received so far
    pub fn events(&self) -> Vec<ConnectionEvent> {
        self.lock().clone()
    }

    /// Names of the events received so far
    pub fn event_names(&self) -> Vec<&'static str> {
        self.lock().iter().map(ConnectionEvent::name).collect()
    }

    /// Number of received events with the given name
    pub fn count(&self, event_name: &str) -> usize {
        self.lock()
            .iter()
            .filter(|event| event.name() == event_name)
            .count()
    }

    /// Wait until at least `count` events arrived, giving up after `timeout`
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.lock().len() >= count {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ConnectionEvent>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, event: ConnectionEvent) {
        let name = event.name();
        self.lock().push(event);
        if self.panic_on == Some(name) {
            panic!("observer failure in {name}");
        }
    }
}

impl EventObserver for RecordingObserver {
    fn configuration_changed(&self, endpoint: &str) {
        self.record(ConnectionEvent::ConfigurationChanged {
            endpoint: endpoint.to_string(),
        });
    }

    fn configuration_changed_broadcast(&self, endpoint: &str) {
        self.record(ConnectionEvent::ConfigurationChangedBroadcast {
            endpoint: endpoint.to_string(),
        });
    }

    fn hash_slot_moved(&self, moved: &HashSlotMove) {
        self.record(ConnectionEvent::HashSlotMoved(moved.clone()));
    }

    fn connection_failed(&self, failure: &ConnectionFailure) {
        self.record(ConnectionEvent::ConnectionFailed(failure.clone()));
    }

    fn connection_restored(&self, failure: &ConnectionFailure) {
        self.record(ConnectionEvent::ConnectionRestored(failure.clone()));
    }

    fn internal_error(&self, error: &InternalError) {
        self.record(ConnectionEvent::InternalError(error.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_in_order() {
        let observer = RecordingObserver::new();
        observer.configuration_changed("a:6379");
        observer.internal_error(&InternalError {
            endpoint: "a:6379".to_string(),
            error: "parse".to_string(),
            origin: "command".to_string(),
        });

        assert!(observer.wait_for(2, Duration::from_millis(10)).await);
        assert_eq!(
            observer.event_names(),
            vec!["configuration_changed", "internal_error"]
        );
        assert_eq!(observer.count("internal_error"), 1);
    }

    #[tokio::test]
    async fn test_wait_for_times_out() {
        let observer = RecordingObserver::new();
        assert!(!observer.wait_for(1, Duration::from_millis(20)).await);
    }
}
