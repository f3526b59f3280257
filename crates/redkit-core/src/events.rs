//! Connection lifecycle events
//!
//! The shared connection reports what happens to it through six events. Hosts
//! subscribe by implementing [`EventObserver`]; every method has a no-op
//! default so an observer only overrides what it cares about.

use std::fmt;

/// Role of the connection an event was raised on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionType {
    /// Regular command connection
    Interactive,
    /// Pub/sub connection used for configuration broadcasts
    Subscription,
}

/// Why a connection was considered lost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureType {
    /// Read or write on the socket failed
    SocketFailure,
    /// The peer closed the socket
    SocketClosed,
    /// The endpoint refused or never accepted the connection
    UnableToConnect,
    /// Credentials were rejected
    AuthenticationFailure,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureType::SocketFailure => "socket-failure",
            FailureType::SocketClosed => "socket-closed",
            FailureType::UnableToConnect => "unable-to-connect",
            FailureType::AuthenticationFailure => "authentication-failure",
        };
        f.write_str(name)
    }
}

/// Payload of connection-failed and connection-restored events
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionFailure {
    pub connection_type: ConnectionType,
    pub endpoint: String,
    pub failure_type: FailureType,
    /// Error text of the failure (for a restore, of the failure being recovered from)
    pub error: String,
}

/// A hash slot served by a different node than the one asked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashSlotMove {
    pub slot: u16,
    /// Node the command was sent to, when known
    pub old_endpoint: Option<String>,
    pub new_endpoint: String,
}

/// An error raised inside the client rather than by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalError {
    pub endpoint: String,
    pub error: String,
    /// Component that raised it
    pub origin: String,
}

/// Any lifecycle event, as queued for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    ConfigurationChanged { endpoint: String },
    ConfigurationChangedBroadcast { endpoint: String },
    HashSlotMoved(HashSlotMove),
    ConnectionFailed(ConnectionFailure),
    ConnectionRestored(ConnectionFailure),
    InternalError(InternalError),
}

impl ConnectionEvent {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionEvent::ConfigurationChanged { .. } => "configuration_changed",
            ConnectionEvent::ConfigurationChangedBroadcast { .. } => {
                "configuration_changed_broadcast"
            }
            ConnectionEvent::HashSlotMoved(_) => "hash_slot_moved",
            ConnectionEvent::ConnectionFailed(_) => "connection_failed",
            ConnectionEvent::ConnectionRestored(_) => "connection_restored",
            ConnectionEvent::InternalError(_) => "internal_error",
        }
    }

    /// Invoke the matching observer method
    pub fn notify(&self, observer: &dyn EventObserver) {
        match self {
            ConnectionEvent::ConfigurationChanged { endpoint } => {
                observer.configuration_changed(endpoint)
            }
            ConnectionEvent::ConfigurationChangedBroadcast { endpoint } => {
                observer.configuration_changed_broadcast(endpoint)
            }
            ConnectionEvent::HashSlotMoved(moved) => observer.hash_slot_moved(moved),
            ConnectionEvent::ConnectionFailed(failure) => observer.connection_failed(failure),
            ConnectionEvent::ConnectionRestored(failure) => observer.connection_restored(failure),
            ConnectionEvent::InternalError(error) => observer.internal_error(error),
        }
    }
}

/// Receives lifecycle events of the shared connection
///
/// Methods run on a dedicated delivery task, never on the command path. A
/// panicking method is caught and logged; later events are still delivered.
pub trait EventObserver: Send + Sync + 'static {
    /// A node reported a role change (e.g. the primary became read-only)
    fn configuration_changed(&self, _endpoint: &str) {}

    /// A configuration change was announced on the configuration channel
    fn configuration_changed_broadcast(&self, _endpoint: &str) {}

    /// A hash slot was found on another node
    fn hash_slot_moved(&self, _moved: &HashSlotMove) {}

    /// The connection was lost
    fn connection_failed(&self, _failure: &ConnectionFailure) {}

    /// The connection came back after a failure
    fn connection_restored(&self, _failure: &ConnectionFailure) {}

    /// The client hit an internal error
    fn internal_error(&self, _error: &InternalError) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct SlotObserver {
        slots: Mutex<Vec<u16>>,
    }

    impl EventObserver for SlotObserver {
        fn hash_slot_moved(&self, moved: &HashSlotMove) {
            self.slots.lock().unwrap().push(moved.slot);
        }
    }

    #[test]
    fn test_notify_dispatches_to_matching_method() {
        let observer = SlotObserver::default();
        let event = ConnectionEvent::HashSlotMoved(HashSlotMove {
            slot: 3999,
            old_endpoint: Some("10.0.0.1:6379".to_string()),
            new_endpoint: "10.0.0.2:6379".to_string(),
        });
        event.notify(&observer);
        ConnectionEvent::ConfigurationChanged {
            endpoint: "10.0.0.1:6379".to_string(),
        }
        .notify(&observer);

        assert_eq!(*observer.slots.lock().unwrap(), vec![3999]);
        assert_eq!(event.name(), "hash_slot_moved");
    }
}
