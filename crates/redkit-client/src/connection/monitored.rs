//! Connection handle that classifies every command outcome
//!
//! [`MonitoredConnection`] wraps the store connection and shares one
//! liveness state between all of its clones. Outcomes are turned into
//! lifecycle events: socket errors mark the handle disconnected, the next
//! success restores it, redirections and role changes are reported as they
//! are seen. Disabled and administrative commands are refused before they
//! reach the socket.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use redis::aio::ConnectionLike;
use redis::{Arg, Cmd, ErrorKind, Pipeline, RedisError, RedisFuture, RedisResult, Value};
use tracing::{debug, info, warn};

use redkit_core::{
    CommandFlags, ConnectionEvent, ConnectionFailure, ConnectionType, FailureType, HashSlotMove,
    InternalError, RoutedConnection,
};

use super::dispatcher::EventDispatcher;
use crate::settings::ConnectionSettings;

/// Commands that need `allow_admin`
pub const ADMIN_COMMANDS: [&str; 16] = [
    "BGREWRITEAOF",
    "BGSAVE",
    "CLIENT",
    "CLUSTER",
    "CONFIG",
    "DEBUG",
    "FLUSHALL",
    "FLUSHDB",
    "INFO",
    "KEYS",
    "MONITOR",
    "REPLICAOF",
    "SAVE",
    "SCRIPT",
    "SHUTDOWN",
    "SLAVEOF",
];

/// Refuses disabled and administrative commands
#[derive(Debug, Clone, Default)]
pub(crate) struct CommandGuard {
    disabled: HashSet<String>,
    allow_admin: bool,
}

impl CommandGuard {
    pub(crate) fn from_settings(settings: &ConnectionSettings) -> Self {
        Self {
            disabled: settings.disabled_commands.clone(),
            allow_admin: settings.allow_admin,
        }
    }

    pub(crate) fn check(&self, name: &str) -> RedisResult<()> {
        let name = name.to_ascii_uppercase();
        if self.disabled.contains(&name) {
            return Err(RedisError::from((
                ErrorKind::ClientError,
                "Command disabled",
                format!("{name} is disabled by configuration"),
            )));
        }
        if !self.allow_admin && ADMIN_COMMANDS.contains(&name.as_str()) {
            return Err(RedisError::from((
                ErrorKind::ClientError,
                "Admin mode required",
                format!("{name} requires allow_admin"),
            )));
        }
        Ok(())
    }
}

/// Liveness and event plumbing shared by every clone of a handle
pub(crate) struct ConnectionState {
    connected: AtomicBool,
    endpoint: String,
    last_failure: Mutex<Option<ConnectionFailure>>,
    events: EventDispatcher,
    guard: CommandGuard,
    show_log: bool,
}

impl ConnectionState {
    pub(crate) fn new(
        endpoint: String,
        events: EventDispatcher,
        guard: CommandGuard,
        show_log: bool,
    ) -> Self {
        Self {
            connected: AtomicBool::new(true),
            endpoint,
            last_failure: Mutex::new(None),
            events,
            guard,
            show_log,
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub(crate) fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub(crate) fn emit(&self, event: ConnectionEvent) {
        self.events.emit(event);
    }

    /// Classify the outcome of one round trip
    pub(crate) fn observe(&self, error: Option<&RedisError>) {
        let Some(error) = error else {
            self.mark_alive();
            return;
        };

        match error.kind() {
            ErrorKind::Moved | ErrorKind::Ask => {
                self.mark_alive();
                if let Some((node, slot)) = error.redirect_node() {
                    debug!(slot, node, "Hash slot served by another node");
                    self.emit(ConnectionEvent::HashSlotMoved(HashSlotMove {
                        slot,
                        old_endpoint: Some(self.endpoint.clone()),
                        new_endpoint: node.to_string(),
                    }));
                }
            }
            ErrorKind::ReadOnly => {
                self.mark_alive();
                info!(endpoint = %self.endpoint, "Node reported read-only, configuration changed");
                self.emit(ConnectionEvent::ConfigurationChanged {
                    endpoint: self.endpoint.clone(),
                });
            }
            ErrorKind::AuthenticationFailed => {
                self.mark_failed(FailureType::AuthenticationFailure, error)
            }
            ErrorKind::ClientError | ErrorKind::ParseError => {
                warn!(endpoint = %self.endpoint, error = %error, "Client-side command failure");
                self.emit(ConnectionEvent::InternalError(InternalError {
                    endpoint: self.endpoint.clone(),
                    error: error.to_string(),
                    origin: "command dispatch".to_string(),
                }));
            }
            _ if error.is_connection_refusal() => {
                self.mark_failed(FailureType::UnableToConnect, error)
            }
            // a slow reply says nothing about the socket
            _ if error.is_timeout() => {}
            _ if error.is_connection_dropped() => self.mark_failed(FailureType::SocketClosed, error),
            _ if error.is_io_error() => self.mark_failed(FailureType::SocketFailure, error),
            _ => self.mark_alive(),
        }
    }

    fn mark_failed(&self, failure_type: FailureType, error: &RedisError) {
        let failure = ConnectionFailure {
            connection_type: ConnectionType::Interactive,
            endpoint: self.endpoint.clone(),
            failure_type,
            error: error.to_string(),
        };
        // transitions and their events happen under the failure lock
        let mut last_failure = self.lock_failure();
        if !self.connected.swap(false, Ordering::AcqRel) {
            return;
        }
        *last_failure = Some(failure.clone());

        warn!(
            endpoint = %self.endpoint,
            failure = %failure_type,
            error = %error,
            "Connection to store lost"
        );
        self.emit(ConnectionEvent::ConnectionFailed(failure));
    }

    fn mark_alive(&self) {
        if self.connected.load(Ordering::Acquire) {
            return;
        }
        let mut last_failure = self.lock_failure();
        if self.connected.swap(true, Ordering::AcqRel) {
            return;
        }
        let failure = last_failure.take().unwrap_or_else(|| ConnectionFailure {
            connection_type: ConnectionType::Interactive,
            endpoint: self.endpoint.clone(),
            failure_type: FailureType::SocketFailure,
            error: String::new(),
        });

        info!(endpoint = %self.endpoint, "Connection to store restored");
        self.emit(ConnectionEvent::ConnectionRestored(failure));
    }

    fn lock_failure(&self) -> MutexGuard<'_, Option<ConnectionFailure>> {
        self.last_failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// The shared connection handle handed out by the provider
pub struct MonitoredConnection<C> {
    inner: C,
    state: Arc<ConnectionState>,
}

impl<C> MonitoredConnection<C> {
    pub(crate) fn new(inner: C, state: ConnectionState) -> Self {
        Self {
            inner,
            state: Arc::new(state),
        }
    }

    /// Whether the last round trip reached the store
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Endpoint label used in events
    pub fn endpoint(&self) -> &str {
        self.state.endpoint()
    }

    pub(crate) fn state(&self) -> &Arc<ConnectionState> {
        &self.state
    }
}

impl<C> fmt::Debug for MonitoredConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitoredConnection")
            .field("endpoint", &self.state.endpoint)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl<C: Clone> Clone for MonitoredConnection<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

fn command_name(cmd: &Cmd) -> Option<String> {
    match cmd.args_iter().next()? {
        Arg::Simple(name) => Some(String::from_utf8_lossy(name).into_owned()),
        Arg::Cursor => None,
    }
}

impl<C: ConnectionLike + Send> ConnectionLike for MonitoredConnection<C> {
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
        Box::pin(async move {
            if let Some(name) = command_name(cmd) {
                self.state.guard.check(&name)?;
                if self.state.show_log {
                    debug!(command = %name, endpoint = %self.state.endpoint, "Dispatching command");
                }
            }
            let result = self.inner.req_packed_command(cmd).await;
            self.state.observe(result.as_ref().err());
            result
        })
    }

    fn req_packed_commands<'a>(
        &'a mut self,
        pipeline: &'a Pipeline,
        offset: usize,
        count: usize,
    ) -> RedisFuture<'a, Vec<Value>> {
        Box::pin(async move {
            if self.state.show_log {
                debug!(commands = count, endpoint = %self.state.endpoint, "Dispatching pipeline");
            }
            let result = self.inner.req_packed_commands(pipeline, offset, count).await;
            self.state.observe(result.as_ref().err());
            result
        })
    }

    fn get_db(&self) -> i64 {
        self.inner.get_db()
    }
}

impl<C: RoutedConnection> RoutedConnection for MonitoredConnection<C> {
    fn routed(&self, flags: CommandFlags) -> Self {
        Self {
            inner: self.inner.routed(flags),
            state: Arc::clone(&self.state),
        }
    }
}
