//! Lazy owner of the single shared connection
//!
//! The first [`ConnectionProvider::get_connection`] call builds settings,
//! connects (with retries), wires lifecycle events and starts the background
//! tasks. Concurrent first callers wait on the same initialization, so exactly
//! one connection is created per provider. Later calls hand out clones of the
//! same handle, after checking that it still reports connected. A handle
//! marked disconnected gets one `EXISTS <tie-breaker>` recovery probe before
//! the caller is refused, so recovery does not depend on the keep-alive task.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use redis::RedisResult;
use tokio::sync::{Mutex, OnceCell};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use redkit_core::{
    CommandFlags, ConnectionEvent, EventObserver, InternalError, RedkitError, RedkitResult,
    RoutedConnection,
};

use super::connector::{Connector, RedisConnector};
use super::dispatcher::EventDispatcher;
use super::health::{spawn_broadcast_listener, spawn_keep_alive};
use super::monitored::{CommandGuard, ConnectionState, MonitoredConnection};
use crate::config::{DEFAULT_TIE_BREAKER, RedisOptions};
use crate::settings::ConnectionSettings;

/// Pause between connection attempts
pub const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Owns one lazily created shared connection
pub struct ConnectionProvider<K: Connector = RedisConnector> {
    options: RedisOptions,
    connector: K,
    observer: Option<Arc<dyn EventObserver>>,
    connection: OnceCell<MonitoredConnection<K::Connection>>,
    settings: OnceLock<ConnectionSettings>,
    recovery: Mutex<()>,
    shutdown: CancellationToken,
}

impl ConnectionProvider<RedisConnector> {
    /// Provider connecting through the `redis` crate
    pub fn new(options: RedisOptions) -> Self {
        Self::with_connector(options, RedisConnector)
    }
}

impl<K: Connector> ConnectionProvider<K> {
    pub fn with_connector(options: RedisOptions, connector: K) -> Self {
        Self {
            options,
            connector,
            observer: None,
            connection: OnceCell::new(),
            settings: OnceLock::new(),
            recovery: Mutex::new(()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Forward lifecycle events to an observer
    ///
    /// Takes effect for the connection created by the first access.
    pub fn with_observer(mut self, observer: Arc<dyn EventObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn options(&self) -> &RedisOptions {
        &self.options
    }

    /// Settings derived on first connect
    pub fn settings(&self) -> Option<&ConnectionSettings> {
        self.settings.get()
    }

    /// Whether the connection exists and reports connected
    pub fn is_connected(&self) -> bool {
        self.connection
            .get()
            .is_some_and(MonitoredConnection::is_connected)
    }

    /// The shared connection, created on first use
    ///
    /// # Errors
    ///
    /// - [`RedkitError::Configuration`] when the options are invalid
    /// - [`RedkitError::Connection`] when every attempt failed, or when the
    ///   existing handle reports disconnected and the recovery probe fails
    pub async fn get_connection(&self) -> RedkitResult<MonitoredConnection<K::Connection>> {
        if let Some(connection) = self.connection.get() {
            if !connection.is_connected() && !self.recover(connection).await {
                debug!(endpoint = %connection.endpoint(), "Shared connection is disconnected");
                return Err(RedkitError::disconnected());
            }
            return Ok(connection.clone());
        }

        let connection = self.connection.get_or_try_init(|| self.connect()).await?;
        Ok(connection.clone())
    }

    /// Probe a disconnected handle once; the monitored handle flips liveness
    ///
    /// Concurrent callers wait for the probe in flight instead of sending
    /// their own.
    async fn recover(&self, connection: &MonitoredConnection<K::Connection>) -> bool {
        let _probe_in_flight = self.recovery.lock().await;
        if connection.is_connected() {
            return true;
        }

        let tie_breaker = self
            .settings
            .get()
            .map_or(DEFAULT_TIE_BREAKER, |settings| settings.tie_breaker.as_str());
        let mut probe = connection.routed(CommandFlags::DemandPrimary);
        let outcome: RedisResult<i64> = redis::cmd("EXISTS")
            .arg(tie_breaker)
            .query_async(&mut probe)
            .await;
        match outcome {
            Ok(_) => debug!(endpoint = %connection.endpoint(), "Recovery probe reached the store"),
            Err(e) => debug!(endpoint = %connection.endpoint(), error = %e, "Recovery probe failed"),
        }
        connection.is_connected()
    }

    async fn connect(&self) -> RedkitResult<MonitoredConnection<K::Connection>> {
        let mut settings = ConnectionSettings::from_options(&self.options)?;
        if self.options.resolve_dns {
            settings = settings.resolve_dns().await?;
        }

        let endpoint = settings.endpoint_label();
        info!(
            endpoints = %endpoint,
            deployment = ?settings.deployment,
            client = self.options.client_name.as_deref().unwrap_or("redkit"),
            "Connecting to store"
        );

        let raw = self.connect_with_retry(&settings).await?;
        let state = ConnectionState::new(
            endpoint,
            EventDispatcher::new(self.observer.clone()),
            CommandGuard::from_settings(&settings),
            settings.show_log,
        );
        let connection = MonitoredConnection::new(raw, state);

        if let Some(interval) = settings.keep_alive {
            spawn_keep_alive(
                &connection,
                settings.tie_breaker.clone(),
                interval,
                self.shutdown.child_token(),
            );
        }
        self.listen_for_broadcasts(&settings, &connection).await;

        // first writer wins; get_or_try_init runs connect at most once
        let _ = self.settings.set(settings);
        Ok(connection)
    }

    async fn connect_with_retry(&self, settings: &ConnectionSettings) -> RedkitResult<K::Connection> {
        let attempts = settings.connect_retry.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.connector.connect(settings).await {
                Ok(connection) => {
                    if attempt > 1 {
                        info!(attempt, "Connected after retry");
                    }
                    return Ok(connection);
                }
                Err(e @ RedkitError::Configuration(_)) => return Err(e),
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "Connection attempt failed");
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                    }
                }
            }
        }

        let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
        Err(RedkitError::Connection(format!(
            "failed to connect to {} after {attempts} attempts: {reason}",
            settings.endpoint_label()
        )))
    }

    async fn listen_for_broadcasts(
        &self,
        settings: &ConnectionSettings,
        connection: &MonitoredConnection<K::Connection>,
    ) {
        let Some(channel) = settings.configuration_channel.as_deref() else {
            return;
        };
        if !settings.proxy.supports_transactions() {
            debug!("Proxy in front of the store, configuration channel not subscribed");
            return;
        }

        match self.connector.subscribe(settings, channel).await {
            Ok(Some(messages)) => spawn_broadcast_listener(
                messages,
                Arc::clone(connection.state()),
                self.shutdown.child_token(),
            ),
            Ok(None) => debug!(channel, "Connector has no pub/sub support"),
            Err(e) => {
                warn!(channel, error = %e, "Could not subscribe to configuration channel");
                connection
                    .state()
                    .emit(ConnectionEvent::InternalError(InternalError {
                        endpoint: connection.endpoint().to_string(),
                        error: e.to_string(),
                        origin: "configuration listener".to_string(),
                    }));
            }
        }
    }
}

impl<K: Connector> Drop for ConnectionProvider<K> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
