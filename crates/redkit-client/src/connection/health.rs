//! Background tasks keeping the shared connection honest
//!
//! The keep-alive probe exercises the connection on a fixed interval so that
//! an idle handle still notices a lost socket, and notices its recovery. The
//! broadcast listener turns configuration-channel messages into events.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use redis::RedisResult;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use redkit_core::{CommandFlags, ConnectionEvent, InternalError, RoutedConnection};

use super::connector::BroadcastStream;
use super::monitored::{ConnectionState, MonitoredConnection};

/// Probe interval while the handle is marked disconnected
pub const DISCONNECTED_PROBE_INTERVAL: Duration = Duration::from_secs(1);

/// Probe the store with `EXISTS <tie_breaker>` until shutdown
pub(crate) fn spawn_keep_alive<C: RoutedConnection>(
    connection: &MonitoredConnection<C>,
    tie_breaker: String,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut probe = connection.routed(CommandFlags::DemandPrimary);
    tokio::spawn(async move {
        loop {
            let wait = if probe.is_connected() {
                interval
            } else {
                interval.min(DISCONNECTED_PROBE_INTERVAL)
            };
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            // the monitored handle classifies the outcome
            let outcome: RedisResult<i64> = redis::cmd("EXISTS")
                .arg(&tie_breaker)
                .query_async(&mut probe)
                .await;
            if let Err(e) = outcome {
                debug!(endpoint = %probe.endpoint(), error = %e, "Keep-alive probe failed");
            }
        }
        debug!("Keep-alive task stopped");
    });
}

/// Forward configuration-channel messages as broadcast events until shutdown
pub(crate) fn spawn_broadcast_listener(
    mut messages: BroadcastStream,
    state: Arc<ConnectionState>,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                message = messages.next() => match message {
                    Some(payload) => {
                        let endpoint = if payload.is_empty() {
                            state.endpoint().to_string()
                        } else {
                            payload
                        };
                        info!(endpoint = %endpoint, "Configuration change broadcast received");
                        state.emit(ConnectionEvent::ConfigurationChangedBroadcast { endpoint });
                    }
                    None => {
                        warn!(endpoint = %state.endpoint(), "Configuration channel closed");
                        state.emit(ConnectionEvent::InternalError(InternalError {
                            endpoint: state.endpoint().to_string(),
                            error: "configuration channel closed".to_string(),
                            origin: "configuration listener".to_string(),
                        }));
                        break;
                    }
                }
            }
        }
        debug!("Configuration listener stopped");
    });
}
