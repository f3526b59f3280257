//! Opening store connections for each deployment kind
//!
//! The [`Connector`] trait is the seam between the provider and the network.
//! [`RedisConnector`] opens real multiplexed connections with the `redis`
//! crate; tests substitute connectors that hand out scripted connections.

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use redis::aio::{ConnectionLike, ConnectionManager, ConnectionManagerConfig};
use redis::cluster::ClusterClientBuilder;
use redis::cluster_async::ClusterConnection;
use redis::sentinel::{SentinelClient, SentinelNodeConnectionInfo, SentinelServerType};
use redis::{
    Cmd, Pipeline, ProtocolVersion, RedisConnectionInfo, RedisFuture, TlsMode, Value,
};
use tracing::{debug, info, warn};

use redkit_core::{CommandFlags, RedkitResult, RoutedConnection};

use crate::config::Protocol;
use crate::settings::{ConnectionSettings, Deployment};

/// Payloads received on the configuration channel
pub type BroadcastStream = BoxStream<'static, String>;

/// Opens connections to the store
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: RoutedConnection;

    /// Open the shared multiplexed connection
    async fn connect(&self, settings: &ConnectionSettings) -> RedkitResult<Self::Connection>;

    /// Subscribe to a pub/sub channel on a dedicated connection
    ///
    /// Connectors without pub/sub support return `Ok(None)`.
    async fn subscribe(
        &self,
        _settings: &ConnectionSettings,
        _channel: &str,
    ) -> RedkitResult<Option<BroadcastStream>> {
        Ok(None)
    }
}

/// Connector backed by the `redis` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisConnector;

#[async_trait]
impl Connector for RedisConnector {
    type Connection = StoreConnection;

    async fn connect(&self, settings: &ConnectionSettings) -> RedkitResult<StoreConnection> {
        let nodes = match &settings.deployment {
            Deployment::Standalone => connect_standalone(settings).await?,
            Deployment::Cluster => connect_cluster(settings).await?,
            Deployment::Sentinel { service_name } => connect_sentinel(settings, service_name).await?,
        };
        Ok(StoreConnection {
            nodes,
            flags: CommandFlags::default(),
            database: settings.database,
        })
    }

    async fn subscribe(
        &self,
        settings: &ConnectionSettings,
        channel: &str,
    ) -> RedkitResult<Option<BroadcastStream>> {
        let client = match &settings.deployment {
            Deployment::Sentinel { service_name } => {
                sentinel_client(settings, service_name, SentinelServerType::Master).await?
            }
            _ => redis::Client::open(settings.node_url(settings.primary_endpoint()?)?)?,
        };

        // pub/sub needs a dedicated connection
        let mut pubsub = client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;
        debug!(channel, "Subscribed to configuration channel");

        let stream = pubsub.into_on_message().map(|msg| {
            msg.get_payload::<String>().unwrap_or_else(|e| {
                warn!(error = %e, "Unreadable configuration broadcast payload");
                String::new()
            })
        });
        Ok(Some(Box::pin(stream)))
    }
}

fn protocol_version(protocol: Protocol) -> ProtocolVersion {
    match protocol {
        Protocol::Resp2 => ProtocolVersion::RESP2,
        Protocol::Resp3 => ProtocolVersion::RESP3,
    }
}

fn manager_config(settings: &ConnectionSettings) -> ConnectionManagerConfig {
    ConnectionManagerConfig::new()
        .set_number_of_retries(settings.connect_retry as usize)
        .set_connection_timeout(settings.connect_timeout)
        .set_response_timeout(settings.response_timeout)
}

async fn connect_standalone(settings: &ConnectionSettings) -> RedkitResult<Nodes> {
    let url = settings.node_url(settings.primary_endpoint()?)?;
    let client = redis::Client::open(url)?;
    let primary = ConnectionManager::new_with_config(client, manager_config(settings)).await?;

    let mut replica = None;
    for endpoint in settings.replica_endpoints() {
        let client = redis::Client::open(settings.node_url(endpoint)?)?;
        match ConnectionManager::new_with_config(client, manager_config(settings)).await {
            Ok(connection) => {
                debug!(endpoint = %endpoint, "Replica reads routed to endpoint");
                replica = Some(connection);
                break;
            }
            Err(e) => warn!(endpoint = %endpoint, error = %e, "Replica unavailable"),
        }
    }

    info!(
        endpoint = %settings.endpoint_label(),
        replica = replica.is_some(),
        "Connected to standalone store"
    );
    Ok(Nodes::Single { primary, replica })
}

async fn connect_cluster(settings: &ConnectionSettings) -> RedkitResult<Nodes> {
    let urls = settings
        .endpoints
        .iter()
        .map(|endpoint| settings.node_url(endpoint))
        .collect::<RedkitResult<Vec<_>>>()?;

    let builder = || {
        ClusterClientBuilder::new(urls.clone())
            .retries(settings.connect_retry)
            .connection_timeout(settings.connect_timeout)
            .response_timeout(settings.response_timeout)
            .use_protocol(protocol_version(settings.protocol))
    };

    let primary = builder().build()?.get_async_connection().await?;
    let replica = builder()
        .read_from_replicas()
        .build()?
        .get_async_connection()
        .await?;
    info!(endpoints = %settings.endpoint_label(), "Connected to cluster");
    Ok(Nodes::Cluster { primary, replica })
}

async fn sentinel_client(
    settings: &ConnectionSettings,
    service_name: &str,
    server_type: SentinelServerType,
) -> RedkitResult<redis::Client> {
    let sentinels = settings
        .endpoints
        .iter()
        .map(|endpoint| settings.sentinel_url(endpoint))
        .collect::<RedkitResult<Vec<_>>>()?;
    // credentials and database apply to the discovered nodes, not the sentinels
    let node_info = SentinelNodeConnectionInfo {
        tls_mode: settings.tls.then_some(TlsMode::Secure),
        redis_connection_info: Some(RedisConnectionInfo {
            db: settings.database,
            password: settings.password.clone(),
            protocol: protocol_version(settings.protocol),
            ..Default::default()
        }),
    };
    let mut sentinel = SentinelClient::build(
        sentinels,
        service_name.to_string(),
        Some(node_info),
        server_type,
    )?;
    Ok(sentinel.async_get_client().await?)
}

async fn connect_sentinel(settings: &ConnectionSettings, service_name: &str) -> RedkitResult<Nodes> {
    let client = sentinel_client(settings, service_name, SentinelServerType::Master).await?;
    let primary = ConnectionManager::new_with_config(client, manager_config(settings)).await?;

    let replica = match sentinel_client(settings, service_name, SentinelServerType::Replica).await {
        Ok(client) => match ConnectionManager::new_with_config(client, manager_config(settings)).await {
            Ok(replica) => Some(replica),
            Err(e) => {
                warn!(service = service_name, error = %e, "Replica unavailable, reads go to primary");
                None
            }
        },
        Err(e) => {
            warn!(service = service_name, error = %e, "No replica discovered, reads go to primary");
            None
        }
    };

    info!(
        service = service_name,
        sentinels = %settings.endpoint_label(),
        replica = replica.is_some(),
        "Connected through sentinel"
    );
    Ok(Nodes::Single { primary, replica })
}

#[derive(Clone)]
enum Nodes {
    Single {
        primary: ConnectionManager,
        replica: Option<ConnectionManager>,
    },
    Cluster {
        primary: ClusterConnection,
        /// Same cluster, reads served by replicas
        replica: ClusterConnection,
    },
}

/// Multiplexed store connection, routed by placement flag
///
/// Clones share the underlying sockets. Replica-targeting flags use the
/// replica connection when the deployment has one, the primary otherwise.
#[derive(Clone)]
pub struct StoreConnection {
    nodes: Nodes,
    flags: CommandFlags,
    database: i64,
}

impl StoreConnection {
    /// Placement flag this clone routes with
    pub fn flags(&self) -> CommandFlags {
        self.flags
    }
}

impl ConnectionLike for StoreConnection {
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
        let to_replica = self.flags.targets_replica();
        match &mut self.nodes {
            Nodes::Single {
                replica: Some(replica),
                ..
            } if to_replica => replica.req_packed_command(cmd),
            Nodes::Single { primary, .. } => primary.req_packed_command(cmd),
            Nodes::Cluster { replica, .. } if to_replica => replica.req_packed_command(cmd),
            Nodes::Cluster { primary, .. } => primary.req_packed_command(cmd),
        }
    }

    fn req_packed_commands<'a>(
        &'a mut self,
        pipeline: &'a Pipeline,
        offset: usize,
        count: usize,
    ) -> RedisFuture<'a, Vec<Value>> {
        let to_replica = self.flags.targets_replica();
        match &mut self.nodes {
            Nodes::Single {
                replica: Some(replica),
                ..
            } if to_replica => replica.req_packed_commands(pipeline, offset, count),
            Nodes::Single { primary, .. } => primary.req_packed_commands(pipeline, offset, count),
            Nodes::Cluster { replica, .. } if to_replica => {
                replica.req_packed_commands(pipeline, offset, count)
            }
            Nodes::Cluster { primary, .. } => primary.req_packed_commands(pipeline, offset, count),
        }
    }

    fn get_db(&self) -> i64 {
        self.database
    }
}

impl RoutedConnection for StoreConnection {
    fn routed(&self, flags: CommandFlags) -> Self {
        Self {
            nodes: self.nodes.clone(),
            flags,
            database: self.database,
        }
    }
}
