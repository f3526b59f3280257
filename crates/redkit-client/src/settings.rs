//! Validated connection settings
//!
//! Derived from [`RedisOptions`] when the provider first connects. Parsing
//! happens here so that a bad endpoint list surfaces as a configuration error
//! before any socket is opened.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tracing::debug;
use url::Url;

use redkit_core::{RedkitError, RedkitResult};

use crate::config::{Protocol, Proxy, RedisOptions};

const DEFAULT_PORT: u16 = 6379;
const DEFAULT_SENTINEL_PORT: u16 = 26379;

/// One `host:port` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    fn parse_with_default(input: &str, default_port: u16) -> RedkitResult<Self> {
        let input = input.trim();
        let invalid = |reason: &str| {
            RedkitError::Configuration(format!("invalid endpoint '{input}': {reason}"))
        };

        if input.is_empty() {
            return Err(invalid("empty endpoint"));
        }

        // [v6]:port or [v6]
        if let Some(rest) = input.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| invalid("unterminated IPv6 address"))?;
            let port = match tail.strip_prefix(':') {
                Some(port) => port.parse().map_err(|_| invalid("bad port"))?,
                None if tail.is_empty() => default_port,
                None => return Err(invalid("unexpected text after IPv6 address")),
            };
            return Ok(Self::new(host, port));
        }

        match input.rsplit_once(':') {
            Some((host, _)) if host.contains(':') => Ok(Self::new(input, default_port)),
            Some((host, port)) => {
                if host.is_empty() {
                    return Err(invalid("missing host"));
                }
                let port = port.parse().map_err(|_| invalid("bad port"))?;
                Ok(Self::new(host, port))
            }
            None => Ok(Self::new(input, default_port)),
        }
    }

    fn url_host(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        }
    }
}

impl FromStr for Endpoint {
    type Err = RedkitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_with_default(s, DEFAULT_PORT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.url_host(), self.port)
    }
}

/// Store topology, inferred from the options
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deployment {
    /// First endpoint is the primary, any others are replicas
    Standalone,
    /// Several nodes sharing the hash-slot space
    Cluster,
    /// Endpoints are sentinels monitoring the named service
    Sentinel { service_name: String },
}

/// Settings the connector works from
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub endpoints: Vec<Endpoint>,
    pub deployment: Deployment,
    pub database: i64,
    pub password: Option<String>,
    pub client_name: Option<String>,
    pub tls: bool,
    pub protocol: Protocol,
    pub proxy: Proxy,
    pub connect_retry: u32,
    pub connect_timeout: Duration,
    pub response_timeout: Duration,
    /// `None` disables the keep-alive probe
    pub keep_alive: Option<Duration>,
    pub tie_breaker: String,
    /// Fully prefixed configuration channel, `None` when disabled
    pub configuration_channel: Option<String>,
    pub allow_admin: bool,
    /// Upper-cased command names
    pub disabled_commands: HashSet<String>,
    pub show_log: bool,
}

impl ConnectionSettings {
    /// Derive settings from options
    pub fn from_options(options: &RedisOptions) -> RedkitResult<Self> {
        options.validate()?;

        let deployment = match options.service_name.as_deref().map(str::trim) {
            Some(service) if !service.is_empty() => Deployment::Sentinel {
                service_name: service.to_string(),
            },
            _ if options.cluster => Deployment::Cluster,
            _ => Deployment::Standalone,
        };

        let default_port = match deployment {
            Deployment::Sentinel { .. } => DEFAULT_SENTINEL_PORT,
            _ => DEFAULT_PORT,
        };
        let endpoints = options
            .endpoint_list()
            .into_iter()
            .map(|endpoint| Endpoint::parse_with_default(endpoint, default_port))
            .collect::<RedkitResult<Vec<_>>>()?;

        let configuration_channel = if options.configuration_channel.is_empty() {
            None
        } else {
            Some(options.prefixed_channel(&options.configuration_channel))
        };

        Ok(Self {
            endpoints,
            deployment,
            database: options.default_database.unwrap_or(0),
            password: options.password.clone().filter(|password| !password.is_empty()),
            client_name: options.client_name.clone(),
            tls: options.ssl,
            protocol: options.protocol,
            proxy: options.proxy,
            connect_retry: options.connect_retry.max(1),
            connect_timeout: Duration::from_millis(options.connect_timeout_ms),
            response_timeout: Duration::from_millis(options.sync_timeout_ms),
            keep_alive: (options.keep_alive_secs > 0)
                .then(|| Duration::from_secs(options.keep_alive_secs)),
            tie_breaker: options.tie_breaker.clone(),
            configuration_channel,
            allow_admin: options.allow_admin,
            disabled_commands: options
                .disabled_commands
                .iter()
                .map(|command| command.trim().to_ascii_uppercase())
                .filter(|command| !command.is_empty())
                .collect(),
            show_log: options.show_log,
        })
    }

    /// Replace host names with resolved addresses
    pub async fn resolve_dns(mut self) -> RedkitResult<Self> {
        for endpoint in &mut self.endpoints {
            let target = endpoint.to_string();
            let lookup = tokio::net::lookup_host((endpoint.host.clone(), endpoint.port));
            let mut addresses = lookup.await.map_err(|e| {
                RedkitError::Configuration(format!("failed to resolve '{target}': {e}"))
            })?;
            let address = addresses.next().ok_or_else(|| {
                RedkitError::Configuration(format!("'{target}' resolved to no address"))
            })?;
            debug!(endpoint = %target, address = %address, "Resolved endpoint");
            *endpoint = Endpoint::new(address.ip().to_string(), address.port());
        }
        Ok(self)
    }

    /// The endpoint used for labels and single-node connections
    pub fn primary_endpoint(&self) -> RedkitResult<&Endpoint> {
        self.endpoints
            .first()
            .ok_or_else(|| RedkitError::Configuration("no endpoints configured".to_string()))
    }

    /// Endpoints serving replica reads in a standalone deployment
    pub fn replica_endpoints(&self) -> &[Endpoint] {
        match self.deployment {
            Deployment::Standalone => self.endpoints.get(1..).unwrap_or(&[]),
            _ => &[],
        }
    }

    /// Endpoints joined for logs
    pub fn endpoint_label(&self) -> String {
        self.endpoints
            .iter()
            .map(Endpoint::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Connection URL for a store node
    pub fn node_url(&self, endpoint: &Endpoint) -> RedkitResult<String> {
        let scheme = if self.tls { "rediss" } else { "redis" };
        let mut url = self.base_url(scheme, endpoint)?;
        if let Some(password) = &self.password {
            url.set_password(Some(password))
                .map_err(|_| invalid_url(endpoint, "cannot carry a password"))?;
        }
        if self.deployment != Deployment::Cluster {
            url.set_path(&format!("/{}", self.database));
        }
        if self.protocol == Protocol::Resp3 {
            url.query_pairs_mut().append_pair("protocol", "resp3");
        }
        Ok(url.to_string())
    }

    /// Connection URL for a sentinel; sentinels do not share the store password
    pub fn sentinel_url(&self, endpoint: &Endpoint) -> RedkitResult<String> {
        let scheme = if self.tls { "rediss" } else { "redis" };
        Ok(self.base_url(scheme, endpoint)?.to_string())
    }

    fn base_url(&self, scheme: &str, endpoint: &Endpoint) -> RedkitResult<Url> {
        Url::parse(&format!("{scheme}://{endpoint}"))
            .map_err(|e| invalid_url(endpoint, &e.to_string()))
    }
}

fn invalid_url(endpoint: &Endpoint, reason: &str) -> RedkitError {
    RedkitError::Configuration(format!("cannot build URL for '{endpoint}': {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("cache:6380", "cache", 6380)]
    #[case("cache", "cache", 6379)]
    #[case("10.0.0.5:7000", "10.0.0.5", 7000)]
    #[case("[::1]:6390", "::1", 6390)]
    #[case("[::1]", "::1", 6379)]
    fn test_endpoint_parsing(#[case] input: &str, #[case] host: &str, #[case] port: u16) {
        let endpoint: Endpoint = input.parse().unwrap();
        assert_eq!(endpoint, Endpoint::new(host, port));
    }

    #[rstest]
    #[case("cache:port")]
    #[case(":6379")]
    #[case("[::1")]
    #[case("cache:70000")]
    fn test_malformed_endpoints(#[case] input: &str) {
        let err = input.parse::<Endpoint>().unwrap_err();
        assert!(matches!(err, RedkitError::Configuration(_)));
    }

    #[test]
    fn test_deployment_inference() {
        let single = ConnectionSettings::from_options(&RedisOptions::new("a:6379")).unwrap();
        assert_eq!(single.deployment, Deployment::Standalone);

        let replicated =
            ConnectionSettings::from_options(&RedisOptions::new("primary:6379,replica:6379")).unwrap();
        assert_eq!(replicated.deployment, Deployment::Standalone);
        assert_eq!(replicated.primary_endpoint().unwrap(), &Endpoint::new("primary", 6379));
        assert_eq!(replicated.replica_endpoints(), [Endpoint::new("replica", 6379)]);

        let cluster = ConnectionSettings::from_options(
            &RedisOptions::new("a:7000,b:7001").with_cluster(true),
        )
        .unwrap();
        assert_eq!(cluster.deployment, Deployment::Cluster);
        assert_eq!(cluster.endpoints.len(), 2);
        assert!(cluster.replica_endpoints().is_empty());

        let sentinel = ConnectionSettings::from_options(
            &RedisOptions::new("s1,s2").with_service_name("mymaster"),
        )
        .unwrap();
        assert_eq!(
            sentinel.deployment,
            Deployment::Sentinel {
                service_name: "mymaster".to_string()
            }
        );
        assert_eq!(sentinel.endpoints[0].port, 26379);
    }

    #[test]
    fn test_empty_endpoint_list_is_configuration_error() {
        let err = ConnectionSettings::from_options(&RedisOptions::new("")).unwrap_err();
        assert!(matches!(err, RedkitError::Configuration(_)));
    }

    #[test]
    fn test_node_url() {
        let options = RedisOptions::new("cache:6380")
            .with_password("p@ss word")
            .with_database(3)
            .with_protocol(Protocol::Resp3)
            .with_ssl(true);
        let settings = ConnectionSettings::from_options(&options).unwrap();
        let url = settings.node_url(settings.primary_endpoint().unwrap()).unwrap();
        assert_eq!(url, "rediss://:p%40ss%20word@cache:6380/3?protocol=resp3");

        let plain = ConnectionSettings::from_options(&RedisOptions::new("cache")).unwrap();
        assert_eq!(
            plain.node_url(plain.primary_endpoint().unwrap()).unwrap(),
            "redis://cache:6379/0"
        );
    }

    #[test]
    fn test_disabled_commands_and_channel() {
        let options = RedisOptions::default()
            .with_disabled_commands(["flushall", " keys "])
            .with_channel_prefix("app:");
        let settings = ConnectionSettings::from_options(&options).unwrap();
        assert!(settings.disabled_commands.contains("FLUSHALL"));
        assert!(settings.disabled_commands.contains("KEYS"));
        assert_eq!(
            settings.configuration_channel.as_deref(),
            Some("app:__redkit_primary_changed")
        );

        let silent = ConnectionSettings::from_options(
            &RedisOptions::default()
                .with_configuration_channel("")
                .with_keep_alive_secs(0),
        )
        .unwrap();
        assert!(silent.configuration_channel.is_none());
        assert!(silent.keep_alive.is_none());
    }

    #[test]
    fn test_resolve_dns_keeps_ip_literals() {
        let options = RedisOptions::new("127.0.0.1:6390").with_resolve_dns(true);
        let settings = ConnectionSettings::from_options(&options).unwrap();
        let settings = tokio_test::block_on(settings.resolve_dns()).unwrap();
        assert_eq!(settings.endpoints[0], Endpoint::new("127.0.0.1", 6390));
    }

    #[test]
    fn test_resolve_dns_replaces_host_names() {
        let options = RedisOptions::new("localhost:6391,127.0.0.1:6392").with_resolve_dns(true);
        let settings = ConnectionSettings::from_options(&options).unwrap();
        let settings = tokio_test::block_on(settings.resolve_dns()).unwrap();

        let primary = settings.primary_endpoint().unwrap();
        assert!(primary.host.parse::<std::net::IpAddr>().is_ok());
        assert_eq!(primary.port, 6391);
        assert_eq!(settings.replica_endpoints(), [Endpoint::new("127.0.0.1", 6392)]);
    }
}
