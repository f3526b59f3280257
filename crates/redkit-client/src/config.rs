//! Redis connection configuration
//!
//! [`RedisOptions`] is the host-facing configuration record. It can be
//! deserialized from any serde source, read from `REDKIT_*` environment
//! variables, or built fluently. Options are immutable once handed to a
//! [`ConnectionProvider`](crate::ConnectionProvider); the provider derives
//! validated [`ConnectionSettings`](crate::ConnectionSettings) from them on
//! first connect.

use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use redkit_core::{RedkitError, RedkitResult};

/// Commands rejected by default before they reach the socket
pub const DEFAULT_DISABLED_COMMANDS: [&str; 6] =
    ["INFO", "CONFIG", "CLUSTER", "PING", "ECHO", "CLIENT"];

/// Default key probed by the keep-alive task
pub const DEFAULT_TIE_BREAKER: &str = "__redkit_tiebreak";

/// Default pub/sub channel carrying primary-change announcements
pub const DEFAULT_CONFIGURATION_CHANNEL: &str = "__redkit_primary_changed";

/// Proxy sitting between the client and the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Proxy {
    #[default]
    None,
    Twemproxy,
    Envoyproxy,
}

impl Proxy {
    /// Whether MULTI/EXEC can pass through this proxy
    pub fn supports_transactions(self) -> bool {
        matches!(self, Proxy::None)
    }
}

impl FromStr for Proxy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Proxy::None),
            "twemproxy" => Ok(Proxy::Twemproxy),
            "envoyproxy" | "envoy" => Ok(Proxy::Envoyproxy),
            other => Err(format!("unknown proxy '{other}', expected none/twemproxy/envoyproxy")),
        }
    }
}

/// Wire protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Resp2,
    Resp3,
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "2" | "resp2" => Ok(Protocol::Resp2),
            "3" | "resp3" => Ok(Protocol::Resp3),
            other => Err(format!("unknown protocol '{other}', expected resp2/resp3")),
        }
    }
}

/// Connection configuration for the shared multiplexed connection
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisOptions {
    /// Comma-separated `host:port` list
    pub endpoints: String,
    /// Fail the first connect when no endpoint answers
    pub abort_on_connect_fail: bool,
    /// Permit administrative commands
    pub allow_admin: bool,
    /// Prefix applied to every pub/sub channel
    pub channel_prefix: Option<String>,
    /// Connection attempts during the first connect
    pub connect_retry: u32,
    /// Channel announcing primary changes; empty disables the listener
    pub configuration_channel: String,
    pub connect_timeout_ms: u64,
    /// Per-command response timeout
    pub sync_timeout_ms: u64,
    pub default_database: Option<i64>,
    /// Keep-alive probe interval; 0 disables the probe
    pub keep_alive_secs: u64,
    pub client_name: Option<String>,
    pub password: Option<String>,
    pub proxy: Proxy,
    /// Resolve endpoint host names once, at connect time
    pub resolve_dns: bool,
    /// Sentinel service name; setting it selects a sentinel deployment
    pub service_name: Option<String>,
    /// Treat the endpoints as seed nodes of a cluster
    ///
    /// Otherwise the first endpoint is the primary and the rest are replicas.
    pub cluster: bool,
    pub ssl: bool,
    pub ssl_host: Option<String>,
    pub ssl_protocols: Option<String>,
    /// Key probed by the keep-alive task
    pub tie_breaker: String,
    pub protocol: Protocol,
    pub write_buffer: usize,
    /// Log every dispatched command at debug level
    pub show_log: bool,
    pub disabled_commands: Vec<String>,
}

impl Default for RedisOptions {
    fn default() -> Self {
        Self {
            endpoints: "localhost:6379".to_string(),
            abort_on_connect_fail: true,
            allow_admin: false,
            channel_prefix: None,
            connect_retry: 3,
            configuration_channel: DEFAULT_CONFIGURATION_CHANNEL.to_string(),
            connect_timeout_ms: 5000,
            sync_timeout_ms: 5000,
            default_database: None,
            keep_alive_secs: 60,
            client_name: None,
            password: None,
            proxy: Proxy::None,
            resolve_dns: false,
            service_name: None,
            cluster: false,
            ssl: false,
            ssl_host: None,
            ssl_protocols: None,
            tie_breaker: DEFAULT_TIE_BREAKER.to_string(),
            protocol: Protocol::Resp2,
            write_buffer: 4096,
            show_log: false,
            disabled_commands: DEFAULT_DISABLED_COMMANDS
                .iter()
                .map(|command| command.to_string())
                .collect(),
        }
    }
}

impl fmt::Debug for RedisOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisOptions")
            .field("endpoints", &self.endpoints)
            .field("abort_on_connect_fail", &self.abort_on_connect_fail)
            .field("allow_admin", &self.allow_admin)
            .field("channel_prefix", &self.channel_prefix)
            .field("connect_retry", &self.connect_retry)
            .field("configuration_channel", &self.configuration_channel)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("sync_timeout_ms", &self.sync_timeout_ms)
            .field("default_database", &self.default_database)
            .field("keep_alive_secs", &self.keep_alive_secs)
            .field("client_name", &self.client_name)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("proxy", &self.proxy)
            .field("resolve_dns", &self.resolve_dns)
            .field("service_name", &self.service_name)
            .field("cluster", &self.cluster)
            .field("ssl", &self.ssl)
            .field("ssl_host", &self.ssl_host)
            .field("ssl_protocols", &self.ssl_protocols)
            .field("tie_breaker", &self.tie_breaker)
            .field("protocol", &self.protocol)
            .field("write_buffer", &self.write_buffer)
            .field("show_log", &self.show_log)
            .field("disabled_commands", &self.disabled_commands)
            .finish()
    }
}

impl RedisOptions {
    /// Options for the given comma-separated endpoint list, defaults elsewhere
    pub fn new(endpoints: impl Into<String>) -> Self {
        Self {
            endpoints: endpoints.into(),
            ..Default::default()
        }
    }

    /// Load options from `REDKIT_*` environment variables
    ///
    /// Unset variables keep their defaults. A variable holding an unparsable
    /// value fails with [`RedkitError::Configuration`].
    pub fn from_env() -> RedkitResult<Self> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Load options through an arbitrary variable lookup
    pub fn from_source<F>(lookup: F) -> RedkitResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let source = EnvSource { lookup };
        let mut options = Self::default();

        if let Some(endpoints) = source.string("REDKIT_ENDPOINTS") {
            options.endpoints = endpoints;
        }
        if let Some(abort) = source.bool("REDKIT_ABORT_ON_CONNECT_FAIL")? {
            options.abort_on_connect_fail = abort;
        }
        if let Some(allow) = source.bool("REDKIT_ALLOW_ADMIN")? {
            options.allow_admin = allow;
        }
        if let Some(prefix) = source.string("REDKIT_CHANNEL_PREFIX") {
            options.channel_prefix = Some(prefix);
        }
        if let Some(retry) = source.parse::<u32>("REDKIT_CONNECT_RETRY")? {
            options.connect_retry = retry;
        }
        if let Some(channel) = source.string("REDKIT_CONFIGURATION_CHANNEL") {
            options.configuration_channel = channel;
        }
        if let Some(timeout) = source.parse::<u64>("REDKIT_CONNECT_TIMEOUT_MS")? {
            options.connect_timeout_ms = timeout;
        }
        if let Some(timeout) = source.parse::<u64>("REDKIT_SYNC_TIMEOUT_MS")? {
            options.sync_timeout_ms = timeout;
        }
        if let Some(database) = source.parse::<i64>("REDKIT_DEFAULT_DATABASE")? {
            options.default_database = Some(database);
        }
        if let Some(keep_alive) = source.parse::<u64>("REDKIT_KEEP_ALIVE_SECS")? {
            options.keep_alive_secs = keep_alive;
        }
        if let Some(name) = source.string("REDKIT_CLIENT_NAME") {
            options.client_name = Some(name);
        }
        if let Some(password) = source.string("REDKIT_PASSWORD") {
            options.password = Some(password);
        }
        if let Some(proxy) = source.parse::<Proxy>("REDKIT_PROXY")? {
            options.proxy = proxy;
        }
        if let Some(resolve) = source.bool("REDKIT_RESOLVE_DNS")? {
            options.resolve_dns = resolve;
        }
        if let Some(service) = source.string("REDKIT_SERVICE_NAME") {
            options.service_name = Some(service);
        }
        if let Some(cluster) = source.bool("REDKIT_CLUSTER")? {
            options.cluster = cluster;
        }
        if let Some(ssl) = source.bool("REDKIT_SSL")? {
            options.ssl = ssl;
        }
        if let Some(host) = source.string("REDKIT_SSL_HOST") {
            options.ssl_host = Some(host);
        }
        if let Some(protocols) = source.string("REDKIT_SSL_PROTOCOLS") {
            options.ssl_protocols = Some(protocols);
        }
        if let Some(tie_breaker) = source.string("REDKIT_TIE_BREAKER") {
            options.tie_breaker = tie_breaker;
        }
        if let Some(protocol) = source.parse::<Protocol>("REDKIT_PROTOCOL")? {
            options.protocol = protocol;
        }
        if let Some(buffer) = source.parse::<usize>("REDKIT_WRITE_BUFFER")? {
            options.write_buffer = buffer;
        }
        if let Some(show_log) = source.bool("REDKIT_SHOW_LOG")? {
            options.show_log = show_log;
        }

        options.validate()?;
        Ok(options)
    }

    pub fn with_endpoints(mut self, endpoints: impl Into<String>) -> Self {
        self.endpoints = endpoints.into();
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_database(mut self, database: i64) -> Self {
        self.default_database = Some(database);
        self
    }

    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    pub fn with_service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    pub fn with_cluster(mut self, cluster: bool) -> Self {
        self.cluster = cluster;
        self
    }

    pub fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    pub fn with_allow_admin(mut self, allow: bool) -> Self {
        self.allow_admin = allow;
        self
    }

    pub fn with_channel_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.channel_prefix = Some(prefix.into());
        self
    }

    pub fn with_configuration_channel(mut self, channel: impl Into<String>) -> Self {
        self.configuration_channel = channel.into();
        self
    }

    pub fn with_connect_retry(mut self, retry: u32) -> Self {
        self.connect_retry = retry;
        self
    }

    pub fn with_connect_timeout_ms(mut self, timeout: u64) -> Self {
        self.connect_timeout_ms = timeout;
        self
    }

    pub fn with_sync_timeout_ms(mut self, timeout: u64) -> Self {
        self.sync_timeout_ms = timeout;
        self
    }

    pub fn with_keep_alive_secs(mut self, keep_alive: u64) -> Self {
        self.keep_alive_secs = keep_alive;
        self
    }

    pub fn with_proxy(mut self, proxy: Proxy) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_resolve_dns(mut self, resolve: bool) -> Self {
        self.resolve_dns = resolve;
        self
    }

    pub fn with_tie_breaker(mut self, tie_breaker: impl Into<String>) -> Self {
        self.tie_breaker = tie_breaker.into();
        self
    }

    pub fn with_show_log(mut self, show_log: bool) -> Self {
        self.show_log = show_log;
        self
    }

    pub fn with_disabled_commands<I, C>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        self.disabled_commands = commands.into_iter().map(Into::into).collect();
        self
    }

    /// Endpoint entries, trimmed, empty entries dropped
    pub fn endpoint_list(&self) -> Vec<&str> {
        self.endpoints
            .split(',')
            .map(str::trim)
            .filter(|endpoint| !endpoint.is_empty())
            .collect()
    }

    /// Apply the channel prefix to a pub/sub channel name
    pub fn prefixed_channel(&self, channel: &str) -> String {
        match &self.channel_prefix {
            Some(prefix) => format!("{prefix}{channel}"),
            None => channel.to_string(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> RedkitResult<()> {
        if self.endpoint_list().is_empty() {
            return Err(RedkitError::Configuration(
                "at least one endpoint is required".to_string(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(RedkitError::Configuration(
                "connect_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.sync_timeout_ms == 0 {
            return Err(RedkitError::Configuration(
                "sync_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.default_database.is_some_and(|database| database < 0) {
            return Err(RedkitError::Configuration(
                "default_database cannot be negative".to_string(),
            ));
        }
        if self
            .service_name
            .as_deref()
            .is_some_and(|service| service.trim().is_empty())
        {
            return Err(RedkitError::Configuration(
                "service_name cannot be blank".to_string(),
            ));
        }
        if self.cluster && self.service_name.is_some() {
            return Err(RedkitError::Configuration(
                "cluster and service_name are mutually exclusive".to_string(),
            ));
        }
        if self.cluster && self.proxy != Proxy::None {
            return Err(RedkitError::Configuration(
                "cluster mode cannot be used behind a proxy".to_string(),
            ));
        }
        if self.keep_alive_secs > 0 && self.tie_breaker.is_empty() {
            return Err(RedkitError::Configuration(
                "tie_breaker is required when keep-alive is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

struct EnvSource<F> {
    lookup: F,
}

impl<F> EnvSource<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
    }

    fn bool(&self, key: &str) -> RedkitResult<Option<bool>> {
        match self.string(key) {
            Some(val) => match val.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(Some(true)),
                "false" | "0" | "no" | "off" => Ok(Some(false)),
                _ => Err(invalid_var(
                    key,
                    format!("invalid boolean value '{val}', expected true/false/1/0/yes/no/on/off"),
                )),
            },
            None => Ok(None),
        }
    }

    fn parse<T>(&self, key: &str) -> RedkitResult<Option<T>>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.string(key) {
            Some(val) => val
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| invalid_var(key, format!("invalid value '{val}': {e}"))),
            None => Ok(None),
        }
    }
}

fn invalid_var(key: &str, message: String) -> RedkitError {
    RedkitError::Configuration(format!("Invalid environment variable '{key}': {message}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn source(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let options = RedisOptions::default();
        assert_eq!(options.endpoint_list(), vec!["localhost:6379"]);
        assert!(options.abort_on_connect_fail);
        assert!(!options.allow_admin);
        assert_eq!(options.connect_retry, 3);
        assert_eq!(options.disabled_commands.len(), 6);
        assert!(options.disabled_commands.iter().any(|c| c == "PING"));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_from_source_reads_variables() {
        let options = RedisOptions::from_source(source(&[
            ("REDKIT_ENDPOINTS", "a:7000, b:7001"),
            ("REDKIT_ALLOW_ADMIN", "yes"),
            ("REDKIT_CONNECT_RETRY", "5"),
            ("REDKIT_DEFAULT_DATABASE", "2"),
            ("REDKIT_PROXY", "twemproxy"),
            ("REDKIT_PROTOCOL", "resp3"),
            ("REDKIT_PASSWORD", "s3cret"),
            ("REDKIT_CLUSTER", "off"),
        ]))
        .unwrap();

        assert_eq!(options.endpoint_list(), vec!["a:7000", "b:7001"]);
        assert!(options.allow_admin);
        assert_eq!(options.connect_retry, 5);
        assert_eq!(options.default_database, Some(2));
        assert_eq!(options.proxy, Proxy::Twemproxy);
        assert_eq!(options.protocol, Protocol::Resp3);
        assert!(!options.cluster);
        assert!(!format!("{options:?}").contains("s3cret"));
    }

    #[test]
    fn test_from_source_rejects_bad_values() {
        let err = RedisOptions::from_source(source(&[("REDKIT_SHOW_LOG", "maybe")])).unwrap_err();
        assert!(err.to_string().contains("REDKIT_SHOW_LOG"));

        let err =
            RedisOptions::from_source(source(&[("REDKIT_CONNECT_RETRY", "-1")])).unwrap_err();
        assert!(matches!(err, RedkitError::Configuration(_)));
    }

    #[test]
    fn test_empty_endpoints_fail_validation() {
        let err = RedisOptions::new(" , ").validate().unwrap_err();
        assert!(matches!(err, RedkitError::Configuration(_)));
    }

    #[test]
    fn test_cluster_conflicts_fail_validation() {
        let sentinel = RedisOptions::new("a,b").with_cluster(true).with_service_name("mymaster");
        assert!(matches!(sentinel.validate(), Err(RedkitError::Configuration(_))));

        let proxied = RedisOptions::new("a,b").with_cluster(true).with_proxy(Proxy::Envoyproxy);
        assert!(matches!(proxied.validate(), Err(RedkitError::Configuration(_))));

        assert!(RedisOptions::new("a,b").with_cluster(true).validate().is_ok());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let options: RedisOptions =
            serde_json::from_str(r#"{"endpoints":"cache:6380","proxy":"envoyproxy"}"#).unwrap();
        assert_eq!(options.endpoints, "cache:6380");
        assert_eq!(options.proxy, Proxy::Envoyproxy);
        assert_eq!(options.sync_timeout_ms, 5000);
        assert_eq!(options.tie_breaker, DEFAULT_TIE_BREAKER);
    }

    #[test]
    fn test_prefixed_channel() {
        let options = RedisOptions::default().with_channel_prefix("app:");
        assert_eq!(options.prefixed_channel("news"), "app:news");
        assert_eq!(RedisOptions::default().prefixed_channel("news"), "news");
    }
}
