//! Cross-crate tests of the façade, the provider and the event bridge
//!
//! Everything runs against the scripted `MockConnection`; no store is needed.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use redis::{ErrorKind, RedisError, Value};
use redkit::redkit_client::ConnectionSettings;
use redkit::{
    CommandFlags, ConnectionEvent, ConnectionProvider, Connector, RedisOptions, RedisService,
    RedkitError, RedkitResult, When,
};
use redkit_testing::{MockConnection, RecordingObserver};

/// Hands out one shared mock and counts how often it was asked to
#[derive(Clone, Default)]
struct ScriptedConnector {
    mock: MockConnection,
    connects: Arc<AtomicUsize>,
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Connection = MockConnection;

    async fn connect(&self, _settings: &ConnectionSettings) -> RedkitResult<MockConnection> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(self.mock.clone())
    }
}

fn options() -> RedisOptions {
    RedisOptions::new("cache:6379")
        .with_keep_alive_secs(0)
        .with_show_log(true)
}

/// Route dispatch logs to the test output; `RUST_LOG=redkit_client=debug` to see them
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn service_with_observer(
    connector: ScriptedConnector,
    observer: &RecordingObserver,
) -> RedisService<ScriptedConnector> {
    let provider = ConnectionProvider::with_connector(options(), connector)
        .with_observer(Arc::new(observer.clone()));
    RedisService::new(provider)
}

#[tokio::test]
async fn test_concurrent_first_calls_share_one_connection() {
    let connector = ScriptedConnector::default();
    let service = RedisService::new(ConnectionProvider::with_connector(
        options(),
        connector.clone(),
    ));

    let calls = (0..16).map(|i| {
        let service = service.clone();
        tokio::spawn(async move { service.key_exists(&format!("key:{i}")).await })
    });
    for result in futures::future::join_all(calls).await {
        assert!(!result.unwrap().unwrap());
    }

    assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    assert_eq!(connector.mock.command_count(), 16);
}

fn broken_pipe() -> RedisError {
    RedisError::from(io::Error::new(io::ErrorKind::BrokenPipe, "socket"))
}

#[tokio::test]
async fn test_socket_failure_is_reported_and_handle_refused() {
    init_tracing();
    let connector = ScriptedConnector::default();
    // the command, then the recovery probe of the next call
    connector.mock.push_error(broken_pipe());
    connector.mock.push_error(broken_pipe());
    let observer = RecordingObserver::new();
    let service = service_with_observer(connector.clone(), &observer);

    let first = service.string_get::<String>("k").await.unwrap_err();
    assert!(first.as_store_error().is_some_and(|e| e.is_io_error()));

    let second = service.string_get::<String>("k").await.unwrap_err();
    assert!(matches!(second, RedkitError::Connection(_)));
    assert_eq!(second.to_string(), "Connection failed: cannot connect to store");
    assert!(!service.provider().is_connected());

    assert!(observer.wait_for(1, Duration::from_secs(1)).await);
    assert_eq!(observer.event_names(), vec!["connection_failed"]);
    let names: Vec<_> = connector.mock.commands().iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["GET", "EXISTS"]);
}

#[tokio::test]
async fn test_service_recovers_after_socket_failure_without_keep_alive() {
    let connector = ScriptedConnector::default();
    connector.mock.push_error(broken_pipe());
    connector.mock.push_reply(Value::Int(0));
    connector.mock.push_reply(Value::Int(1));
    let observer = RecordingObserver::new();
    let service = service_with_observer(connector.clone(), &observer);

    assert!(service.key_exists("k").await.is_err());
    assert!(service.key_exists("k").await.unwrap());
    assert!(service.provider().is_connected());

    assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    assert_eq!(connector.mock.command_count(), 3);
    assert!(observer.wait_for(2, Duration::from_secs(1)).await);
    assert_eq!(
        observer.event_names(),
        vec!["connection_failed", "connection_restored"]
    );
}

#[tokio::test]
async fn test_redirections_and_demotions_reach_the_observer() {
    init_tracing();
    let connector = ScriptedConnector::default();
    connector.mock.push_error(RedisError::from((
        ErrorKind::Moved,
        "An error was signalled by the server",
        "1200 10.0.0.3:6379".to_string(),
    )));
    connector.mock.push_error(RedisError::from((
        ErrorKind::ReadOnly,
        "You can't write against a read only replica.",
    )));
    let observer = RecordingObserver::new();
    let service = service_with_observer(connector, &observer);

    assert!(service.string_get::<String>("k").await.is_err());
    assert!(service.string_set("k", "v", None, When::Always).await.is_err());

    assert!(observer.wait_for(2, Duration::from_secs(1)).await);
    assert_eq!(
        observer.event_names(),
        vec!["hash_slot_moved", "configuration_changed"]
    );
    match &observer.events()[0] {
        ConnectionEvent::HashSlotMoved(moved) => {
            assert_eq!(moved.slot, 1200);
            assert_eq!(moved.new_endpoint, "10.0.0.3:6379");
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert!(service.provider().is_connected());
}

#[tokio::test]
async fn test_panicking_observer_does_not_break_commands() {
    let connector = ScriptedConnector::default();
    connector.mock.push_error(RedisError::from((ErrorKind::ParseError, "bad reply")));
    connector.mock.push_reply(Value::Int(1));
    let observer = RecordingObserver::panicking_on("internal_error");
    let service = service_with_observer(connector, &observer);

    assert!(service.key_exists("k").await.is_err());
    assert!(observer.wait_for(1, Duration::from_secs(1)).await);
    assert!(service.key_exists("k").await.unwrap());
}

#[tokio::test]
async fn test_admin_commands_are_rejected_before_dispatch() {
    let connector = ScriptedConnector::default();
    let service = RedisService::new(ConnectionProvider::with_connector(
        options(),
        connector.clone(),
    ));
    let mut connection = service.connection(CommandFlags::WRITE).await.unwrap();

    let result: redis::RedisResult<()> = redis::cmd("FLUSHALL").query_async(&mut connection).await;
    assert_eq!(result.unwrap_err().kind(), ErrorKind::ClientError);
    assert_eq!(connector.mock.command_count(), 0);
}

#[tokio::test]
async fn test_flag_view_shares_the_connection() {
    let connector = ScriptedConnector::default();
    let service = RedisService::new(ConnectionProvider::with_connector(
        options(),
        connector.clone(),
    ));
    let primary_only = service.with_flags(CommandFlags::DemandPrimary);

    let _: Option<String> = service.string_get("k").await.unwrap();
    let _: Option<String> = primary_only.string_get("k").await.unwrap();

    let flags: Vec<_> = connector.mock.commands().iter().map(|c| c.flags).collect();
    assert_eq!(flags, vec![CommandFlags::PreferReplica, CommandFlags::DemandPrimary]);
    assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
}
