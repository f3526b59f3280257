//! Publishing

use serde::Serialize;

use redkit_core::{RedkitResult, Serializer, require_key};

use super::RedisService;
use crate::connection::Connector;

impl<K: Connector, S: Serializer> RedisService<K, S> {
    /// Publish a message; returns how many subscribers received it
    ///
    /// The configured channel prefix is prepended to `channel`.
    pub async fn publish<T>(&self, channel: &str, message: &T) -> RedkitResult<u64>
    where
        T: Serialize + ?Sized,
    {
        require_key("channel", channel)?;
        let channel = self.provider.options().prefixed_channel(channel);
        let payload = self.encode(message)?;
        self.write(redis::cmd("PUBLISH").arg(channel).arg(payload)).await
    }
}

#[cfg(test)]
mod tests {
    use redis::Value;
    use redkit_testing::MockConnection;

    use super::super::test_support::{MockConnector, service_with};
    use super::*;
    use crate::config::RedisOptions;
    use crate::connection::ConnectionProvider;

    #[tokio::test]
    async fn test_publish_without_prefix() {
        let mock = MockConnection::new().with_reply(Value::Int(2));
        let service = service_with(&mock);
        assert_eq!(service.publish("orders", &42).await.unwrap(), 2);
        assert_eq!(mock.last_command().unwrap().args, ["PUBLISH", "orders", "42"]);
    }

    #[tokio::test]
    async fn test_publish_applies_channel_prefix() {
        let mock = MockConnection::new().with_reply(Value::Int(0));
        let options = RedisOptions::new("cache:6379")
            .with_keep_alive_secs(0)
            .with_channel_prefix("app:");
        let connector = MockConnector { mock: mock.clone() };
        let service = RedisService::new(ConnectionProvider::with_connector(options, connector));

        service.publish("orders", "created").await.unwrap();
        assert_eq!(
            mock.last_command().unwrap().args,
            ["PUBLISH", "app:orders", "\"created\""]
        );
    }
}
